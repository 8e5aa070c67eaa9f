use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::invoice::InvoiceWithItems;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// 页码上限，保证 offset 不溢出
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// 列表查询参数: ?status=&page=&limit=
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    /// 页码从 1 开始
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            total,
            page,
            limit,
            pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceWithItems>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub invoice: InvoiceWithItems,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// 更新明细行
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub description: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total: BigDecimal,
}

/// 更新发票请求体 (所有字段可选，`items` 提供时整体替换)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    pub invoice_number: Option<String>,
    pub vendor: Option<String>,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<UpdateItemRequest>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub approved_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}
