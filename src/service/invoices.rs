use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::models::{
    parse_loose_date, ApproveRequest, Invoice, InvoiceItem, InvoiceListResponse, InvoiceStatus,
    InvoiceUpdate, InvoiceWithItems, ListQuery, NewInvoice, NewInvoiceItem, Pagination,
    RejectRequest, UpdateInvoiceRequest,
};
use crate::service::ocr::{self, OcrEngine};
use crate::service::storage::FileStore;
use crate::service::validation::validate_file;

pub const DEFAULT_APPROVER: &str = "System";

/// 发票服务：上传、查询、修改、审批
pub struct InvoiceService {
    pool: PgPool,
    store: FileStore,
    ocr: Arc<dyn OcrEngine>,
    max_file_size: u64,
}

impl InvoiceService {
    pub fn new(pool: PgPool, store: FileStore, ocr: Arc<dyn OcrEngine>, max_file_size: u64) -> Self {
        Self {
            pool,
            store,
            ocr,
            max_file_size,
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// 上传发票文件：校验 -> 保存 -> OCR 提取 -> 入库
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> AppResult<InvoiceWithItems> {
        validate_file(content_type, bytes.len() as u64, self.max_file_size)?;

        let stored = self.store.save(file_name, bytes).await?;
        tracing::info!("Saved upload {} as {}", file_name, stored.public_url);

        let extracted = ocr::recognize_and_extract(self.ocr.clone(), stored.path.clone()).await;
        tracing::info!(
            "Extraction for {}: confidence {}, {} items",
            stored.public_url,
            extracted.confidence,
            extracted.items.as_ref().map_or(0, Vec::len)
        );

        let new_invoice =
            NewInvoice::from_extracted(&extracted, Some(stored.public_url.clone()), Utc::now());
        let invoice = match queries::insert_invoice(&self.pool, &new_invoice).await {
            Ok(invoice) => invoice,
            Err(e) => {
                // 入库失败时不保留孤立文件
                self.store.remove(&stored.public_url).await;
                return Err(e.into());
            }
        };
        self.with_items(invoice).await
    }

    /// 分页列表，可按状态过滤
    pub async fn list(&self, query: &ListQuery) -> AppResult<InvoiceListResponse> {
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<InvoiceStatus>)
            .transpose()
            .map_err(AppError::Validation)?;
        let (page, limit) = (query.page(), query.limit());

        let (invoices, total) = futures::try_join!(
            queries::list_invoices(&self.pool, status, query.offset(), limit),
            queries::count_invoices(&self.pool, status),
        )?;

        let ids: Vec<Uuid> = invoices.iter().map(|i| i.id).collect();
        let items = queries::list_items_for_invoices(&self.pool, &ids).await?;

        Ok(InvoiceListResponse {
            invoices: attach_items(invoices, items),
            pagination: Pagination::new(total, page, limit),
        })
    }

    pub async fn get(&self, id: Uuid) -> AppResult<InvoiceWithItems> {
        let invoice = queries::get_invoice(&self.pool, id)
            .await?
            .ok_or_else(not_found)?;
        self.with_items(invoice).await
    }

    pub async fn update(&self, id: Uuid, req: UpdateInvoiceRequest) -> AppResult<InvoiceWithItems> {
        req.validate()?;

        let update = InvoiceUpdate {
            invoice_number: req.invoice_number,
            vendor: req.vendor,
            amount: req.amount,
            currency: req.currency,
            invoice_date: req.invoice_date.as_deref().and_then(parse_loose_date),
            due_date: req.due_date.as_deref().and_then(parse_loose_date),
            notes: req.notes,
        };
        let items: Option<Vec<NewInvoiceItem>> = req.items.map(|items| {
            items
                .into_iter()
                .map(|item| NewInvoiceItem {
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total: item.total,
                })
                .collect()
        });

        let invoice = queries::update_invoice(&self.pool, id, &update, items.as_deref())
            .await?
            .ok_or_else(not_found)?;
        tracing::info!("Updated invoice {}", id);
        self.with_items(invoice).await
    }

    /// 删除发票，同时尽力删除已上传的文件
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let invoice = queries::delete_invoice(&self.pool, id)
            .await?
            .ok_or_else(not_found)?;
        if let Some(url) = &invoice.file_url {
            self.store.remove(url).await;
        }
        tracing::info!("Deleted invoice {}", id);
        Ok(())
    }

    pub async fn approve(&self, id: Uuid, req: ApproveRequest) -> AppResult<InvoiceWithItems> {
        let approved_by = req
            .approved_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_APPROVER);

        let invoice = queries::approve_invoice(
            &self.pool,
            id,
            approved_by,
            req.notes.as_deref(),
            Utc::now(),
        )
        .await?
        .ok_or_else(not_found)?;
        tracing::info!("Invoice {} approved by {}", id, approved_by);
        self.with_items(invoice).await
    }

    pub async fn reject(&self, id: Uuid, req: RejectRequest) -> AppResult<InvoiceWithItems> {
        let reason = req.validated_reason()?;

        let invoice = queries::reject_invoice(&self.pool, id, &reason)
            .await?
            .ok_or_else(not_found)?;
        tracing::info!("Invoice {} rejected: {}", id, reason);
        self.with_items(invoice).await
    }

    async fn with_items(&self, invoice: Invoice) -> AppResult<InvoiceWithItems> {
        let items = queries::list_items_for_invoices(&self.pool, &[invoice.id]).await?;
        Ok(InvoiceWithItems { invoice, items })
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Invoice".to_string())
}

/// 按发票ID归组明细，保持发票顺序
fn attach_items(invoices: Vec<Invoice>, items: Vec<InvoiceItem>) -> Vec<InvoiceWithItems> {
    let mut by_invoice: HashMap<Uuid, Vec<InvoiceItem>> = HashMap::new();
    for item in items {
        by_invoice.entry(item.invoice_id).or_default().push(item);
    }

    invoices
        .into_iter()
        .map(|invoice| {
            let items = by_invoice.remove(&invoice.id).unwrap_or_default();
            InvoiceWithItems { invoice, items }
        })
        .collect()
}
