use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::extracted::ExtractedInvoiceData;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";

/// 发票审批状态 (Postgres 枚举 invoice_status)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Pending,
    Approved,
    Rejected,
    ReadyForPayout,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::Approved => "APPROVED",
            InvoiceStatus::Rejected => "REJECTED",
            InvoiceStatus::ReadyForPayout => "READY_FOR_PAYOUT",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(InvoiceStatus::Pending),
            "APPROVED" => Ok(InvoiceStatus::Approved),
            "REJECTED" => Ok(InvoiceStatus::Rejected),
            "READY_FOR_PAYOUT" => Ok(InvoiceStatus::ReadyForPayout),
            other => Err(format!("Unknown invoice status: {}", other)),
        }
    }
}

/// 发票主表 (invoices)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub vendor: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub invoice_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: InvoiceStatus,
    pub file_url: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 发票明细表 (invoice_items)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total: BigDecimal,
}

/// 发票及其所有明细 (API 返回结构)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// 待写入的明细行
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total: BigDecimal,
}

/// 待写入的发票 (上传时由提取结果补齐默认值生成)
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub vendor: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub invoice_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: InvoiceStatus,
    pub file_url: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub items: Vec<NewInvoiceItem>,
}

/// 发票部分更新 (None 表示保持原值)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceUpdate {
    pub invoice_number: Option<String>,
    pub vendor: Option<String>,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewInvoice {
    /// 用提取结果填充发票，缺失字段使用默认值
    pub fn from_extracted(
        extracted: &ExtractedInvoiceData,
        file_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let invoice_date = extracted
            .invoice_date
            .as_deref()
            .and_then(parse_loose_date);
        if invoice_date.is_none() {
            if let Some(raw) = &extracted.invoice_date {
                tracing::warn!("Unparsable invoice date {:?}, using upload time", raw);
            }
        }

        let items = extracted
            .items
            .as_ref()
            .map(|items| {
                items
                    .iter()
                    .map(|item| NewInvoiceItem {
                        description: item.description.clone(),
                        quantity: item.quantity,
                        unit_price: item.unit_price.clone(),
                        total: item.total.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            invoice_number: extracted
                .invoice_number
                .clone()
                .unwrap_or_else(|| format!("INV-{}", now.timestamp_millis())),
            vendor: extracted
                .vendor
                .clone()
                .unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
            amount: extracted
                .amount
                .clone()
                .unwrap_or_else(|| BigDecimal::from(0)),
            currency: extracted
                .currency
                .map(|c| c.code().to_string())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            invoice_date: invoice_date.unwrap_or(now),
            due_date: extracted.due_date.as_deref().and_then(parse_loose_date),
            status: InvoiceStatus::Pending,
            file_url,
            extracted_data: serde_json::to_value(extracted).ok(),
            items,
        }
    }
}

/// 宽松解析日期字符串，返回当天 00:00 UTC
///
/// 支持 RFC 3339、`Y-M-D`，以及 OCR 常见的 `M/D/Y` (优先) 和 `D/M/Y` 写法，
/// 分隔符可以是 `/` 或 `-`，两位年份按 1950-2049 解释。
pub fn parse_loose_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let parts: Vec<&str> = s.split(['/', '-']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    if parts[0].len() == 4 {
        let year: i32 = parts[0].parse().ok()?;
        let month: u32 = parts[1].parse().ok()?;
        let day: u32 = parts[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).and_then(midnight_utc);
    }

    let first: u32 = parts[0].parse().ok()?;
    let second: u32 = parts[1].parse().ok()?;
    let mut year: i32 = parts[2].parse().ok()?;
    if parts[2].len() <= 2 {
        year += if year < 50 { 2000 } else { 1900 };
    }

    NaiveDate::from_ymd_opt(year, first, second)
        .or_else(|| NaiveDate::from_ymd_opt(year, second, first))
        .and_then(midnight_utc)
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extracted::{Currency, ExtractedItem, EXTRACTION_CONFIDENCE};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_month_first() {
        assert_eq!(parse_loose_date("03/15/2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_loose_date("4-5-2024"), Some(ymd(2024, 4, 5)));
    }

    #[test]
    fn test_parse_falls_back_to_day_first() {
        assert_eq!(parse_loose_date("15/03/2024"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_parse_two_digit_year() {
        assert_eq!(parse_loose_date("1/2/24"), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_loose_date("1/2/99"), Some(ymd(1999, 1, 2)));
    }

    #[test]
    fn test_parse_iso_and_rfc3339() {
        assert_eq!(parse_loose_date("2024-03-15"), Some(ymd(2024, 3, 15)));
        assert_eq!(
            parse_loose_date("2024-03-15T10:30:00Z"),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_loose_date(""), None);
        assert_eq!(parse_loose_date("13/13/2024"), None);
        assert_eq!(parse_loose_date("next tuesday"), None);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("pending".parse::<InvoiceStatus>(), Ok(InvoiceStatus::Pending));
        assert_eq!(
            "READY_FOR_PAYOUT".parse::<InvoiceStatus>(),
            Ok(InvoiceStatus::ReadyForPayout)
        );
        assert!("PAID".parse::<InvoiceStatus>().is_err());
        assert_eq!(
            serde_json::to_value(InvoiceStatus::ReadyForPayout).unwrap(),
            "READY_FOR_PAYOUT"
        );
    }

    #[test]
    fn test_defaults_for_empty_extraction() {
        let now = ymd(2024, 6, 1);
        let invoice = NewInvoice::from_extracted(&ExtractedInvoiceData::ocr_failed(), None, now);

        assert_eq!(invoice.invoice_number, format!("INV-{}", now.timestamp_millis()));
        assert_eq!(invoice.vendor, UNKNOWN_VENDOR);
        assert_eq!(invoice.amount, BigDecimal::from(0));
        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.invoice_date, now);
        assert_eq!(invoice.due_date, None);
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert!(invoice.items.is_empty());
        assert_eq!(
            invoice.extracted_data,
            Some(serde_json::json!({ "confidence": 0.0 }))
        );
    }

    #[test]
    fn test_extracted_fields_take_precedence() {
        let mut extracted = ExtractedInvoiceData::empty(EXTRACTION_CONFIDENCE);
        extracted.invoice_number = Some("A-42".to_string());
        extracted.vendor = Some("Acme Corp".to_string());
        extracted.amount = Some(BigDecimal::from_str("99.95").unwrap());
        extracted.currency = Some(Currency::Eur);
        extracted.invoice_date = Some("03/15/2024".to_string());
        extracted.due_date = Some("not a date".to_string());
        extracted.items = Some(vec![ExtractedItem {
            description: "Widget".to_string(),
            quantity: 2,
            unit_price: BigDecimal::from(10),
            total: BigDecimal::from(20),
        }]);

        let invoice = NewInvoice::from_extracted(
            &extracted,
            Some("/uploads/1-a.png".to_string()),
            ymd(2024, 6, 1),
        );

        assert_eq!(invoice.invoice_number, "A-42");
        assert_eq!(invoice.vendor, "Acme Corp");
        assert_eq!(invoice.currency, "EUR");
        assert_eq!(invoice.invoice_date, ymd(2024, 3, 15));
        assert_eq!(invoice.due_date, None);
        assert_eq!(invoice.file_url.as_deref(), Some("/uploads/1-a.png"));
        assert_eq!(
            invoice.items,
            vec![NewInvoiceItem {
                description: "Widget".to_string(),
                quantity: 2,
                unit_price: BigDecimal::from(10),
                total: BigDecimal::from(20),
            }]
        );
    }
}
