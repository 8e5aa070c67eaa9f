use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OCR 提取成功时的固定置信度
pub const EXTRACTION_CONFIDENCE: f64 = 0.7;

/// 识别出的币种
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// OCR 文本中识别出的明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total: BigDecimal,
}

/// 从 OCR 文本提取的发票字段 (所有字段均可缺失)
///
/// 只在上传流程中短暂存在：构造后立即用于生成 `NewInvoice`，
/// 原样以 JSON 形式保存在发票的 `extracted_data` 列中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedInvoiceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ExtractedItem>>,
    pub confidence: f64,
}

impl ExtractedInvoiceData {
    /// 空结果，置信度为给定值
    pub fn empty(confidence: f64) -> Self {
        Self {
            invoice_number: None,
            vendor: None,
            amount: None,
            currency: None,
            invoice_date: None,
            due_date: None,
            items: None,
            confidence,
        }
    }

    /// OCR 本身失败时使用：全部字段缺失，置信度 0
    pub fn ocr_failed() -> Self {
        Self::empty(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_absent_fields_are_omitted_from_json() {
        let data = ExtractedInvoiceData::ocr_failed();
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, serde_json::json!({ "confidence": 0.0 }));
    }

    #[test]
    fn test_json_uses_camel_case_and_currency_codes() {
        let mut data = ExtractedInvoiceData::empty(EXTRACTION_CONFIDENCE);
        data.invoice_number = Some("INV-1".to_string());
        data.currency = Some(Currency::Gbp);
        data.items = Some(vec![ExtractedItem {
            description: "Bolts".to_string(),
            quantity: 3,
            unit_price: BigDecimal::from_str("1.50").unwrap(),
            total: BigDecimal::from_str("4.50").unwrap(),
        }]);

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["invoiceNumber"], "INV-1");
        assert_eq!(json["currency"], "GBP");
        assert_eq!(json["items"][0]["quantity"], 3);
        assert!(json["items"][0].get("unitPrice").is_some());
    }
}
