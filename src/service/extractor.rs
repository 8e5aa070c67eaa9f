use bigdecimal::BigDecimal;
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

use crate::models::{Currency, ExtractedInvoiceData, ExtractedItem, EXTRACTION_CONFIDENCE};

lazy_static! {
    // Invoice / INV / # 之后的编号；编号字符类只认 ASCII，不做 Unicode 大小写折叠
    static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)(?:Invoice|INV|#)\s*(?:Number|No\.?|#)?\s*:?\s*((?-i:[A-Za-z0-9-])+)"
    ).unwrap();

    static ref INVOICE_DATE: Regex = Regex::new(
        r"(?i)(?:Date|Dated?)\s*:?\s*([0-9]{1,2}[/\-][0-9]{1,2}[/\-][0-9]{2,4})"
    ).unwrap();

    static ref DUE_DATE: Regex = Regex::new(
        r"(?i)(?:Due\s*Date|Payment\s*Due)\s*:?\s*([0-9]{1,2}[/\-][0-9]{1,2}[/\-][0-9]{2,4})"
    ).unwrap();

    static ref TOTAL_AMOUNT: Regex = Regex::new(
        r"(?i)(?:Total|Amount\s*Due|Grand\s*Total)\s*:?\s*\$?\s*([0-9,]+\.?[0-9]*)"
    ).unwrap();

    // 描述  数量  单价  金额
    static ref LINE_ITEM: Regex = Regex::new(
        r"(.+?)\s+([0-9]+)\s+\$?([0-9,]+\.?[0-9]*)\s+\$?([0-9,]+\.?[0-9]*)"
    ).unwrap();
}

/// 从 OCR 文本中提取发票字段
///
/// 纯函数，对任意输入都返回结果：匹配不到的字段保持 `None`，
/// 置信度固定为 0.7。各字段独立匹配，互不依赖。
pub fn extract(text: &str) -> ExtractedInvoiceData {
    let items = extract_line_items(text);

    ExtractedInvoiceData {
        invoice_number: first_capture(&INVOICE_NUMBER, text),
        vendor: extract_vendor(text),
        amount: extract_total_amount(text),
        currency: extract_currency(text),
        invoice_date: first_capture(&INVOICE_DATE, text),
        due_date: first_capture(&DUE_DATE, text),
        items: if items.is_empty() { None } else { Some(items) },
        confidence: EXTRACTION_CONFIDENCE,
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].to_string())
}

/// 第一行非空文本视为供应商名称
fn extract_vendor(text: &str) -> Option<String> {
    let first_line = text.split('\n').find(|line| !line.trim().is_empty())?;
    // 长度按原始行的 UTF-16 码元计算
    if first_line.encode_utf16().count() > 2 {
        Some(first_line.trim().to_string())
    } else {
        None
    }
}

/// 第一个 "Total" 类标签后的金额；若小计在前则取小计
fn extract_total_amount(text: &str) -> Option<BigDecimal> {
    let caps = TOTAL_AMOUNT.captures(text)?;
    parse_amount(&caps[1])
}

/// 按 USD > EUR > GBP 的优先级检测币种符号或代码
fn extract_currency(text: &str) -> Option<Currency> {
    let lower = text.to_lowercase();
    if text.contains('$') || lower.contains("usd") {
        Some(Currency::Usd)
    } else if text.contains('€') || lower.contains("eur") {
        Some(Currency::Eur)
    } else if text.contains('£') || lower.contains("gbp") {
        Some(Currency::Gbp)
    } else {
        None
    }
}

fn extract_line_items(text: &str) -> Vec<ExtractedItem> {
    LINE_ITEM
        .captures_iter(text)
        .filter_map(|caps| {
            let quantity = caps[2].parse::<i32>().ok()?;
            let unit_price = parse_amount(&caps[3])?;
            let total = parse_amount(&caps[4])?;
            Some(ExtractedItem {
                description: caps[1].trim().to_string(),
                quantity,
                unit_price,
                total,
            })
        })
        .collect()
}

/// 去掉千分位逗号后解析为十进制数
fn parse_amount(token: &str) -> Option<BigDecimal> {
    let cleaned = token.replace(',', "");
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    BigDecimal::from_str(cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    const SAMPLE: &str = "Acme Corp
Invoice Number: INV-2024-001
Date: 03/15/2024
Due Date: 04/15/2024

Description  Qty  Price  Total
Widget A  2  $10.00  $20.00

Total: $1,234.56
";

    #[test]
    fn test_empty_text_yields_only_confidence() {
        assert_eq!(extract(""), ExtractedInvoiceData::empty(0.7));
    }

    #[test]
    fn test_whitespace_only_text() {
        let data = extract("  \n\t\n   ");
        assert_eq!(data, ExtractedInvoiceData::empty(0.7));
    }

    #[test]
    fn test_full_sample() {
        let data = extract(SAMPLE);

        assert_eq!(data.invoice_number.as_deref(), Some("INV-2024-001"));
        assert_eq!(data.vendor.as_deref(), Some("Acme Corp"));
        assert_eq!(data.invoice_date.as_deref(), Some("03/15/2024"));
        assert_eq!(data.due_date.as_deref(), Some("04/15/2024"));
        assert_eq!(data.amount, Some(dec("1234.56")));
        assert_eq!(data.currency, Some(Currency::Usd));
        assert_eq!(
            data.items,
            Some(vec![ExtractedItem {
                description: "Widget A".to_string(),
                quantity: 2,
                unit_price: dec("10.00"),
                total: dec("20.00"),
            }])
        );
        assert_eq!(data.confidence, 0.7);
    }

    #[test]
    fn test_invoice_number_variants() {
        assert_eq!(
            extract("Invoice Number: INV-2024-001").invoice_number.as_deref(),
            Some("INV-2024-001")
        );
        assert_eq!(
            extract("invoice no. ab-77").invoice_number.as_deref(),
            Some("ab-77")
        );
        assert_eq!(extract("Ref #12345").invoice_number.as_deref(), Some("12345"));
        assert_eq!(extract("Receipt 12345").invoice_number, None);
    }

    #[test]
    fn test_invoice_number_ignores_non_ascii_case_variants() {
        // U+212A KELVIN SIGN / U+017F LATIN SMALL LETTER LONG S
        assert_eq!(extract("Ref # \u{212A}42").invoice_number, None);
        assert_eq!(extract("Ref #\u{17F}1").invoice_number, None);
        assert_eq!(
            extract("Ref #AB-\u{212A}9").invoice_number.as_deref(),
            Some("AB-")
        );
    }

    #[test]
    fn test_vendor_is_first_non_empty_line() {
        assert_eq!(
            extract("\n\n   Acme Corp   \nInvoice").vendor.as_deref(),
            Some("Acme Corp")
        );
        // 长度不超过 2 的首行不作为供应商
        assert_eq!(extract("AB\nAcme Corp").vendor, None);
    }

    #[test]
    fn test_vendor_length_counts_utf16_units() {
        assert_eq!(extract("\u{1F600}a").vendor.as_deref(), Some("\u{1F600}a"));
        assert_eq!(extract("\u{e9}\u{e8}").vendor, None);
    }

    #[test]
    fn test_dates_are_kept_verbatim() {
        let data = extract("Dated 5-6-24\nPayment Due: 31/12/2024");
        assert_eq!(data.invoice_date.as_deref(), Some("5-6-24"));
        assert_eq!(data.due_date.as_deref(), Some("31/12/2024"));
    }

    #[test]
    fn test_first_date_label_wins_even_if_it_is_the_due_date() {
        let data = extract("Due Date: 04/15/2024\nDate: 03/15/2024");
        assert_eq!(data.invoice_date.as_deref(), Some("04/15/2024"));
        assert_eq!(data.due_date.as_deref(), Some("04/15/2024"));
    }

    #[test]
    fn test_total_amount_and_usd() {
        let data = extract("Total: $1,234.56");
        assert_eq!(data.amount, Some(dec("1234.56")));
        assert_eq!(data.currency, Some(Currency::Usd));
    }

    #[test]
    fn test_subtotal_before_grand_total_wins() {
        let data = extract("Subtotal: $100.00\nTax: $8.00\nGrand Total: $108.00");
        assert_eq!(data.amount, Some(dec("100.00")));
    }

    #[test]
    fn test_amount_due_without_decimals() {
        let data = extract("Amount Due 1,500");
        assert_eq!(data.amount, Some(dec("1500")));
        assert_eq!(data.currency, None);
    }

    #[test]
    fn test_amount_with_trailing_dot_and_lone_comma() {
        assert_eq!(extract("TOTAL: 12.").amount, Some(dec("12")));
        assert_eq!(extract("Total: ,").amount, None);
    }

    #[test]
    fn test_currency_priority() {
        assert_eq!(extract("Betrag 50 EUR").currency, Some(Currency::Eur));
        assert_eq!(extract("Paid in £").currency, Some(Currency::Gbp));
        assert_eq!(extract("gbp and usd").currency, Some(Currency::Usd));
        assert_eq!(extract("€ and £").currency, Some(Currency::Eur));
        assert_eq!(extract("no money here").currency, None);
    }

    #[test]
    fn test_multiple_line_items_in_order() {
        let data = extract("Bolt  10  $1,000.00  $10,000.00\nNut 5 2.50 12.50");
        assert_eq!(
            data.items,
            Some(vec![
                ExtractedItem {
                    description: "Bolt".to_string(),
                    quantity: 10,
                    unit_price: dec("1000.00"),
                    total: dec("10000.00"),
                },
                ExtractedItem {
                    description: "Nut".to_string(),
                    quantity: 5,
                    unit_price: dec("2.50"),
                    total: dec("12.50"),
                },
            ])
        );
    }

    #[test]
    fn test_item_with_overflowing_quantity_is_skipped() {
        let data = extract("Bulk 99999999999 1.00 2.00");
        assert_eq!(data.items, None);
    }

    #[test]
    fn test_extract_is_idempotent() {
        assert_eq!(extract(SAMPLE), extract(SAMPLE));
    }
}
