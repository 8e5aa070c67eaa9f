use bigdecimal::{BigDecimal, Zero};

use crate::error::{AppError, AppResult};
use crate::models::{parse_loose_date, RejectRequest, UpdateInvoiceRequest};

/// 允许上传的 MIME 类型
pub const ALLOWED_FILE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "application/pdf",
];

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10_485_760;

/// 校验上传文件的类型与大小
pub fn validate_file(content_type: &str, size: u64, max_size: u64) -> AppResult<()> {
    if !ALLOWED_FILE_TYPES.contains(&content_type) {
        return Err(AppError::Validation(
            "Invalid file type. Please upload an image (JPG, PNG, WebP) or PDF.".to_string(),
        ));
    }

    if size > max_size {
        return Err(AppError::Validation(format!(
            "File size exceeds {}MB limit.",
            format_megabytes(max_size)
        )));
    }

    Ok(())
}

fn format_megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / 1024.0 / 1024.0;
    if mb.fract() == 0.0 {
        format!("{}", mb as u64)
    } else {
        format!("{:.2}", mb)
    }
}

impl UpdateInvoiceRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(number) = &self.invoice_number {
            require_non_empty(number, "Invoice number is required")?;
        }
        if let Some(vendor) = &self.vendor {
            require_non_empty(vendor, "Vendor is required")?;
        }
        if let Some(amount) = &self.amount {
            require_positive(amount, "Amount must be positive")?;
        }
        if let Some(date) = &self.invoice_date {
            if parse_loose_date(date).is_none() {
                return Err(AppError::Validation(format!("Invalid invoice date: {}", date)));
            }
        }
        if let Some(date) = &self.due_date {
            if parse_loose_date(date).is_none() {
                return Err(AppError::Validation(format!("Invalid due date: {}", date)));
            }
        }

        for item in self.items.iter().flatten() {
            require_non_empty(&item.description, "Description is required")?;
            if item.quantity <= 0 {
                return Err(AppError::Validation("Quantity must be positive".to_string()));
            }
            require_positive(&item.unit_price, "Unit price must be positive")?;
            require_positive(&item.total, "Total must be positive")?;
        }

        Ok(())
    }
}

impl RejectRequest {
    /// 返回去除首尾空白后的拒绝原因
    pub fn validated_reason(&self) -> AppResult<String> {
        match self.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => Ok(reason.to_string()),
            _ => Err(AppError::Validation("Rejection reason is required".to_string())),
        }
    }
}

fn require_non_empty(value: &str, message: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

fn require_positive(value: &BigDecimal, message: &str) -> AppResult<()> {
    if *value <= BigDecimal::zero() {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}
