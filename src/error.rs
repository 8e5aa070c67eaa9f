use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// OCR 识别错误
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("failed to start OCR engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("OCR task aborted: {0}")]
    Join(String),
}

/// 服务层统一错误
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Multipart(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 转换为 HTTP 响应；500 时只返回操作级别的通用消息，细节写入日志
    pub fn into_response_with(self, failure_message: &str) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Database(sqlx::Error::RowNotFound) => "Invoice not found".to_string(),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("{}: {:?}", failure_message, self);
                failure_message.to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with("Internal server error")
    }
}

pub type AppResult<T> = Result<T, AppError>;
