use crate::api::AppState;
use crate::error::AppError;
use crate::models::{
    ApproveRequest, DeleteResponse, ListQuery, RejectRequest, UpdateInvoiceRequest,
    UploadResponse,
};
use crate::service::storage::content_type_for;
use axum::{
    body::Bytes,
    extract::{Json, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 上传发票文件 (multipart 字段名: file)
pub async fn upload_invoice(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, String, Bytes)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return AppError::Multipart(format!("Invalid multipart body: {}", e))
                    .into_response_with("Failed to process invoice")
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((file_name, content_type, bytes)),
            Err(e) => {
                return AppError::Multipart(format!("Failed to read uploaded file: {}", e))
                    .into_response_with("Failed to process invoice")
            }
        }
        break;
    }

    let Some((file_name, content_type, bytes)) = upload else {
        return AppError::Validation("No file uploaded".to_string())
            .into_response_with("Failed to process invoice");
    };

    match state.invoices.upload(&file_name, &content_type, &bytes).await {
        Ok(invoice) => (
            StatusCode::OK,
            Json(UploadResponse {
                success: true,
                invoice,
            }),
        )
            .into_response(),
        Err(e) => e.into_response_with("Failed to process invoice"),
    }
}

/// 发票列表: ?status=&page=&limit=
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.invoices.list(&query).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => e.into_response_with("Failed to fetch invoices"),
    }
}

pub async fn get_invoice(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match state.invoices.get(id).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => e.into_response_with("Failed to fetch invoice"),
    }
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let (id, req) = match parse_request::<UpdateInvoiceRequest>(&id, &body) {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };
    match state.invoices.update(id, req).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => e.into_response_with("Failed to update invoice"),
    }
}

pub async fn delete_invoice(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match state.invoices.delete(id).await {
        Ok(()) => (StatusCode::OK, Json(DeleteResponse { success: true })).into_response(),
        Err(e) => e.into_response_with("Failed to delete invoice"),
    }
}

/// 审批通过 (body 可为空)
pub async fn approve_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let (id, req) = match parse_request::<ApproveRequest>(&id, &body) {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };
    match state.invoices.approve(id, req).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => e.into_response_with("Failed to approve invoice"),
    }
}

/// 拒绝 (必须提供 reason)
pub async fn reject_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let (id, req) = match parse_request::<RejectRequest>(&id, &body) {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };
    match state.invoices.reject(id, req).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => e.into_response_with("Failed to reject invoice"),
    }
}

/// 返回已上传的原始文件
pub async fn serve_upload(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    match state.invoices.store().read(&filename).await {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&filename))],
            bytes,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" }))).into_response(),
        Err(e) => AppError::Storage(e).into_response_with("Failed to read file"),
    }
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid invoice id: {}", raw)))
}

fn parse_request<T: DeserializeOwned + Default>(id: &str, body: &[u8]) -> Result<(Uuid, T), AppError> {
    Ok((parse_id(id)?, parse_body(body)?))
}

/// 空 body 视为默认值
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_empty_is_default() {
        let req: ApproveRequest = parse_body(b"").unwrap();
        assert!(req.approved_by.is_none());
        let req: ApproveRequest = parse_body(b"  \n").unwrap();
        assert!(req.notes.is_none());
    }

    #[test]
    fn test_parse_body_reads_camel_case() {
        let req: ApproveRequest = parse_body(br#"{"approvedBy":"alice","notes":"ok"}"#).unwrap();
        assert_eq!(req.approved_by.as_deref(), Some("alice"));
        assert_eq!(req.notes.as_deref(), Some("ok"));
    }

    #[test]
    fn test_parse_body_rejects_malformed_json() {
        assert!(matches!(
            parse_body::<RejectRequest>(b"{reason"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
