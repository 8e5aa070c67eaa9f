pub mod handlers;
pub mod middleware;

pub use handlers::*;

use crate::service::InvoiceService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tower::ServiceBuilder;

/// multipart 额外开销，保证超限文件由校验逻辑而非传输层报错
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub invoices: Arc<InvoiceService>,
    pub request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(invoices: InvoiceService) -> Self {
        Self {
            invoices: Arc::new(invoices),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.invoices.max_file_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let invoice_routes = Router::new()
        .route(
            "/api/invoices/upload",
            post(upload_invoice).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/invoices", get(list_invoices))
        .route(
            "/api/invoices/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/api/invoices/:id/approve", put(approve_invoice))
        .route("/api/invoices/:id/reject", put(reject_invoice))
        .route("/uploads/:filename", get(serve_upload));

    Router::new()
        .route("/health", get(health_check))
        .merge(invoice_routes)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_tracing,
        )))
        .with_state(state)
}
