use invoice_approval::{
    create_pool, router, run_migrations, AppConfig, AppState, FileStore, InvoiceService,
    TesseractCli,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池并执行迁移
    let pool = create_pool(&config.database.url, config.database.max_connections).await?;
    info!("Database pool created");
    run_migrations(&pool).await?;
    info!("Database migrations applied");

    let store = FileStore::new(&config.storage.upload_dir);
    let ocr = Arc::new(TesseractCli::new(&config.ocr));
    let service = InvoiceService::new(pool, store, ocr, config.storage.max_file_size);

    let app = router(AppState::new(service));

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST   /api/invoices/upload       - upload + OCR");
    info!("  GET    /api/invoices              - list (status, page, limit)");
    info!("  GET    /api/invoices/:id          - detail");
    info!("  PUT    /api/invoices/:id          - update");
    info!("  DELETE /api/invoices/:id          - delete");
    info!("  PUT    /api/invoices/:id/approve  - approve");
    info!("  PUT    /api/invoices/:id/reject   - reject");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
