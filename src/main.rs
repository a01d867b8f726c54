use std::sync::Arc;

use axum::{Extension, Router, extract::DefaultBodyLimit};
use tower_http::{
    limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer,
};

use watch_server::{
    config::Config,
    db,
    error::AppErr,
    hub::SyncHub,
    routes,
    state::{RoomRegistry, UploadLog},
    store::RoomStore,
    utils::clean,
};

const BODY_LIMIT: usize = 10 * 1024 * 1024 * 1024; // uploads are whole videos

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = Arc::new(Config::from_env()?);
    let pool = db::connect(&cfg.database_url).await?;
    tokio::fs::create_dir_all(&cfg.library_root).await?;

    let hub = SyncHub::new(RoomRegistry::default(), RoomStore::new(pool.clone()));
    let uploads = UploadLog::default();

    tokio::spawn(clean::task(uploads.clone(), cfg.upload_disk_cap));

    let app = Router::new()
        .merge(routes::router())
        .nest_service("/media", ServeDir::new(&cfg.library_root))
        .fallback_service(ServeDir::new("static"))
        .layer(Extension(pool))
        .layer(Extension(hub))
        .layer(Extension(uploads))
        .layer(Extension(cfg.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));

    tracing::info!(addr = %cfg.bind_addr, library = %cfg.library_root.display(), "listening");
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
