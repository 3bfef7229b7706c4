use anyhow::Result;
use mailbatch::services::cancel::CancelRegistry;
use mailbatch::services::scheduler::QuotaScheduler;
use mailbatch::state::AppState;
use mailbatch::{config, db, routes, smtp};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mailbatch=debug")),
        )
        .init();

    let cfg = config::Config::from_env();
    let db_url = db::normalize_sqlite_url(&cfg.database_url);

    // Ensure file exists for file-based sqlite (avoid open error on some setups)
    if let Some(path) = db::db_file_path(&db_url) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        if !path.exists() {
            std::fs::File::create(&path).ok();
        }
    }

    let pool = sqlx::SqlitePool::connect(&db_url).await?;
    db::run_migrations(&pool, "migrations").await?;

    // One scheduler instance for the process lifetime
    let scheduler = QuotaScheduler::start(pool.clone());

    let state = AppState {
        pool,
        mailer: Arc::new(smtp::SmtpMailer::new()),
        cancels: CancelRegistry::default(),
    };

    let app = routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}
