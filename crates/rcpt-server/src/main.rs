use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use rcpt_core::{ExtractionEngine, RcptConfig, ReceiptStore};
use rcpt_server::{AppState, router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Optional JSON config file; environment variables override it.
const ENV_CONFIG: &str = "RCPT_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
    let config = RcptConfig::load(config_path.as_deref())
        .with_context(|| format!("failed to load configuration from {config_path:?}"))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                format!(
                    "rcpt_server={level},rcpt_core={level},tower_http={level}",
                    level = config.logging.level
                )
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting rcpt server...");

    if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = ReceiptStore::open(&config.database.path)
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;

    let engine = build_engine(&config);
    if !engine.has_ocr() {
        tracing::warn!(
            "OCR unavailable (model dir {}); only PDFs with a text layer can be processed",
            config.ocr.model_dir.display()
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.host))?;

    let app = router(AppState::new(config, store, engine));

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(feature = "native")]
fn build_engine(config: &RcptConfig) -> ExtractionEngine {
    ExtractionEngine::from_config(config)
}

#[cfg(not(feature = "native"))]
fn build_engine(config: &RcptConfig) -> ExtractionEngine {
    ExtractionEngine::new(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
