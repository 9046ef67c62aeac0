use agropulse::{router, AppConfig, AppState};
use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agropulse=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().inspect_err(|e| error!("❌ {e}"))?;
    info!("Using model {}", config.model);

    let state = AppState::from_config(&config).context("failed to build Gemini client")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!("🚀 Server running on http://{}", config.bind_addr);
    info!("🌿 Open in your browser to start diagnosing!");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
