// Web-based learning record generator using Google Gemini

use std::sync::Arc;

use anyhow::Context;
use learning_portfolio::{router, AppState, Config, GeminiClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Config::load().context("loading configuration")?;
    let gemini = GeminiClient::new(&config.gemini)?;
    let state = Arc::new(AppState { gemini });

    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!(
        model = %config.gemini.model,
        "🚀 Server running on http://{}",
        config.bind_addr
    );

    axum::serve(listener, app).await?;
    Ok(())
}
