//! `tabletalk serve` — start the HTTP API server.

use std::sync::Arc;

use tabletalk_config::AppConfig;
use tabletalk_engine::ChatEngine;
use tabletalk_gateway::{build_router, AppState};
use tabletalk_mcp::McpGateway;
use tabletalk_model::OpenAiClient;
use tabletalk_store::SqliteStore;

pub async fn run(
    mut config: AppConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let api_key = config
        .model
        .api_key
        .clone()
        .ok_or("no API key configured; set TABLETALK_API_KEY or model.api_key")?;

    let store = Arc::new(SqliteStore::new(&config.database.path).await?);
    let client = Arc::new(OpenAiClient::new(
        &config.model.base_url,
        api_key,
        &config.model.model,
    ));
    let gateway = Arc::new(McpGateway::connect(&config.tools).await?);

    let engine = Arc::new(ChatEngine::new(
        client,
        store.clone(),
        gateway.clone(),
        config.engine.max_rounds,
    ));

    let state = Arc::new(AppState {
        engine,
        store,
    });
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(%addr, model = %config.model.model, "tabletalk listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
