use std::sync::Arc;

use anyhow::Context;

use kirana_api::app::services::AppServices;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kirana_observability::init();

    let services = Arc::new(
        AppServices::from_env()
            .await
            .context("failed to initialize services")?,
    );
    let app = kirana_api::app::build_app(services);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
