use anyhow::Context;

use stockline_api::app::{self, services};
use stockline_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockline_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = app::build_services(&config).await?;
    let _change_log = services::spawn_change_log(&services.bus);

    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}
