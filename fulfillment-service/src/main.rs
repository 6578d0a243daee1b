use fulfillment_service::config::FulfillmentConfig;
use fulfillment_service::services::{get_metrics, init_metrics, Repository};
use fulfillment_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FulfillmentConfig::load()?;
    init_tracing(&config.common.service_name, &config.common.log_level);
    init_metrics();

    let app = Application::build(config).await?;

    let challans = app.service().repositories().challans.load_all().await?;
    tracing::info!(
        challans = challans.value.len(),
        freshness = ?challans.freshness,
        "Store reachable"
    );

    tokio::signal::ctrl_c().await?;
    tracing::debug!(metrics = %get_metrics(), "Shutting down");
    Ok(())
}
