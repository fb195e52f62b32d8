use saymon_datasource::{api, config::ServiceConfig, logging, metrics, SERVICE_NAME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load()?;

    // Initialize logging
    logging::init_logger(SERVICE_NAME, config.log_json)?;

    config.validate()?;

    // Initialize metrics
    metrics::init_metrics();

    api::start_server(config).await?;

    Ok(())
}
