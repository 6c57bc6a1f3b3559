use service_core::config::get_env;
use service_core::observability::init_tracing;
use store_service::config::StoreConfig;
use store_service::services::metrics::init_metrics;
use store_service::startup::Application;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    let config = StoreConfig::load()?;

    let log_level = get_env("LOG_LEVEL", Some("info"), false)?;
    let otlp_endpoint = get_env("OTLP_ENDPOINT", Some("http://tempo:4317"), false)?;
    init_tracing("store-service", &log_level, &otlp_endpoint);

    init_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        port = config.common.port,
        "Starting store service"
    );

    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    tracing::info!("Store service stopped");
    Ok(())
}
