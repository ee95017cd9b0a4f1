use storefront_service::{config::StorefrontConfig, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = StorefrontConfig::from_env()?;

    service_core::observability::init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    let application = Application::build(config).await?;
    tracing::info!(port = application.http_port(), "Storefront service listening");
    application.run_until_stopped().await?;

    Ok(())
}
