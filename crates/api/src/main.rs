use anyhow::Context;

use gatekeeper_infra::GatekeeperConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatekeeper_observability::init();

    let config = GatekeeperConfig::from_env().context("invalid configuration")?;
    if config.jwt_secret_is_default {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = gatekeeper_api::app::services::build_services(&config)
        .await
        .context("failed to build services")?;
    let app = gatekeeper_api::app::build_app(config.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
