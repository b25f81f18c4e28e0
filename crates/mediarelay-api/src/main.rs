use mediarelay_api::setup;
use mediarelay_core::RelayConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = RelayConfig::from_env()?;

    let (_state, router) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, router).await?;

    Ok(())
}
