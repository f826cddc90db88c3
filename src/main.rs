//! vault-reposecrets - HTTP Server Entry Point
//!
//! Starts the HTTP server that answers secret requests from the CI server.

use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault_reposecrets::{api, config::Config};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Configuration first: PLUGIN_DEBUG decides the default log level
    let config = Config::from_env()?;

    let default_filter = if config.debug {
        "vault_reposecrets=debug,tower_http=debug"
    } else {
        "vault_reposecrets=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.debug {
        debug!("enabled debug log");
    }
    info!(
        "Loaded configuration: vault={}, template={}",
        config.store.address, config.store.secret_path_template
    );

    api::serve(config).await?;

    Ok(())
}
