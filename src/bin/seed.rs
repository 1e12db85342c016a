//! One-shot demo seeding tool / 演示数据初始化工具
//!
//! Resets and repopulates the demo collections, then prints what every query
//! operation returns. Runs independently of the server.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use employee_search::{backend, config, seed, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "employee_search=debug,seed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = config::load_config().map_err(|e| anyhow::anyhow!(e))?;

    let backend = backend::connect(&app_config.backend)?;
    let info = backend.ping().await?;
    tracing::info!("Seeding {} (version {})", info.name, info.version);

    let services = Services::new(backend, &app_config.search);
    let report = seed::run(&services, &app_config.search).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
