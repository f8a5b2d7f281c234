use tenx_scan::config::{config_arg, Config};
use tenx_scan::pipeline;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config: an explicit --config must exist, the default may not
    let args: Vec<String> = std::env::args().collect();
    let (config, source) = Config::resolve(config_arg(&args).as_deref())?;

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("tenx-scan v{} starting", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => info!("no config file found, using env-only config"),
    }

    let summary = pipeline::run(&config).await?;
    info!(
        holders = summary.holders,
        contracts = summary.contracts,
        "found {} total 10x holders across all contracts",
        summary.holders
    );

    Ok(())
}
