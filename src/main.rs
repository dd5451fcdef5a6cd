use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use warehouse_bootstrap::config::RuntimeConfig;
use warehouse_bootstrap::service::bootstrap;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let runtime = RuntimeConfig::from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(runtime.loglevel.clone()));
    // stdout is reserved for the job's progress lines
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        config_path = %runtime.config_path.display(),
        warehouse_dir = %runtime.warehouse_dir.display(),
        catalog_url = %runtime.catalog_url.as_deref().unwrap_or("<warehouse metastore>"),
        loglevel = %runtime.loglevel
    );

    let report = bootstrap::run_configured(&runtime).await?;
    info!(
        app = %report.app_name,
        dropped = report.dropped.len(),
        tables = report.tables.len(),
        "warehouse bootstrap finished"
    );
    Ok(())
}
