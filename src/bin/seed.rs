use tracing_subscriber::EnvFilter;

use cms_backend::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!(
        "Seeding {} storage from {}",
        config.storage.as_str(),
        config.data_dir.display()
    );

    let store = cms_backend::db::open(&config).await?;
    let result = cms_backend::seed::seed(store.as_ref(), &config.data_dir).await;
    store.shutdown().await;

    let report = result?;
    tracing::info!(
        "Seeding completed: {} projects, {} clients, {} services",
        report.projects,
        report.clients,
        report.services
    );
    Ok(())
}
