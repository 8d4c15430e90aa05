use anyhow::Context;
use dealdesk::{api, config::Config, db, DeskService, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    let port = config.port;

    let pool = db::init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    if let Some(path) = &config.tax_rates_csv {
        db::seed_tax_rates(&repo, path)
            .await
            .with_context(|| format!("failed to load tax rates from {}", path))?;
    }

    let service = Arc::new(DeskService::new(repo, config.placeholder_tax_rate));
    let app = api::create_router(api::AppState::new(service));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
