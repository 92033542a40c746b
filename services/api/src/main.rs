use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::{
    AppState,
    config::{Persistence, Settings},
    repositories::run_migrations,
    routes,
};
use common::database::{DatabaseConfig, health_check, init_pool};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting API service");

    let settings = Settings::load()?;

    let storage = media::connect(&settings.storage).await?;
    let policy = settings.storage.policy();

    let state = match settings.server.persistence {
        Persistence::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            // Check database connectivity
            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool).await?;
            info!("Database migrations applied");

            AppState::postgres(pool, storage, policy)
        }
        Persistence::Memory => {
            warn!("Using in-memory persistence, data is lost on restart");
            AppState::in_memory(storage, policy)
        }
    };

    let app = routes::with_http_layers(routes::create_router(state), &settings)?;

    let address = settings.address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
