use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{
    AppState, MIGRATOR,
    config::{AppConfig, AvatarBackend, StorageBackend},
    create_router,
    storage::{AvatarStorage, MemoryAvatarStorage, S3AvatarStorage},
};
use common::database::{DatabaseConfig, health_check, init_pool, migrate};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting finance API service");

    let config = AppConfig::load()?;

    let avatars: Arc<dyn AvatarStorage> = match config.avatars.backend {
        AvatarBackend::S3 => {
            info!("Storing avatars in bucket {}", config.avatars.bucket);
            Arc::new(S3AvatarStorage::new(&config.avatars).await?)
        }
        AvatarBackend::Memory => Arc::new(MemoryAvatarStorage::new(
            config.avatars.public_base_url.clone(),
        )),
    };

    let app_state = match config.storage {
        StorageBackend::Postgres => {
            // Initialize database connection pool
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            migrate(&pool, &MIGRATOR).await?;

            AppState::postgres(pool, avatars, config.avatars.max_bytes)
        }
        StorageBackend::Memory => {
            info!("Running on in-memory storage; data is lost on shutdown");
            AppState::memory(avatars, config.avatars.max_bytes)
        }
    };

    // Start the web server
    let app = create_router(app_state);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Finance API listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
