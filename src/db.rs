use crate::config::{Config, StoreBackend};
use crate::store::DocumentStore;
use crate::store::memory::MemoryStore;
use crate::store::mysql::MySqlStore;
use anyhow::Context;
use sqlx::MySqlPool;
use std::sync::Arc;

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPool::connect(database_url).await
}

/// Builds the configured document store, creating the MySQL schema when needed.
pub async fn init_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory document store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::MySql => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the mysql backend")?;
            let pool = init_db(url)
                .await
                .context("Failed to connect to database")?;
            let store = MySqlStore::new(pool);
            store
                .migrate()
                .await
                .context("Failed to create the documents table")?;
            Ok(Arc::new(store))
        }
    }
}
