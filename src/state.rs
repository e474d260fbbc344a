//! Application state: the store, the progress engine built on it, and startup
//! seeding of the lesson catalog.

use std::{path::PathBuf, sync::Arc};

use tracing::{info, instrument};

use crate::config::{load_config_from_env, ServiceConfig};
use crate::engine::ProgressEngine;
use crate::error::StoreError;
use crate::seeds::{seed_catalog, seed_lessons};
use crate::store::{MemoryStore, ProgressStore};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProgressEngine>,
}

impl AppState {
    /// Build state from env: load config, open the store, seed the catalog.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env() -> Result<Self, StoreError> {
        let cfg = load_config_from_env().unwrap_or_default();

        let store: Arc<dyn ProgressStore> = match std::env::var("STORE_SNAPSHOT_PATH") {
            Ok(path) if !path.trim().is_empty() => Arc::new(MemoryStore::open(PathBuf::from(path)).await?),
            _ => {
                info!(target: "finelo_backend", "STORE_SNAPSHOT_PATH not set; progress is kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };

        Self::with_store(store, cfg).await
    }

    /// Build state around an existing store and seed it.
    pub async fn with_store(store: Arc<dyn ProgressStore>, cfg: ServiceConfig) -> Result<Self, StoreError> {
        let bank = cfg.lesson_bank();
        let catalog = if bank.is_empty() { seed_lessons() } else { bank };
        seed_catalog(store.as_ref(), catalog).await?;

        let levels = cfg.level_table();
        info!(
            target: "finelo_backend",
            policy = ?cfg.unlock,
            levels = levels.levels().len(),
            lesson_xp = cfg.rewards.lesson_xp,
            "Progress engine configured"
        );

        let engine = ProgressEngine::new(store, cfg.rewards, levels, cfg.unlock);
        Ok(Self { engine: Arc::new(engine) })
    }
}
