pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::rate::RateStore;
use anyhow::{Context, Result};
use disk::DiskRateStore;
use memory::MemoryRateStore;
use std::sync::Arc;
use tracing::debug;

/// Opens the rate store selected by `rates.persist`.
pub fn open_rate_store(config: &AppConfig) -> Result<Arc<dyn RateStore>> {
    if !config.rates.persist {
        debug!("Using in-memory rate store");
        return Ok(Arc::new(MemoryRateStore::new()));
    }

    let db_path = config.data_path()?.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("Failed to create directory: {}", db_path.display()))?;
    debug!("Opening rate store at {}", db_path.display());

    let store = DiskRateStore::open(&db_path)
        .with_context(|| format!("Failed to open rate store at {}", db_path.display()))?;
    Ok(Arc::new(store))
}
