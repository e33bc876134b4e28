use crate::core::error::{StoreError, StoreResult};
use crate::core::rate::{ExchangeRate, RateStore};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const PARTITION_NAME: &str = "exchange_rates";

/// Rate store persisted in a fjall partition, one JSON record per currency code.
pub struct DiskRateStore {
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
    // Serializes check-then-write sequences so the code stays unique.
    write_lock: Mutex<()>,
}

impl DiskRateStore {
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        let keyspace = fjall::Config::new(db_path).open()?;
        let partition = keyspace.open_partition(PARTITION_NAME, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: Arc::new(keyspace),
            partition,
            write_lock: Mutex::new(()),
        })
    }

    fn read(&self, currency_code: &str) -> StoreResult<Option<ExchangeRate>> {
        match self.partition.get(currency_code)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn write(&self, rate: &ExchangeRate) -> StoreResult<()> {
        self.partition
            .insert(rate.currency_code.as_str(), serde_json::to_vec(rate)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl RateStore for DiskRateStore {
    async fn get(&self, currency_code: &str) -> StoreResult<Option<ExchangeRate>> {
        let rate = self.read(currency_code)?;
        if rate.is_some() {
            debug!("Rate HIT for {}", currency_code);
        } else {
            debug!("Rate MISS for {}", currency_code);
        }
        Ok(rate)
    }

    async fn list(&self, active_only: bool) -> StoreResult<Vec<ExchangeRate>> {
        let mut rates = Vec::new();
        for item in self.partition.iter() {
            let (_, value) = item?;
            let rate: ExchangeRate = serde_json::from_slice(&value)?;
            if !active_only || rate.active {
                rates.push(rate);
            }
        }
        Ok(rates)
    }

    async fn insert(&self, rate: ExchangeRate) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.partition.contains_key(rate.currency_code.as_str())? {
            return Err(StoreError::Duplicate(rate.currency_code));
        }
        self.write(&rate)?;
        debug!("Rate INSERT for {}", rate.currency_code);
        Ok(())
    }

    async fn update(&self, rate: ExchangeRate) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if !self.partition.contains_key(rate.currency_code.as_str())? {
            return Err(StoreError::NotFound(rate.currency_code));
        }
        self.write(&rate)?;
        debug!("Rate UPDATE for {}", rate.currency_code);
        Ok(())
    }

    async fn remove(&self, currency_code: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        if !self.partition.contains_key(currency_code)? {
            return Ok(false);
        }
        self.partition.remove(currency_code)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Rate REMOVE for {}", currency_code);
        Ok(true)
    }
}
