//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod quote;
pub mod rate;
pub mod schedule;
pub mod sync;
pub mod uploads;

// Re-export main types for cleaner imports
pub use error::{StoreError, SyncError, UploadError};
pub use quote::{QuoteSet, QuoteSource};
pub use rate::{CurrencyInfo, ExchangeRate, RateStore};
pub use sync::{RatePolicy, RateSyncEngine, RateUpdate, SyncAction, SyncReport};
pub use uploads::{Artifact, Payload, RequestOrigin, UploadArtifactManager};
