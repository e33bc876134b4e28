pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::rate::{NewRate, RatePatch};
use crate::core::schedule::DailySchedule;
use crate::core::{RatePolicy, RateSyncEngine, UploadArtifactManager};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_QUOTE_URL: &str = "https://api.exchangerate-api.com";

pub enum AppCommand {
    Sync,
    Rates { all: bool },
    AddRate(NewRate),
    UpdateRate { currency_code: String, patch: RatePatch },
    RemoveRate { currency_code: String },
    Schedule,
    Upload { file: PathBuf, category: String },
    Replace { locator: String, file: PathBuf, category: String },
    Delete { locator: String, category: String },
}

/// Components built once from the loaded configuration.
pub struct App {
    pub config: AppConfig,
    pub engine: RateSyncEngine,
    pub uploads: UploadArtifactManager,
}

impl App {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let (base_url, timeout_secs) = config
            .providers
            .exchange_rate_api
            .as_ref()
            .map_or((DEFAULT_QUOTE_URL, 10), |p| (p.base_url.as_str(), p.timeout_secs));
        let source = providers::exchangerate_api::ExchangeRateApiProvider::new(
            base_url,
            Duration::from_secs(timeout_secs),
        );

        let store = store::open_rate_store(&config)?;
        let policy = RatePolicy::from_config(&config).context("Invalid rates configuration")?;
        let engine = RateSyncEngine::new(Arc::new(source), store, policy);
        let uploads = UploadArtifactManager::from_config(&config)?;

        Ok(Self {
            config,
            engine,
            uploads,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("bankcms starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::from_config(config)?;

    match command {
        AppCommand::Sync => cli::rates::run_sync(&app.engine).await,
        AppCommand::Rates { all } => cli::rates::run_list(&app.engine, all).await,
        AppCommand::AddRate(input) => {
            cli::rates::run_add(&app.engine, input, &app.config.base_currency).await
        }
        AppCommand::UpdateRate {
            currency_code,
            patch,
        } => cli::rates::run_update(&app.engine, &currency_code, patch).await,
        AppCommand::RemoveRate { currency_code } => {
            cli::rates::run_remove(&app.engine, &currency_code).await
        }
        AppCommand::Schedule => {
            let schedule = DailySchedule::from_config(&app.config.schedule)?;
            cli::rates::run_schedule(&app.engine, &schedule).await
        }
        AppCommand::Upload { file, category } => {
            cli::uploads::run_upload(&app.uploads, &file, &category).await
        }
        AppCommand::Replace {
            locator,
            file,
            category,
        } => cli::uploads::run_replace(&app.uploads, &locator, &file, &category).await,
        AppCommand::Delete { locator, category } => {
            cli::uploads::run_delete(&app.uploads, &locator, &category).await
        }
    }
}
