use super::rate::{CurrencyInfo, DEFAULT_BASE_CURRENCY, default_currencies};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Environment variable that overrides `uploads.base_url`.
pub const BASE_URL_ENV: &str = "API_BASE_URL";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RatesConfig {
    #[serde(default = "default_spread")]
    pub spread: f64,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<CurrencyInfo>,
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for RatesConfig {
    fn default() -> Self {
        RatesConfig {
            spread: default_spread(),
            currencies: default_currencies(),
            persist: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub exchange_rate_api: Option<ExchangeRateApiConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            exchange_rate_api: Some(ExchangeRateApiConfig {
                base_url: "https://api.exchangerate-api.com".to_string(),
                timeout_secs: default_timeout_secs(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UploadsConfig {
    pub root: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            hour: default_hour(),
            minute: 0,
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub data_path: Option<String>,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_spread() -> f64 {
    0.02
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_hour() -> u32 {
    7
}

// East Africa Time
fn default_utc_offset_hours() -> i32 {
    3
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

/// Picks the public base URL: environment first, then the config file.
/// Blank values count as unset.
pub fn resolve_base_url(configured: Option<&str>, env_value: Option<&str>) -> Option<String> {
    let usable = |url: &str| {
        let url = url.trim().trim_end_matches('/');
        (!url.is_empty()).then(|| url.to_string())
    };
    env_value.and_then(usable).or_else(|| configured.and_then(usable))
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("tz", "bankcms", "bankcms")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("tz", "bankcms", "bankcms")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn upload_root(&self) -> Result<PathBuf> {
        match &self.uploads.root {
            Some(root) => Ok(PathBuf::from(root)),
            None => Ok(self.data_path()?.join("uploads")),
        }
    }

    pub fn upload_base_url(&self) -> Option<String> {
        let env_value = std::env::var(BASE_URL_ENV).ok();
        resolve_base_url(self.uploads.base_url.as_deref(), env_value.as_deref())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let yaml_str = r#"
data_path: "/tmp/bankcms"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.base_currency, "TZS");
        assert_eq!(config.rates.spread, 0.02);
        assert_eq!(config.rates.currencies.len(), 12);
        assert!(config.rates.persist);
        assert_eq!(
            config.providers.exchange_rate_api.as_ref().unwrap().base_url,
            "https://api.exchangerate-api.com"
        );
        assert_eq!(config.schedule.hour, 7);
        assert_eq!(config.schedule.minute, 0);
        assert_eq!(config.schedule.utc_offset_hours, 3);
        assert_eq!(
            config.upload_root().unwrap(),
            PathBuf::from("/tmp/bankcms/uploads")
        );
    }

    #[test]
    fn test_config_overrides() {
        let yaml_str = r#"
base_currency: "KES"
rates:
  spread: 0.05
  persist: false
  currencies:
    - code: "USD"
      name: "US Dollar"
    - code: "TZS"
      name: "Tanzanian Shilling"
      flag: "TZ"
providers:
  exchange_rate_api:
    base_url: "http://example.com/fx"
    timeout_secs: 3
uploads:
  root: "/srv/uploads"
  base_url: "https://service.example.com/"
schedule:
  hour: 6
  minute: 30
  utc_offset_hours: 0
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.base_currency, "KES");
        assert_eq!(config.rates.spread, 0.05);
        assert!(!config.rates.persist);
        assert_eq!(config.rates.currencies.len(), 2);
        assert!(config.rates.currencies[0].flag.is_none());
        assert_eq!(config.rates.currencies[1].flag.as_deref(), Some("TZ"));

        let provider = config.providers.exchange_rate_api.clone().unwrap();
        assert_eq!(provider.base_url, "http://example.com/fx");
        assert_eq!(provider.timeout_secs, 3);

        assert_eq!(config.upload_root().unwrap(), PathBuf::from("/srv/uploads"));
        assert_eq!(config.schedule.minute, 30);
    }

    #[test]
    fn test_resolve_base_url() {
        assert_eq!(
            resolve_base_url(Some("https://a.example.com/"), None),
            Some("https://a.example.com".to_string())
        );
        assert_eq!(
            resolve_base_url(Some("https://a.example.com"), Some("https://b.example.com")),
            Some("https://b.example.com".to_string())
        );
        assert_eq!(resolve_base_url(Some("  "), None), None);
        assert_eq!(resolve_base_url(None, None), None);
    }

    #[test]
    fn test_blank_env_base_url_keeps_configured() {
        assert_eq!(
            resolve_base_url(Some("https://cms.example.com"), Some("")),
            Some("https://cms.example.com".to_string())
        );
        assert_eq!(
            resolve_base_url(Some("https://cms.example.com/"), Some("   ")),
            Some("https://cms.example.com".to_string())
        );
        assert_eq!(resolve_base_url(None, Some(" ")), None);
    }
}
