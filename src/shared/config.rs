//! Application configuration. API credentials, paths, tuning knobs.

use crate::domain::Credentials;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HTTP_PORT: u16 = 8765;
pub const DEFAULT_PROBE_BUDGET: usize = 50;
pub const DEFAULT_PROBE_LIMIT: usize = 10;
pub const DEFAULT_UNDO_DELAY_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Fallback when the credential file has none. Read from TG_SWEEP_API_ID.
    #[serde(default)]
    pub api_id: Option<i32>,
    #[serde(default)]
    pub api_hash: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,

    /// Root for sessions, exports and the credential file. Read from TG_SWEEP_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub credentials_path: Option<String>,

    #[serde(default)]
    pub http_port: Option<u16>,

    /// Max history probes per analysis (TG_SWEEP_PROBE_BUDGET).
    #[serde(default)]
    pub probe_budget: Option<usize>,
    /// Messages fetched per probe (TG_SWEEP_PROBE_LIMIT).
    #[serde(default)]
    pub probe_limit: Option<usize>,

    #[serde(default)]
    pub undo_delay_secs: Option<u64>,

    /// Use the in-memory demo account instead of Telegram.
    #[serde(default)]
    pub demo: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("TG_SWEEP_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(config::Environment::with_prefix("TG_SWEEP").try_parsing(true));
        c.build()?.try_deserialize()
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    /// Defaults to `<data_dir>/telegram_config.json`.
    pub fn credentials_path_or_default(&self) -> PathBuf {
        self.credentials_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir_or_default().join("telegram_config.json"))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir_or_default().join("sessions")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_dir_or_default().join("output")
    }

    pub fn http_port_or_default(&self) -> u16 {
        self.http_port.unwrap_or(DEFAULT_HTTP_PORT)
    }

    pub fn probe_budget_or_default(&self) -> usize {
        self.probe_budget.unwrap_or(DEFAULT_PROBE_BUDGET)
    }

    pub fn probe_limit_or_default(&self) -> usize {
        self.probe_limit.unwrap_or(DEFAULT_PROBE_LIMIT)
    }

    pub fn undo_delay_secs_or_default(&self) -> u64 {
        self.undo_delay_secs.unwrap_or(DEFAULT_UNDO_DELAY_SECS)
    }

    pub fn is_demo(&self) -> bool {
        self.demo.unwrap_or(false)
    }

    /// Credentials from the environment, used when the credential file is missing.
    pub fn fallback_credentials(&self) -> Option<Credentials> {
        match (self.api_id, self.api_hash.as_deref()) {
            (Some(api_id), Some(hash)) if api_id > 0 && !hash.trim().is_empty() => Some(Credentials {
                api_id,
                api_hash: hash.trim().to_string(),
                phone: self.phone.clone(),
            }),
            _ => None,
        }
    }
}
