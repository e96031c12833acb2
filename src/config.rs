use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct GuardSecrets {
    #[serde(default)]
    pub steamid: String,
    #[serde(default)]
    pub shared_secret: String,
    #[serde(default)]
    pub identity_secret: String,
}

/// Account credentials. Login itself is handled by the external session
/// layer, which reads these values; this service only checks they are present.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub username: String,
    pub password: String,
    pub guard_secrets: GuardSecrets,
}

impl Credentials {
    /// Names of the credential fields left empty.
    pub fn missing(&self) -> Vec<&'static str> {
        let fields = [
            ("api_key", &self.api_key),
            ("username", &self.username),
            ("password", &self.password),
            ("guard_secrets.steamid", &self.guard_secrets.steamid),
            ("guard_secrets.shared_secret", &self.guard_secrets.shared_secret),
            ("guard_secrets.identity_secret", &self.guard_secrets.identity_secret),
        ];
        fields
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    pub app_id: u32,
    pub currency: u32,
    pub country: String,
    pub language: String,
    pub request_timeout_seconds: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://steamcommunity.com".into(),
            app_id: 578080,
            currency: 1,
            country: "USA".into(),
            language: "english".into(),
            request_timeout_seconds: 10,
        }
    }
}

/// Window parameters of the analysis recipes. The hour values are empirical.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub trend_mean_hours: i64,
    pub extrema_mean_hours: i64,
    pub deviation_hours: i64,
    pub week_days: i64,
    pub month_days: i64,
    pub extrema_method: String,
    pub extrema_order: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            trend_mean_hours: 168,
            extrema_mean_hours: 4,
            deviation_hours: 24,
            week_days: 7,
            month_days: 31,
            extrema_method: "argrelextrema".into(),
            extrema_order: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub step_delay_ms: u64,
    pub action_timeout_seconds: u64,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
    /// A stored history younger than this is reused instead of fetched; 0 always fetches.
    pub history_max_age_seconds: u64,
    pub run_forever: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 500,
            action_timeout_seconds: 30,
            max_attempts: 5,
            backoff_base_seconds: 30,
            backoff_max_seconds: 900,
            history_max_age_seconds: 3600,
            run_forever: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfig {
    pub item_name_id: u64,
    pub market_hash_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub credentials: Credentials,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    pub items: Vec<ItemConfig>,
}

fn default_database_path() -> String {
    "data.db".into()
}

fn default_check_interval() -> u64 {
    3600
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(content)?;
    Ok(config)
}
