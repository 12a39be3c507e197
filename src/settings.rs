use crate::orchestrator::DEFAULT_SPIN_DURATION;
use crate::wheel::DEFAULT_EXTRA_TURNS;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use log::LevelFilter;
use serde::Deserialize;
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "starspin";
const ENV_PREFIX: &str = "STARSPIN";
/// Lower bound for `redemption_code_len`.
pub const MIN_REDEMPTION_CODE_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    /// sqlx connection string, in-memory SQLite when unset.
    pub db: Option<String>,
    pub log_level: String,
    pub extra_turns: u32,
    pub spin_duration_ms: u64,
    pub redemption_code_len: usize,
    pub rate_limit: RateLimitSettings,
}
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_sec: i64,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8081,
            db: None,
            log_level: "debug".to_string(),
            extra_turns: DEFAULT_EXTRA_TURNS,
            spin_duration_ms: DEFAULT_SPIN_DURATION.as_millis() as u64,
            redemption_code_len: 8,
            rate_limit: RateLimitSettings::default(),
        }
    }
}
impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_sec: 60,
        }
    }
}
impl Settings {
    /// Reads `file` (any format `config` knows, optional) and then
    /// `STARSPIN_*` variables, e.g. `STARSPIN_RATE_LIMIT__MAX_REQUESTS`.
    pub fn load(file: &str) -> Result<Self> {
        Self::from_config(
            Config::builder()
                .add_source(File::with_name(file).required(false))
                .add_source(
                    Environment::with_prefix(ENV_PREFIX)
                        .prefix_separator("_")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }
    fn from_config(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Self = builder
            .build()
            .context("couldn't read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        if settings.redemption_code_len < MIN_REDEMPTION_CODE_LEN {
            bail!(
                "redemption_code_len must be at least {} but was {}",
                MIN_REDEMPTION_CODE_LEN,
                settings.redemption_code_len
            )
        }
        Ok(settings)
    }
    pub fn log_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .with_context(|| format!("unknown log level {}", self.log_level))
    }
}
