// ⚙️ Configuration
// Defaults → optional TOML file → APPRAISAL__* environment variables

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "appraisal.toml";

/// Environment variable prefix (`APPRAISAL__FEES__REPORT=400`)
pub const ENV_PREFIX: &str = "APPRAISAL";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Appraiser identity used by the CLI (the server reads it per request)
    pub actor: String,

    pub fees: FeeSchedule,
    pub server: ServerConfig,
    pub insight: InsightConfig,
}

/// Fee credited per recorded appraisal; the dashboard and reports each have their own rate
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FeeSchedule {
    pub dashboard: f64,
    pub report: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            dashboard: 300.0,
            report: 350.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// `path` overrides the default `appraisal.toml`; a missing default file is fine,
    /// a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let fees = FeeSchedule::default();

        let mut builder = config::Config::builder()
            .set_default("database_path", "appraisals.db")?
            .set_default("actor", "local-appraiser")?
            .set_default("fees.dashboard", fees.dashboard)?
            .set_default("fees.report", fees.report)?
            .set_default("server.bind", "0.0.0.0:3000")?
            .set_default("insight.model", "gemini-3-flash-preview")?
            .set_default("insight.timeout_secs", 15)?;

        builder = match path {
            Some(p) => builder.add_source(config::File::from(p).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, fee) in [("fees.dashboard", self.fees.dashboard), ("fees.report", self.fees.report)] {
            if !fee.is_finite() || fee < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{} must be a non-negative number, got {}",
                    name, fee
                )));
            }
        }

        if self.actor.trim().is_empty() {
            return Err(ConfigError::Validation("actor must not be empty".to_string()));
        }

        if self.insight.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "insight.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// API key from config, falling back to the conventional GEMINI_API_KEY variable
    pub fn insight_api_key(&self) -> Option<String> {
        self.insight
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }
}
