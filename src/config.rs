//! Configuration loading and management for slotwatch.
//!
//! Loads settings from `slotwatch.toml` with environment variable overrides. The
//! environment names match the `.env` keys the watcher has always used.

use crate::decision::AlertPolicy;
use crate::extract::{ExtractError, Extractor};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE: &str = "slotwatch.toml";
const REDACTED: &str = "********";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    RenderError(#[from] toml::ser::Error),
    #[error("no page URL is set (set START_URL or SCHEDULE_URL)")]
    MissingUrl,
    #[error("{name}: '{value}' is not a YYYY-MM-DD date")]
    InvalidDate { name: String, value: String },
    #[error("{name}: '{value}' is not a number")]
    InvalidNumber { name: String, value: String },
    #[error(transparent)]
    Selector(#[from] ExtractError),
}

/// The page being watched and how to read it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Entry page; fetched when no schedule URL is set
    pub start_url: String,
    /// Scheduling page, preferred over `start_url` when present
    pub schedule_url: Option<String>,
    /// CSS rule matching the availability indicators
    pub selector: String,
    /// Saved browser session, used if the file exists
    pub session_path: PathBuf,
    /// Upper bound on a single page fetch
    pub fetch_timeout_ms: u64,
}

/// Polling cadence and alert gating
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between cycles; zero or negative runs a single cycle
    pub interval_secs: i64,
    /// Upper bound of the random extra delay, in seconds
    pub jitter_secs: u64,
    /// Latest acceptable date, e.g. `"2025-07-01"`; any date qualifies when unset
    pub earliest_target_date: Option<NaiveDate>,
    pub alert_policy: AlertPolicy,
}

/// Telegram bot credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

/// SMTP relay and addresses for email alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub schedule: ScheduleConfig,
    pub telegram: TelegramConfig,
    pub email: EmailConfig,
}

/// Command-line values that win over file and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub selector: Option<String>,
    pub interval_secs: Option<i64>,
    pub jitter_secs: Option<u64>,
    pub target_date: Option<NaiveDate>,
    pub session_path: Option<PathBuf>,
    pub once: bool,
}

impl Config {
    /// Load configuration from `path`, or from the default location when `None`.
    ///
    /// A missing default file is not an error; defaults and the environment apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => match Self::find_config_file() {
                Some(found) => Self::load_from(&found)?,
                None => Config::default(),
            },
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific path, without environment overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        let home_config = dirs::home_dir()?
            .join(".config")
            .join("slotwatch")
            .join(CONFIG_FILE);
        home_config.exists().then_some(home_config)
    }

    /// Override settings from environment variables.
    ///
    /// `lookup` returns the raw variable; blank values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = var("START_URL") {
            self.target.start_url = url;
        }
        if let Some(url) = var("SCHEDULE_URL") {
            self.target.schedule_url = Some(url);
        }
        if let Some(selector) = var("AVAIL_SELECTOR") {
            self.target.selector = selector;
        }
        if let Some(value) = var("CHECK_INTERVAL_SECONDS") {
            self.schedule.interval_secs = parse_number("CHECK_INTERVAL_SECONDS", &value)?;
        }
        if let Some(value) = var("RANDOM_SLEEP_JITTER") {
            self.schedule.jitter_secs = parse_number("RANDOM_SLEEP_JITTER", &value)?;
        }
        if let Some(value) = var("EARLIEST_TARGET_DATE") {
            self.schedule.earliest_target_date =
                Some(parse_target_date("EARLIEST_TARGET_DATE", &value)?);
        }

        if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat) = var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat);
        }

        if let Some(host) = var("SMTP_HOST") {
            self.email.smtp_host = Some(host);
        }
        if let Some(value) = var("SMTP_PORT") {
            self.email.smtp_port = parse_number("SMTP_PORT", &value)?;
        }
        if let Some(user) = var("SMTP_USER") {
            self.email.smtp_user = Some(user);
        }
        if let Some(pass) = var("SMTP_PASS") {
            self.email.smtp_pass = Some(pass);
        }
        if let Some(from) = var("EMAIL_FROM") {
            self.email.from = Some(from);
        }
        if let Some(to) = var("EMAIL_TO") {
            self.email.to = Some(to);
        }

        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.url {
            self.target.start_url = url;
            self.target.schedule_url = None;
        }
        if let Some(selector) = overrides.selector {
            self.target.selector = selector;
        }
        if let Some(interval) = overrides.interval_secs {
            self.schedule.interval_secs = interval;
        }
        if let Some(jitter) = overrides.jitter_secs {
            self.schedule.jitter_secs = jitter;
        }
        if let Some(date) = overrides.target_date {
            self.schedule.earliest_target_date = Some(date);
        }
        if let Some(path) = overrides.session_path {
            self.target.session_path = path;
        }
        if overrides.once {
            self.schedule.interval_secs = 0;
        }
    }

    /// Check the settings the watch loop cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_url().trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        Extractor::new(&self.target.selector)?;
        Ok(())
    }

    /// URL fetched each cycle
    pub fn page_url(&self) -> &str {
        self.target
            .schedule_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(&self.target.start_url)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.target.fetch_timeout_ms)
    }

    /// True when exactly one cycle should run
    pub fn single_shot(&self) -> bool {
        self.schedule.interval_secs <= 0
    }

    /// Render as TOML with credentials masked
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        let mask = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        };
        mask(&mut shown.telegram.bot_token);
        mask(&mut shown.email.smtp_pass);

        Ok(toml::to_string_pretty(&shown)?)
    }
}

/// Parse a `YYYY-MM-DD` target date
pub fn parse_target_date(name: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        name: name.to_string(),
        value: value.to_string(),
    })
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            schedule_url: None,
            selector: ".next-available-date".to_string(),
            session_path: PathBuf::from("storage_state.json"),
            fetch_timeout_ms: 45_000,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            jitter_secs: 0,
            earliest_target_date: None,
            alert_policy: AlertPolicy::Every,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_pass: None,
            from: None,
            to: None,
        }
    }
}
