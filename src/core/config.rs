use crate::dom::TodoPage;
use crate::errors::{ProbeError, Result};
use crate::types::BrowserConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const APP_URL_ENV: &str = "TODO_APP_URL";
pub const HEADLESS_ENV: &str = "HEADLESS";
pub const WAIT_TIMEOUT_ENV: &str = "WAIT_TIMEOUT";
pub const ARTIFACTS_DIR_ENV: &str = "ARTIFACTS_DIR";

pub const DEFAULT_APP_URL: &str = "http://localhost:8000/index.html";
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts/screenshots";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    pub app_url: String,
    pub browser: BrowserConfig,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub artifacts_dir: PathBuf,
    /// DOM contract of the application under test.
    pub page: TodoPage,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            browser: BrowserConfig::default(),
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            page: TodoPage::default(),
        }
    }
}

/// Values given explicitly by the caller. These win over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub app_url: Option<String>,
    pub headless: Option<bool>,
    pub wait_timeout_secs: Option<u64>,
    pub artifacts_dir: Option<PathBuf>,
}

impl FixtureConfig {
    /// Resolves configuration from the process environment.
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Precedence is explicit value, then `lookup`, then the built-in default.
    pub fn resolve<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = overrides.app_url.or_else(|| lookup(APP_URL_ENV)) {
            config.app_url = url;
        }

        config.browser.headless = match overrides.headless {
            Some(headless) => headless,
            None => lookup(HEADLESS_ENV)
                .map(|raw| parse_flag(&raw))
                .unwrap_or(config.browser.headless),
        };

        config.wait_timeout_secs = match overrides.wait_timeout_secs {
            Some(secs) => secs,
            None => match lookup(WAIT_TIMEOUT_ENV) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    ProbeError::ConfigurationError(format!(
                        "{} must be a whole number of seconds, got {:?}",
                        WAIT_TIMEOUT_ENV, raw
                    ))
                })?,
                None => config.wait_timeout_secs,
            },
        };

        if let Some(dir) = overrides
            .artifacts_dir
            .or_else(|| lookup(ARTIFACTS_DIR_ENV).map(PathBuf::from))
        {
            config.artifacts_dir = dir;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.app_url).map_err(|e| {
            ProbeError::ConfigurationError(format!("invalid app url {:?}: {}", self.app_url, e))
        })?;

        if self.poll_interval_ms == 0 {
            return Err(ProbeError::ConfigurationError(
                "poll interval must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `1`, `true` and `yes` (any case) enable a flag; anything else disables it.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
