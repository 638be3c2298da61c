//! Bus configuration.

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use shapebus_core::{DispatchError, DispatchResult};

pub const ENV_NAME: &str = "SHAPEBUS_NAME";
pub const ENV_AUTO_DISPOSE: &str = "SHAPEBUS_AUTO_DISPOSE";
pub const ENV_REPORT_SYNC_FAILURES: &str = "SHAPEBUS_REPORT_SYNC_FAILURES";
pub const ENV_MAX_CONCURRENT_UNITS: &str = "SHAPEBUS_MAX_CONCURRENT_UNITS";

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Name for logging
    pub name: String,
    /// Dispose events after `publish` / `publish_async` unless told otherwise
    pub auto_dispose: bool,
    /// Forward synchronous handler failures to the diagnostic sink
    pub report_sync_failures: bool,
    /// Upper bound on concurrently running fan-out units (`None` = unbounded)
    pub max_concurrent_units: Option<usize>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "shapebus".to_string(),
            auto_dispose: true,
            report_sync_failures: true,
            max_concurrent_units: None,
        }
    }
}

impl BusConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_auto_dispose(mut self, auto_dispose: bool) -> Self {
        self.auto_dispose = auto_dispose;
        self
    }

    pub fn with_report_sync_failures(mut self, report: bool) -> Self {
        self.report_sync_failures = report;
        self
    }

    pub fn with_max_concurrent_units(mut self, max: usize) -> Self {
        self.max_concurrent_units = Some(max);
        self
    }

    /// Defaults overridden by `SHAPEBUS_*` environment variables.
    pub fn from_env() -> DispatchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DispatchResult<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_NAME) {
            config.name = name;
        }
        if let Some(raw) = lookup(ENV_AUTO_DISPOSE) {
            config.auto_dispose = parse_flag(ENV_AUTO_DISPOSE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REPORT_SYNC_FAILURES) {
            config.report_sync_failures = parse_flag(ENV_REPORT_SYNC_FAILURES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT_UNITS) {
            let max = raw.trim().parse::<usize>().map_err(|e| {
                DispatchError::invalid_argument(format!("{ENV_MAX_CONCURRENT_UNITS}={raw}: {e}"))
            })?;
            config.max_concurrent_units = Some(max);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DispatchResult<()> {
        if self.name.trim().is_empty() {
            return Err(DispatchError::invalid_argument("bus name must not be empty"));
        }
        match self.max_concurrent_units {
            Some(0) => {
                return Err(DispatchError::invalid_argument(
                    "max_concurrent_units must be at least 1",
                ));
            }
            Some(max) if max > Semaphore::MAX_PERMITS => {
                return Err(DispatchError::invalid_argument(format!(
                    "max_concurrent_units must not exceed {}, got {max}",
                    Semaphore::MAX_PERMITS
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> DispatchResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DispatchError::invalid_argument(format!(
            "{key}={other}: expected a boolean"
        ))),
    }
}
