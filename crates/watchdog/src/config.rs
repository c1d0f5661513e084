//! TOML configuration for the watchdog pair.
//!
//! ```toml
//! [watchdog]
//! enabled = true
//! endpoint = "http://localhost:3000/fuzz"
//! timeout_secs = 5
//! jsonl_path = "/var/log/fuzzvm/reports.jsonl"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WatchdogError;
use crate::sink::{HttpReportSink, JsonlFileReportSink, ReportDispatcher, ReportSink};

/// Collector endpoint the fuzzer listens on.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/fuzz";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchdogConfig {
    /// When `false`, watchdogs never arm and no report is produced.
    pub enabled: bool,
    /// Collector URL receiving one `POST` per finalized transaction.
    pub endpoint: String,
    /// Per-request timeout for report delivery.
    pub timeout_secs: u64,
    /// Also append every report to this file as one JSON line.
    pub jsonl_path: Option<PathBuf>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 5,
            jsonl_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    watchdog: WatchdogConfig,
}

impl WatchdogConfig {
    /// Parse the `[watchdog]` table of a TOML document. A missing table yields
    /// the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, WatchdogError> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| WatchdogError::Config(e.to_string()))?;
        file.watchdog.validate()?;
        Ok(file.watchdog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WatchdogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), WatchdogError> {
        let url = url::Url::parse(&self.endpoint).map_err(|e| {
            WatchdogError::Config(format!("endpoint {:?} is not a URL: {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WatchdogError::Config(format!(
                "endpoint must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(WatchdogError::Config("timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sink described by this configuration: the HTTP collector, fanned out to
    /// a JSONL file when `jsonl_path` is set.
    pub fn build_sink(&self) -> Arc<dyn ReportSink> {
        let http = HttpReportSink::new(self.endpoint.clone(), self.timeout());
        match &self.jsonl_path {
            Some(path) => Arc::new(ReportDispatcher::new(vec![
                Box::new(http),
                Box::new(JsonlFileReportSink::new(path.clone())),
            ])),
            None => Arc::new(http),
        }
    }
}
