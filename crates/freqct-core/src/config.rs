//! Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use freqct_stats::AlphaLevel;

use crate::error::CtableError;

/// Settings of a contingency-table session.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreqctConfig {
    /// Base URL of the backend, without a trailing slash.
    pub server_url: String,
    pub fetch_path: String,
    pub export_path: String,
    /// Prefix of the per-cell concordance filter links.
    pub quick_filter_action: String,
    /// Quiet period before a minimum-frequency edit is applied.
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub alpha_level: AlphaLevel,
    /// Structures that may be cross-tabulated against each other.
    pub multi_sattr_allowed_structs: Vec<String>,
    /// Arguments identifying the source concordance, sent with every request.
    pub conc_args: Vec<(String, String)>,
}

impl Default for FreqctConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8042".to_string(),
            fetch_path: "freqct".to_string(),
            export_path: "export_freqct".to_string(),
            quick_filter_action: "quick_filter".to_string(),
            debounce_ms: 400,
            request_timeout_secs: 30,
            alpha_level: AlphaLevel::default(),
            multi_sattr_allowed_structs: Vec::new(),
            conc_args: Vec::new(),
        }
    }
}

impl FreqctConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Absolute URL of an endpoint below `server_url`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Load a config file from disk.
pub fn load_config_from_path(path: &Path) -> Result<FreqctConfig, CtableError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str::<FreqctConfig>(&raw)
        .map_err(|e| CtableError::Config(format!("failed to parse {}: {e}", path.display())))
}
