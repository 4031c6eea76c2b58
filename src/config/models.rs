use crate::humanize::HumanDuration;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Store location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Explicit store directory; the per-application cache location is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Directory name under the user cache dir for the default location
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            app_name: default_app_name(),
        }
    }
}

fn default_app_name() -> String {
    "logstore".to_string()
}

/// Write-path behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Most verbose severity still written to the store
    #[serde(default = "default_filter_severity")]
    pub filter_severity: Severity,
    /// Also emit accepted entries as tracing events
    #[serde(default = "default_mirror_to_console")]
    pub mirror_to_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_severity: default_filter_severity(),
            mirror_to_console: default_mirror_to_console(),
        }
    }
}

fn default_filter_severity() -> Severity {
    Severity::Warning
}

fn default_mirror_to_console() -> bool {
    cfg!(debug_assertions)
}

/// Retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_prune_limit_days")]
    pub prune_limit_days: f64,
    #[serde(default = "default_prune_frequency")]
    pub prune_frequency: HumanDuration,
    /// Run the background pruner while the logger is open
    #[serde(default = "default_auto_prune")]
    pub auto_prune: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            prune_limit_days: default_prune_limit_days(),
            prune_frequency: default_prune_frequency(),
            auto_prune: default_auto_prune(),
        }
    }
}

fn default_auto_prune() -> bool {
    true
}

fn default_prune_limit_days() -> f64 {
    7.0
}

fn default_prune_frequency() -> HumanDuration {
    HumanDuration::from_secs(3600) // 1 hour
}
