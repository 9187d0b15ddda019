//! Configuration System
//!
//! Policy knobs for the navigation coordinator plus logging settings. A session consumes a
//! [`FrameNavConfig`] value directly; [`ConfigLoader`] is an opt-in helper that layers
//! defaults, an optional user file, an explicit file and `FRAMENAV_*` environment
//! overrides.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod loader;
mod merge_policy;
mod sources;

pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameNavConfig {
    /// Dispatch policy and failure handling switches
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Session history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Switches consulted by the dispatch-policy algorithm and failure classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Hand every content-initiated top-level navigation to the coordinator.
    #[serde(default)]
    pub coordinator_handles_all_top_level_requests: bool,

    /// Out-of-process navigation handling: network navigations are begun by the
    /// coordinator instead of being fetched locally.
    #[serde(default = "default_true")]
    pub coordinator_side_navigation: bool,

    /// Stop silently instead of committing an error page for client-blocked requests.
    #[serde(default)]
    pub suppress_client_blocked_error_page: bool,

    /// Schemes whose documents run with elevated privileges.
    #[serde(default = "default_privileged_schemes")]
    pub privileged_schemes: Vec<String>,

    #[serde(default = "default_view_source_scheme")]
    pub view_source_scheme: String,

    /// Treat a committed origin that disagrees with the committed URL as fatal.
    #[serde(default = "default_true")]
    pub enforce_origin_consistency: bool,
}

/// Session history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of entries tracked per top-level context.
    #[serde(default = "default_max_entries")]
    pub max_entries: i32,
}

pub(crate) const DEFAULT_MAX_HISTORY_ENTRIES: i32 = 50;

fn default_true() -> bool {
    true
}

fn default_privileged_schemes() -> Vec<String> {
    vec!["chrome".to_string()]
}

fn default_view_source_scheme() -> String {
    "view-source".to_string()
}

fn default_max_entries() -> i32 {
    DEFAULT_MAX_HISTORY_ENTRIES
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            coordinator_handles_all_top_level_requests: false,
            coordinator_side_navigation: default_true(),
            suppress_client_blocked_error_page: false,
            privileged_schemes: default_privileged_schemes(),
            view_source_scheme: default_view_source_scheme(),
            enforce_origin_consistency: default_true(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

impl PolicyConfig {
    pub fn is_privileged_scheme(&self, scheme: &str) -> bool {
        self.privileged_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }

    pub fn is_view_source_scheme(&self, scheme: &str) -> bool {
        self.view_source_scheme.eq_ignore_ascii_case(scheme)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.privileged_schemes.iter().any(|s| s.trim().is_empty()) {
            return Err("Privileged scheme names cannot be empty".to_string());
        }
        if self.view_source_scheme.trim().is_empty() {
            return Err("View-source scheme cannot be empty".to_string());
        }
        Ok(())
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries <= 0 {
            return Err(format!(
                "max_entries must be positive, got {}",
                self.max_entries
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Policy(String),
    History(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Policy(msg) => write!(f, "Policy: {}", msg),
            ValidationError::History(msg) => write!(f, "History: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FrameNavConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.policy.validate() {
            errors.push(ValidationError::Policy(e));
        }
        if let Err(e) = self.history.validate() {
            errors.push(ValidationError::History(e));
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
