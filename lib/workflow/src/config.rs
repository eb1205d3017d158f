//! Runtime configuration for wiring, parameter resolution and routing.
//!
//! Loaded via the `config` crate from defaults, an optional file, and
//! environment variables prefixed with `SWITCHYARD_` (nested keys use `__`).

use crate::connection::DEFAULT_CHANNEL;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;

/// Value substituted for a parameter whose evaluation failed on a node
/// configured to continue on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePlaceholder {
    /// JSON `null`.
    #[default]
    Null,
    /// The empty string.
    EmptyString,
    /// The caller's fallback value.
    Fallback,
}

impl FailurePlaceholder {
    /// Returns the placeholder value for a failed evaluation.
    #[must_use]
    pub fn value(self, fallback: &JsonValue) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::EmptyString => JsonValue::String(String::new()),
            Self::Fallback => fallback.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// Channel used when the connection graph declares none.
    #[serde(default = "default_channel")]
    pub default_channel: String,

    /// Hard ceiling for condition-bounded loops.
    /// Node-level `maxIterations` is clamped to this.
    #[serde(default = "default_loop_iteration_ceiling")]
    pub loop_iteration_ceiling: u32,

    /// Field stamped into each loop iteration item.
    #[serde(default = "default_iteration_field")]
    pub iteration_field: String,

    #[serde(default)]
    pub failure_placeholder: FailurePlaceholder,
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_loop_iteration_ceiling() -> u32 {
    1000
}

fn default_iteration_field() -> String {
    "iteration".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_channel: default_channel(),
            loop_iteration_ceiling: default_loop_iteration_ceiling(),
            iteration_field: default_iteration_field(),
            failure_placeholder: FailurePlaceholder::default(),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from an optional file, overridden by environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix("SWITCHYARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
