//! Serializable reporter configuration
//!
//! The data half of the reporter options: what can be expressed as JSON.
//! Callback hooks are attached separately (see [`crate::options`]).
//!
//! ```
//! use vitals_core::config::{LifecycleStrategyChoice, ReporterConfig};
//!
//! let config = ReporterConfig::from_json(r#"{
//!     "initial": { "page": "/checkout" },
//!     "strategy": "pagehide"
//! }"#).unwrap();
//!
//! assert_eq!(config.strategy, LifecycleStrategyChoice::PageHide);
//! ```

use crate::error::ReporterError;
use crate::lifecycle::LifecycleStrategy;
use crate::options::ReporterOptions;
use crate::payload::SessionResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReporterConfig {
    /// Fields merged into the result at construction (device info, page tags)
    pub initial: SessionResult,
    /// How the end of the session is detected
    pub strategy: LifecycleStrategyChoice,
}

impl ReporterConfig {
    /// Parse configuration from a JSON string
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::InvalidConfig`] if the JSON is malformed or a
    /// field has the wrong type
    pub fn from_json(s: &str) -> Result<Self, ReporterError> {
        serde_json::from_str(s).map_err(|e| ReporterError::InvalidConfig(e.to_string()))
    }

    /// Options carrying this config's data and the default hooks
    pub fn into_options(self) -> ReporterOptions {
        ReporterOptions::new().with_initial(self.initial)
    }
}

/// Lifecycle strategy selection, `auto` unless overridden
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStrategyChoice {
    /// Feature-detect from the supported performance entry types
    #[default]
    Auto,
    /// Always wait for a hidden page during a true unload
    Visibility,
    /// Always use the one-shot page-hide event
    PageHide,
}

impl LifecycleStrategyChoice {
    pub fn resolve(&self, supported_entry_types: &[String]) -> LifecycleStrategy {
        match self {
            LifecycleStrategyChoice::Auto => LifecycleStrategy::detect(supported_entry_types),
            LifecycleStrategyChoice::Visibility => LifecycleStrategy::VisibilityHidden,
            LifecycleStrategyChoice::PageHide => LifecycleStrategy::PageHide,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ReporterConfig::from_json("{}").unwrap();
        assert!(config.initial.is_empty());
        assert_eq!(config.strategy, LifecycleStrategyChoice::Auto);
    }

    #[test]
    fn test_config_parses_initial_fields() {
        let config =
            ReporterConfig::from_json(r#"{"initial": {"foo": 1, "cpus": 8}}"#).unwrap();
        assert_eq!(config.initial.get("foo"), Some(&json!(1)));
        assert_eq!(config.initial.get("cpus"), Some(&json!(8)));
    }

    #[test]
    fn test_config_rejects_unknown_strategy() {
        let err = ReporterConfig::from_json(r#"{"strategy": "onunload"}"#).unwrap_err();
        assert!(matches!(err, ReporterError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_rejects_non_object_initial() {
        assert!(ReporterConfig::from_json(r#"{"initial": [1, 2]}"#).is_err());
    }

    #[test]
    fn test_strategy_choice_resolution() {
        let with_layout_shift = vec!["paint".to_string(), "layout-shift".to_string()];
        let without: Vec<String> = vec!["paint".to_string()];

        assert_eq!(
            LifecycleStrategyChoice::Auto.resolve(&with_layout_shift),
            LifecycleStrategy::VisibilityHidden
        );
        assert_eq!(
            LifecycleStrategyChoice::Auto.resolve(&without),
            LifecycleStrategy::PageHide
        );
        assert_eq!(
            LifecycleStrategyChoice::PageHide.resolve(&with_layout_shift),
            LifecycleStrategy::PageHide
        );
        assert_eq!(
            LifecycleStrategyChoice::Visibility.resolve(&without),
            LifecycleStrategy::VisibilityHidden
        );
    }

    #[test]
    fn test_into_options_carries_initial() {
        let config = ReporterConfig::from_json(r#"{"initial": {"foo": 1}}"#).unwrap();
        let options = config.into_options();
        assert_eq!(options.initial.get("foo"), Some(&json!(1)));
    }
}
