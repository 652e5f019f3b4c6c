//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```rust
//! use ripple_core::config::{KeyedDetection, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_json(r#"{ "renderer": { "keyed_detection": "all_children" } }"#).unwrap();
//! assert_eq!(config.renderer.keyed_detection, KeyedDetection::AllChildren);
//! assert_eq!(config.scheduler.max_recursion, 100);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration owned by a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
    pub renderer: RendererConfig,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Job scheduler options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How many times a single job may run within one flush before further
    /// re-queues are dropped.
    pub max_recursion: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_recursion: 100 }
    }
}

/// Reconciler options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub keyed_detection: KeyedDetection,
    pub fallthrough: FallthroughPrecedence,
}

/// How the reconciler decides that a child list is keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyedDetection {
    /// Both lists are keyed when their first children carry keys.
    #[default]
    FirstChild,
    /// Both lists are keyed only when every child carries a key.
    AllChildren,
}

/// Which side wins when fall-through attrs and the rendered root define the
/// same prop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallthroughPrecedence {
    /// The root node's own explicit prop is kept.
    #[default]
    RootWins,
    /// The caller's attr overrides the root node's prop.
    AttrsWin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.renderer.keyed_detection, KeyedDetection::FirstChild);
        assert_eq!(config.renderer.fallthrough, FallthroughPrecedence::RootWins);
    }

    #[test]
    fn partial_sections_are_merged_with_defaults() {
        let config = RuntimeConfig::from_json(
            r#"{ "scheduler": { "max_recursion": 5 }, "renderer": { "fallthrough": "attrs_win" } }"#,
        )
        .unwrap();
        assert_eq!(config.scheduler.max_recursion, 5);
        assert_eq!(config.renderer.fallthrough, FallthroughPrecedence::AttrsWin);
        assert_eq!(config.renderer.keyed_detection, KeyedDetection::FirstChild);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = RuntimeConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, crate::error::RuntimeError::Config(_)));
    }
}
