//! Configuration schema definitions.
//!
//! This module defines the file form of a route table plus the navigator's
//! tunables. All types derive Serde traits for deserialization from TOML.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for a router.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Navigator tunables.
    pub navigation: NavigationConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Route tables, one per application state.
    pub states: Vec<StateConfig>,
}

impl RouterConfig {
    /// The state a fresh navigator starts in: `navigation.initial_state`,
    /// else the first declared state.
    pub fn initial_state(&self) -> Option<&str> {
        self.navigation
            .initial_state
            .as_deref()
            .or_else(|| self.states.first().map(|s| s.name.as_str()))
    }
}

/// Navigator tunables.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Redirect hops allowed per navigation (config, hook and fallback
    /// redirects share the budget).
    pub max_redirects: u32,

    /// Scroll positions kept by the in-memory storage provider.
    pub scroll_cache_capacity: usize,

    /// State to start in. Defaults to the first declared state.
    pub initial_state: Option<String>,

    /// Record navigation metrics.
    pub metrics_enabled: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            scroll_cache_capacity: 50,
            initial_state: None,
            metrics_enabled: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Route table of one application state.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// State name, e.g. "authenticated".
    pub name: String,

    /// Where to go when a path belongs to another state.
    pub default_path: Option<String>,

    /// Layout used by routes that name none.
    pub layout: Option<String>,

    /// Exact source path → target path.
    pub redirects: BTreeMap<String, String>,

    pub routes: Vec<RouteConfig>,
}

/// One route declaration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteConfig {
    /// Path pattern, e.g. "/users/[id]".
    pub path: String,

    /// Component name resolved through a `ComponentRegistry`.
    pub component: String,

    #[serde(default)]
    pub layout: Option<String>,

    /// Free-form metadata passed through to the route.
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}
