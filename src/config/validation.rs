//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every route pattern compiles
//! - Check paths are absolute and redirects do not point at themselves
//! - Detect duplicate states and duplicate routes within a state
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Component names are not checked here; they need a registry
//!   (see `RouteMatcher::from_config`)

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::routing::{compile, normalize_path, PatternError};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("states[{index}]: name must not be empty")]
    EmptyStateName { index: usize },

    #[error("state `{0}` is declared more than once")]
    DuplicateState(String),

    #[error("state `{state}`: {source}")]
    InvalidPattern {
        state: String,
        #[source]
        source: PatternError,
    },

    #[error("state `{state}`: route `{path}` is declared more than once")]
    DuplicateRoute { state: String, path: String },

    #[error("state `{state}`: redirect `{path}` points at itself")]
    SelfRedirect { state: String, path: String },

    #[error("state `{state}`: {field} `{path}` must start with `/`")]
    RelativePath {
        state: String,
        field: &'static str,
        path: String,
    },

    #[error("navigation.initial_state `{0}` is not a declared state")]
    UnknownInitialState(String),

    #[error("navigation.{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.navigation.max_redirects == 0 {
        errors.push(ValidationError::ZeroLimit("max_redirects"));
    }
    if config.navigation.scroll_cache_capacity == 0 {
        errors.push(ValidationError::ZeroLimit("scroll_cache_capacity"));
    }

    let mut names = HashSet::new();
    for (index, state) in config.states.iter().enumerate() {
        if state.name.trim().is_empty() {
            errors.push(ValidationError::EmptyStateName { index });
        } else if !names.insert(state.name.as_str()) {
            errors.push(ValidationError::DuplicateState(state.name.clone()));
        }

        let mut paths = HashSet::new();
        for route in &state.routes {
            if let Err(source) = compile(&route.path) {
                errors.push(ValidationError::InvalidPattern {
                    state: state.name.clone(),
                    source,
                });
            } else if !paths.insert(normalize_path(&route.path)) {
                errors.push(ValidationError::DuplicateRoute {
                    state: state.name.clone(),
                    path: route.path.clone(),
                });
            }
        }

        if let Some(default) = &state.default_path {
            check_absolute(&mut errors, &state.name, "default_path", default);
        }
        for (from, to) in &state.redirects {
            check_absolute(&mut errors, &state.name, "redirect source", from);
            check_absolute(&mut errors, &state.name, "redirect target", to);
            if normalize_path(from) == normalize_path(to) {
                errors.push(ValidationError::SelfRedirect {
                    state: state.name.clone(),
                    path: from.clone(),
                });
            }
        }
    }

    if let Some(initial) = &config.navigation.initial_state {
        if !names.contains(initial.as_str()) {
            errors.push(ValidationError::UnknownInitialState(initial.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_absolute(
    errors: &mut Vec<ValidationError>,
    state: &str,
    field: &'static str,
    path: &str,
) {
    if !path.starts_with('/') {
        errors.push(ValidationError::RelativePath {
            state: state.to_string(),
            field,
            path: path.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RouteConfig, StateConfig};

    fn route(path: &str) -> RouteConfig {
        RouteConfig {
            path: path.to_string(),
            component: "Page".to_string(),
            layout: None,
            meta: Default::default(),
        }
    }

    fn state(name: &str, routes: &[&str]) -> StateConfig {
        StateConfig {
            name: name.to_string(),
            routes: routes.iter().map(|p| route(p)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let mut authed = state("authenticated", &["/dashboard", "/users/[id]"]);
        authed.default_path = Some("/dashboard".into());
        authed.redirects.insert("/home".into(), "/dashboard".into());
        let config = RouterConfig {
            states: vec![state("unauthenticated", &["/login"]), authed],
            ..Default::default()
        };
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut broken = state("authenticated", &["/a", "/a/", "/[...rest]/tail"]);
        broken.default_path = Some("dashboard".into());
        broken.redirects.insert("/loop".into(), "/loop".into());

        let mut config = RouterConfig {
            states: vec![broken, state("authenticated", &[]), state(" ", &[])],
            ..Default::default()
        };
        config.navigation.max_redirects = 0;
        config.navigation.initial_state = Some("ghost".into());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroLimit("max_redirects")));
        assert!(errors.contains(&ValidationError::DuplicateState("authenticated".into())));
        assert!(errors.contains(&ValidationError::EmptyStateName { index: 2 }));
        assert!(errors.contains(&ValidationError::UnknownInitialState("ghost".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateRoute { path, .. } if path == "/a/")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPattern { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::SelfRedirect { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RelativePath { field: "default_path", .. })));
        assert_eq!(errors.len(), 8);
    }
}
