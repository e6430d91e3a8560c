//! Per-state route table and lookup.
//!
//! # Responsibilities
//! - Compile every route of every state at construction
//! - Sort each state's routes by descending specificity (ties keep registration order)
//! - Resolve a path into a match, a redirect, a cross-state mismatch, or nothing
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - Lookup is a pure function of (path, state, table)
//! - Never navigates across states by itself; a mismatch is reported to the caller
//! - Configuration mistakes fail construction; a dangling default path only warns

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::config::RouterConfig;
use crate::routing::pattern::{compile, CompiledPattern, PatternError};
use crate::routing::route::{ComponentRegistry, Route, StateRoutes};
use crate::state::AppState;

/// Fatal route table errors raised at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteTableError {
    #[error("state `{0}` is declared more than once")]
    DuplicateState(AppState),

    #[error("invalid route in state `{state}`: {source}")]
    Pattern {
        state: AppState,
        #[source]
        source: PatternError,
    },

    #[error("route `{path}` is declared more than once in state `{state}`")]
    DuplicatePath { state: AppState, path: String },

    #[error("redirect `{path}` in state `{state}` points at itself")]
    SelfRedirect { state: AppState, path: String },

    #[error("route `{path}` in state `{state}` uses unknown component `{component}`")]
    UnknownComponent {
        state: AppState,
        path: String,
        component: String,
    },

    #[error("no route `{path}` in state `{state}`")]
    UnknownRoute { state: AppState, path: String },

    #[error("cannot build path: {0}")]
    Build(#[source] PatternError),
}

/// A route compiled for matching. Rebuilt only with the table.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub pattern: CompiledPattern,
    pub route: Arc<Route>,
    pub state: AppState,
}

/// A successful lookup within the current state.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub route: Arc<Route>,
    pub params: HashMap<String, String>,
    pub state: AppState,
    pub score: u32,
}

/// The path exists, but only under another state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMismatch {
    pub requested_state: AppState,
    pub available_in_state: AppState,
    pub pathname: String,
}

/// Result of [`RouteMatcher::match_path`]. "No match" is `None`.
#[derive(Debug, Clone)]
pub enum RouteMatch {
    Matched(MatchedRoute),
    Redirect(String),
    StateMismatch(StateMismatch),
}

#[derive(Debug)]
struct StateTable {
    state: AppState,
    routes: Vec<CompiledRoute>,
    default_path: Option<String>,
    redirects: HashMap<String, String>,
    layout: Option<String>,
}

impl StateTable {
    fn find(&self, path: &str) -> Option<(&CompiledRoute, HashMap<String, String>)> {
        self.routes
            .iter()
            .find_map(|r| r.pattern.captures(path).map(|params| (r, params)))
    }
}

/// Compiled route table for all application states.
#[derive(Debug)]
pub struct RouteMatcher {
    tables: Vec<StateTable>,
    warnings: Vec<String>,
}

/// Drop a trailing slash, except on the root path.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

impl RouteMatcher {
    /// Compile and validate the route configuration of every state.
    pub fn new(states: Vec<StateRoutes>) -> Result<Self, RouteTableError> {
        let mut seen_states = HashSet::new();
        let mut tables = Vec::with_capacity(states.len());
        let mut warnings = Vec::new();

        for config in states {
            if !seen_states.insert(config.state.clone()) {
                return Err(RouteTableError::DuplicateState(config.state));
            }
            let table = compile_state(config)?;

            if let Some(warning) = check_default_path(&table) {
                tracing::warn!(state = %table.state, "{}", warning);
                warnings.push(warning);
            }
            tracing::debug!(
                state = %table.state,
                routes = table.routes.len(),
                redirects = table.redirects.len(),
                "Compiled route table"
            );
            tables.push(table);
        }

        Ok(Self { tables, warnings })
    }

    /// Build the table from a configuration file, binding component names
    /// through `registry`.
    pub fn from_config(
        config: &RouterConfig,
        registry: &ComponentRegistry,
    ) -> Result<Self, RouteTableError> {
        let mut states = Vec::with_capacity(config.states.len());

        for state_config in &config.states {
            let state = AppState::new(state_config.name.clone());
            let mut routes = Vec::with_capacity(state_config.routes.len());

            for route_config in &state_config.routes {
                let loader = registry.get(&route_config.component).ok_or_else(|| {
                    RouteTableError::UnknownComponent {
                        state: state.clone(),
                        path: route_config.path.clone(),
                        component: route_config.component.clone(),
                    }
                })?;
                routes.push(Route {
                    path: route_config.path.clone(),
                    loader: loader.clone(),
                    layout: route_config.layout.clone(),
                    meta: route_config.meta.clone(),
                });
            }

            states.push(StateRoutes {
                state,
                routes,
                default_path: state_config.default_path.clone(),
                redirects: state_config
                    .redirects
                    .iter()
                    .map(|(from, to)| (from.clone(), to.clone()))
                    .collect(),
                layout: state_config.layout.clone(),
            });
        }

        Self::new(states)
    }

    /// Resolve `path` (a pathname without query or hash) against `current`.
    ///
    /// Priority: redirect in `current`, route in `current`, route in any other
    /// state (as a mismatch), otherwise `None`.
    pub fn match_path(&self, path: &str, current: &AppState) -> Option<RouteMatch> {
        let table = self.table(current);

        if let Some(table) = table {
            if let Some(target) = table.redirects.get(normalize_path(path)) {
                return Some(RouteMatch::Redirect(target.clone()));
            }
            if let Some((compiled, params)) = table.find(path) {
                return Some(RouteMatch::Matched(MatchedRoute {
                    route: Arc::clone(&compiled.route),
                    params,
                    state: compiled.state.clone(),
                    score: compiled.pattern.score(),
                }));
            }
        }

        self.tables
            .iter()
            .filter(|t| &t.state != current)
            .find(|t| t.find(path).is_some())
            .map(|t| {
                RouteMatch::StateMismatch(StateMismatch {
                    requested_state: current.clone(),
                    available_in_state: t.state.clone(),
                    pathname: path.to_string(),
                })
            })
    }

    pub fn default_path(&self, state: &AppState) -> Option<&str> {
        self.table(state).and_then(|t| t.default_path.as_deref())
    }

    pub fn state_layout(&self, state: &AppState) -> Option<&str> {
        self.table(state).and_then(|t| t.layout.as_deref())
    }

    pub fn has_state(&self, state: &AppState) -> bool {
        self.table(state).is_some()
    }

    /// States in declaration order.
    pub fn states(&self) -> impl Iterator<Item = &AppState> {
        self.tables.iter().map(|t| &t.state)
    }

    /// A state's routes in match order.
    pub fn routes(&self, state: &AppState) -> &[CompiledRoute] {
        self.table(state).map(|t| t.routes.as_slice()).unwrap_or(&[])
    }

    /// Build a concrete path for the route declared as `pattern` in `state`.
    pub fn build_path(
        &self,
        state: &AppState,
        pattern: &str,
        params: &HashMap<String, String>,
    ) -> Result<String, RouteTableError> {
        let wanted = normalize_path(pattern);
        let compiled = self
            .routes(state)
            .iter()
            .find(|r| normalize_path(r.pattern.pattern()) == wanted)
            .ok_or_else(|| RouteTableError::UnknownRoute {
                state: state.clone(),
                path: pattern.to_string(),
            })?;
        compiled.pattern.build(params).map_err(RouteTableError::Build)
    }

    /// Non-fatal configuration findings collected at construction.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn table(&self, state: &AppState) -> Option<&StateTable> {
        self.tables.iter().find(|t| &t.state == state)
    }
}

fn compile_state(config: StateRoutes) -> Result<StateTable, RouteTableError> {
    let StateRoutes {
        state,
        routes,
        default_path,
        redirects,
        layout,
    } = config;

    let mut seen_paths = HashSet::new();
    let mut compiled = Vec::with_capacity(routes.len());

    for route in routes {
        let pattern = compile(&route.path).map_err(|source| RouteTableError::Pattern {
            state: state.clone(),
            source,
        })?;
        if !seen_paths.insert(normalize_path(&route.path).to_string()) {
            return Err(RouteTableError::DuplicatePath {
                state,
                path: route.path,
            });
        }
        compiled.push(CompiledRoute {
            pattern,
            route: Arc::new(route),
            state: state.clone(),
        });
    }
    // Stable sort keeps registration order among equal scores.
    compiled.sort_by(|a, b| b.pattern.score().cmp(&a.pattern.score()));

    let mut normalized = HashMap::with_capacity(redirects.len());
    for (from, to) in redirects {
        let source = normalize_path(&from).to_string();
        if source == normalize_path(&to) {
            return Err(RouteTableError::SelfRedirect { state, path: from });
        }
        normalized.insert(source, to);
    }

    Ok(StateTable {
        state,
        routes: compiled,
        default_path,
        redirects: normalized,
        layout,
    })
}

fn check_default_path(table: &StateTable) -> Option<String> {
    let default = table.default_path.as_deref()?;
    let resolves = table.redirects.contains_key(normalize_path(default))
        || table.find(default).is_some();
    if resolves {
        None
    } else {
        Some(format!(
            "default path `{}` of state `{}` matches no route or redirect in that state",
            default, table.state
        ))
    }
}
