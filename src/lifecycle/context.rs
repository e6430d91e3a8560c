//! Navigation context shared by hooks, blockers and sinks.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::state::AppState;

/// Origin used only to resolve relative paths; never exposed.
const RESOLVE_BASE: &str = "http://router.invalid/";

/// A parsed location: pathname, search (with `?`) and hash (with `#`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl Location {
    /// Parse a path such as `/users/42?tab=posts#top`.
    ///
    /// Dot segments are resolved and unsafe characters percent-encoded, so
    /// the pathname is in the same form the route patterns match against.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(RESOLVE_BASE)?.join(input)?;
        Ok(Self {
            pathname: url.path().to_string(),
            search: url.query().map(|q| format!("?{}", q)).unwrap_or_default(),
            hash: url.fragment().map(|f| format!("#{}", f)).unwrap_or_default(),
        })
    }

    /// Pathname, search and hash joined back together.
    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.pathname, self.search, self.hash)
    }
}

/// How the history stack is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
    Push,
    Replace,
    Pop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirection {
    Forward,
    Back,
    /// Replacements and first loads have no direction.
    None,
}

/// Immutable snapshot of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationContext {
    pub from: Option<Location>,
    pub to: Location,
    pub navigation_type: NavigationType,
    pub direction: NavigationDirection,
    /// Monotonic per navigator; a newer attempt always has a larger id.
    pub navigation_id: u64,
    /// App state the target was resolved against.
    pub state: AppState,
    /// Pattern of the matched route.
    pub route: String,
    pub params: HashMap<String, String>,
}
