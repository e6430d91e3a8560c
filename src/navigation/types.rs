//! Navigation results, errors and the records the navigator writes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::NavigationContext;
use crate::state::AppState;

/// Marker stored in every history entry written by the navigator.
pub const HISTORY_MARKER: &str = "state-router";

/// Stable code of a navigation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavigationErrorCode {
    NotFound,
    TooManyRedirects,
    StateMismatch,
    Blocked,
    Aborted,
    Cancelled,
    LoadFailed,
}

impl NavigationErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            NavigationErrorCode::NotFound => "NOT_FOUND",
            NavigationErrorCode::TooManyRedirects => "TOO_MANY_REDIRECTS",
            NavigationErrorCode::StateMismatch => "STATE_MISMATCH",
            NavigationErrorCode::Blocked => "BLOCKED",
            NavigationErrorCode::Aborted => "ABORTED",
            NavigationErrorCode::Cancelled => "CANCELLED",
            NavigationErrorCode::LoadFailed => "LOAD_FAILED",
        }
    }
}

impl fmt::Display for NavigationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a navigation did not commit.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavigationError {
    /// No route matches in any state.
    #[error("no route matches `{path}`")]
    NotFound { path: String },

    /// Redirects (configured, hook-requested or fallback) exceeded the limit.
    #[error("more than {limit} redirects while navigating to `{path}`")]
    TooManyRedirects { path: String, limit: u32 },

    /// The path only exists in another state and the current state has no default.
    #[error("`{path}` is only available in state `{available_in_state}`; state `{current_state}` has no default path")]
    StateMismatch {
        path: String,
        current_state: AppState,
        available_in_state: AppState,
    },

    #[error("navigation to `{path}` was blocked")]
    Blocked { path: String },

    #[error("navigation to `{path}` was aborted by a beforeNavigate hook")]
    Aborted { path: String },

    /// Superseded by a newer navigation or invalidated by a state change.
    #[error("navigation {navigation_id} to `{path}` was cancelled")]
    Cancelled { path: String, navigation_id: u64 },

    /// Component or layout failed to load. The message starts with the path.
    #[error("{message}")]
    LoadFailed { path: String, message: String },
}

impl NavigationError {
    pub fn code(&self) -> NavigationErrorCode {
        match self {
            NavigationError::NotFound { .. } => NavigationErrorCode::NotFound,
            NavigationError::TooManyRedirects { .. } => NavigationErrorCode::TooManyRedirects,
            NavigationError::StateMismatch { .. } => NavigationErrorCode::StateMismatch,
            NavigationError::Blocked { .. } => NavigationErrorCode::Blocked,
            NavigationError::Aborted { .. } => NavigationErrorCode::Aborted,
            NavigationError::Cancelled { .. } => NavigationErrorCode::Cancelled,
            NavigationError::LoadFailed { .. } => NavigationErrorCode::LoadFailed,
        }
    }

    /// The path the failed attempt was targeting.
    pub fn path(&self) -> &str {
        match self {
            NavigationError::NotFound { path }
            | NavigationError::TooManyRedirects { path, .. }
            | NavigationError::StateMismatch { path, .. }
            | NavigationError::Blocked { path }
            | NavigationError::Aborted { path }
            | NavigationError::Cancelled { path, .. }
            | NavigationError::LoadFailed { path, .. } => path,
        }
    }

    pub(crate) fn load_failed(path: &str, cause: impl fmt::Display) -> Self {
        NavigationError::LoadFailed {
            path: path.to_string(),
            message: format!("{}: {}", path, cause),
        }
    }
}

/// Result type for navigation entry points.
pub type NavigationResult<T> = Result<T, NavigationError>;

/// Options for [`Navigator::navigate`](crate::Navigator::navigate).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
    /// Opaque value stored with the history entry.
    pub payload: Option<serde_json::Value>,
}

impl NavigateOptions {
    pub fn replace() -> Self {
        Self {
            replace: true,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A committed navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigated {
    pub context: NavigationContext,
    pub layout: Option<String>,
}

/// Scroll offset saved per history entry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

/// Record embedded in each browser history entry written by the navigator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    pub marker: String,
    pub navigation_id: u64,
    /// Index of the entry in the session's history stack.
    pub position: u64,
    pub app_state: AppState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl HistoryState {
    pub fn new(
        navigation_id: u64,
        position: u64,
        app_state: AppState,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            marker: HISTORY_MARKER.to_string(),
            navigation_id,
            position,
            app_state,
            payload,
        }
    }

    /// Returns true if this entry was written by a navigator.
    pub fn is_router_entry(&self) -> bool {
        self.marker == HISTORY_MARKER
    }
}

/// What the application currently displays. Written only by the navigator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageState {
    pub pathname: String,
    pub search: String,
    pub hash: String,
    pub params: HashMap<String, String>,
    /// Pattern of the committed route.
    pub route: Option<String>,
    pub app_state: Option<AppState>,
    pub error: Option<NavigationError>,
    pub is_navigating: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_display() {
        let err = NavigationError::load_failed("/reports", "chunk 7 missing");
        assert_eq!(err.code(), NavigationErrorCode::LoadFailed);
        assert_eq!(err.to_string(), "/reports: chunk 7 missing");
        assert_eq!(err.path(), "/reports");

        let err = NavigationError::TooManyRedirects {
            path: "/r11".into(),
            limit: 10,
        };
        assert_eq!(err.code().as_str(), "TOO_MANY_REDIRECTS");
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_error_serializes_with_code_tag() {
        let err = NavigationError::NotFound {
            path: "/nope".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["path"], "/nope");
    }

    #[test]
    fn test_history_state_roundtrip_keeps_payload() {
        let state = HistoryState::new(
            3,
            1,
            AppState::from("authenticated"),
            Some(serde_json::json!({"draft": 12})),
        );
        let json = serde_json::to_string(&state).unwrap();
        let back: HistoryState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert!(back.is_router_entry());
    }
}
