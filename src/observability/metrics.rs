//! Metrics collection.
//!
//! # Responsibilities
//! - Define router metrics (navigations, latency, redirects, hook failures)
//! - Record through the `metrics` facade; the embedding application installs
//!   the recorder/exporter it wants
//!
//! # Metrics
//! - `router_navigations_total` (counter): attempts by outcome
//! - `router_navigation_duration_seconds` (histogram): attempt latency by outcome
//! - `router_redirects_total` (counter): redirects followed by source
//! - `router_hook_failures_total` (counter): caught hook failures by phase
//! - `router_state_transitions_total` (counter): `set_state` calls
//!
//! # Design Decisions
//! - One process-wide switch, applied from configuration
//! - Recording never fails and never blocks navigation

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off for the whole process.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    tracing::debug!(enabled, "Router metrics switch updated");
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Record a finished navigation attempt. `outcome` is `ok` or an error code.
pub fn record_navigation(outcome: &'static str, started: Instant) {
    if !is_enabled() {
        return;
    }
    ::metrics::counter!("router_navigations_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("router_navigation_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

/// Record one followed redirect (`config`, `hook` or `fallback`).
pub fn record_redirect(source: &'static str) {
    if !is_enabled() {
        return;
    }
    ::metrics::counter!("router_redirects_total", "source" => source).increment(1);
}

pub fn record_hook_failure(phase: &'static str) {
    if !is_enabled() {
        return;
    }
    ::metrics::counter!("router_hook_failures_total", "phase" => phase).increment(1);
}

pub fn record_state_transition() {
    if !is_enabled() {
        return;
    }
    ::metrics::counter!("router_state_transitions_total").increment(1);
}
