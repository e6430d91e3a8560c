//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (navigation_id, path, state, phase, code fields)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (binaries)
//!     → whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Structured fields over formatted strings
//! - Navigation id flows through every event of one attempt
//! - Metrics are cheap and optional

pub mod logging;
pub mod metrics;
