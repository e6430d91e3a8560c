//! Application state subsystem.
//!
//! # Data Flow
//! ```text
//! External state-transition caller (login, logout, boot)
//!     → machine.rs set_state(next)
//!     → state_id += 1
//!     → subscribers notified synchronously
//!
//! Navigator:
//!     captures state_id before its suspension point
//!     → compares after resume; mismatch = CANCELLED
//! ```
//!
//! # Design Decisions
//! - Not a guarded transition table: any state may follow any other
//! - The counter advances on same-value transitions too
//! - Only the external caller writes state; the navigator only reads it

pub mod machine;

pub use machine::{AppState, StateMachine, StateTransition};
