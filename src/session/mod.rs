//! Transient state of an in-progress timed event. See [tracker::SessionTracker].

pub mod tracker;

pub use tracker::{format_elapsed, SessionState, SessionTracker};
