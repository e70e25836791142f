//! Small terminal timer for tracking timed events. Finished sessions are stored as records in a
//! local directory, and the statistics (counts, averages and a calendar heatmap) are derived from
//! them on demand.
//!

pub mod cli;
pub mod fs;
pub mod session;
pub mod stats;
pub mod storage;
pub mod store;
pub mod utils;
