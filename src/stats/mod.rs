//! Aggregations over the full record collection. Everything here is a pure function of the
//! records and the current time.

pub mod grid;
pub mod summary;

pub use grid::{contribution_level, ContributionGrid, MonthLabel, DAYS_IN_WEEK, DEFAULT_WEEKS};
pub use summary::Statistics;
