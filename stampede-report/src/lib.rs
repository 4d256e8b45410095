//! Result aggregation for Stampede runs
//!
//! Turns the `ExecuteResult`s of one run into an [`AbReport`]: request
//! counts, timing figures and a percentile table, rendered as fixed-layout
//! text through its `Display` implementation.

pub mod aggregate;
pub mod format;
pub mod percentile;

pub use aggregate::{aggregate, AbReport, PercentileRow};
pub use percentile::{percentile, CUT_POINTS};
