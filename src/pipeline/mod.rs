//! Pipeline entry points.
//!
//! - `run_scrape`: fetch, diff against the master store, append, notify
//! - `calculate_new`: pure diff of a fetch against known ids

pub mod diff;
pub mod run;

pub use diff::{DiffResult, calculate_new};
pub use run::{RunOptions, RunReport, run_scrape};
