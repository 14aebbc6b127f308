// src/models/mod.rs

//! Domain models for the offer watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod keywords;
mod offer;

// Re-export all public types
pub use config::{Config, FetcherConfig, ListingSelectors, NotifyConfig, PathsConfig, SiteConfig};
pub use keywords::{DEFAULT_KEYWORDS, Keywords};
pub use offer::Offer;

/// How deep a run paginates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// First run: no master store yet, paginate deeply
    FullBackfill,
    /// Regular run: new offers surface on early pages
    Incremental,
}

impl RunMode {
    /// Full backfill when forced or when there is no master store yet.
    pub fn select(force_full: bool, store_exists: bool) -> Self {
        if force_full || !store_exists {
            Self::FullBackfill
        } else {
            Self::Incremental
        }
    }

    /// Page cap per keyword for this mode.
    pub fn page_cap(&self, config: &FetcherConfig) -> u32 {
        match self {
            Self::FullBackfill => config.full_page_cap,
            Self::Incremental => config.incremental_page_cap,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullBackfill => "full backfill",
            Self::Incremental => "incremental",
        }
    }
}
