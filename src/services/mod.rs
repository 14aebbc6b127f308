//! Service layer for the offer watcher.
//!
//! This module contains the business logic for:
//! - Search result pagination and detail enrichment (`OfferFetcher`)
//! - Listing and detail page extraction (`OfferParser`)

mod fetcher;
mod parser;

pub use fetcher::{FetchOutcome, OfferFetcher};
pub use parser::{OfferDetails, OfferParser};
