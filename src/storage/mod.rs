//! Storage for offer history and daily exports.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── config.toml                # Optional configuration
//! ├── keywords.json              # Search phrases
//! ├── offers_master.csv          # Every offer ever seen (append-only)
//! ├── offers_NEW_20261018.csv    # New offers of one run
//! └── offers_NEW_20261018.xlsx
//! ```

pub mod daily;
pub mod master;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Offer;

// Re-export for convenience
pub use daily::{DailyExport, ExportedFile};
pub use master::CsvMasterStore;

/// Trait for master store backends.
#[async_trait]
pub trait OfferStore: Send + Sync {
    /// Whether the store has been created. Absence triggers a full backfill.
    async fn exists(&self) -> Result<bool>;

    /// Load every recorded offer in insertion order, empty if absent.
    async fn load(&self) -> Result<Vec<Offer>>;

    /// Append offers whose id is not recorded yet. Returns rows written.
    async fn append(&self, offers: &[Offer]) -> Result<usize>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// Collect the id set of recorded offers.
pub fn id_set(offers: &[Offer]) -> HashSet<String> {
    offers.iter().map(|o| o.id.clone()).collect()
}

/// Serialize offers as CSV, optionally preceded by the header row.
pub fn offers_to_csv(offers: &[Offer], with_header: bool) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        wtr.write_record(Offer::COLUMNS)?;
    }
    for offer in offers {
        wtr.serialize(offer)?;
    }

    wtr.into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// Serialize offers as header-less rows laid out in `columns` order.
///
/// Columns the offer does not know are written empty; offer fields missing
/// from `columns` are left out.
pub fn offers_to_csv_columns(offers: &[Offer], columns: &[String]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for offer in offers {
        wtr.write_record(columns.iter().map(|c| offer.field(c).unwrap_or("")))?;
    }

    wtr.into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// Header row of CSV bytes.
pub fn csv_columns(bytes: &[u8]) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    Ok(rdr.headers()?.iter().map(str::to_string).collect())
}

/// Parse CSV bytes with a header row into offers.
pub fn offers_from_csv(bytes: &[u8]) -> Result<Vec<Offer>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let mut offers = Vec::new();
    for record in rdr.deserialize() {
        offers.push(record?);
    }
    Ok(offers)
}
