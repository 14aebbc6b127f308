//! Diff calculation against the master store.
//!
//! Identifies the offers of the current run that have never been recorded.
//! Removals and edits are not tracked: the master store is append-only.

use std::collections::HashSet;

use crate::models::Offer;

/// Offers of this run that are new, plus bookkeeping for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// New offers in fetch order
    pub added: Vec<Offer>,
    /// Fetched offers already present in the master store
    pub already_known: usize,
    /// Repeated ids within this run that were dropped
    pub duplicates: usize,
}

impl DiffResult {
    /// Check if there are any new offers.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty()
    }

    pub fn added_ids(&self) -> Vec<&str> {
        self.added.iter().map(|o| o.id.as_str()).collect()
    }
}

/// Return the fetched offers whose id is not in `existing_ids`.
///
/// Order follows `fetched`; when an id repeats within `fetched`, only its
/// first occurrence is kept.
pub fn calculate_new(fetched: &[Offer], existing_ids: &HashSet<String>) -> DiffResult {
    let mut seen: HashSet<&str> = HashSet::with_capacity(fetched.len());
    let mut result = DiffResult::default();

    for offer in fetched {
        if !seen.insert(offer.id.as_str()) {
            result.duplicates += 1;
            continue;
        }
        if existing_ids.contains(&offer.id) {
            result.already_known += 1;
            continue;
        }
        result.added.push(offer.clone());
    }

    result
}
