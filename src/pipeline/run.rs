// src/pipeline/run.rs

//! One scrape run: fetch, diff, persist, export, notify.

use chrono::Utc;

use crate::error::Result;
use crate::models::{Config, Keywords, RunMode};
use crate::notify::render::sort_newest_first;
use crate::notify::{Notifier, NotifyOutcome};
use crate::pipeline::diff::calculate_new;
use crate::services::OfferFetcher;
use crate::storage::{DailyExport, OfferStore, id_set};

/// Timestamp format of `first_seen`.
pub const FIRST_SEEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

/// Switches for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Paginate to the full backfill cap even if the store exists
    pub force_full: bool,
    /// Fetch and diff only: no append, no export files, no email
    pub dry_run: bool,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub mode: RunMode,
    pub fetched: usize,
    pub new: usize,
    pub appended: usize,
    pub total: usize,
    pub page_failures: usize,
    pub notification: NotifyOutcome,
}

/// Run the scrape pipeline once.
///
/// Store read and append failures are returned. Fetch, export and
/// notification failures are logged and the run still succeeds.
#[allow(clippy::too_many_arguments)]
pub async fn run_scrape(
    config: &Config,
    keywords: &Keywords,
    store: &dyn OfferStore,
    fetcher: &OfferFetcher,
    notifier: &Notifier,
    export: &DailyExport,
    options: RunOptions,
) -> Result<RunReport> {
    let tz = config.tz()?;
    let now = Utc::now().with_timezone(&tz);
    let first_seen = now.format(FIRST_SEEN_FORMAT).to_string();

    let mode = RunMode::select(options.force_full, store.exists().await?);
    log::info!(
        "Starting {} run for {} keyword(s), store at {}",
        mode.as_str(),
        keywords.len(),
        store.location()
    );

    let existing = store.load().await?;
    let known = id_set(&existing);
    log::info!("Master store holds {} offers", existing.len());

    let fetched = fetcher.fetch_all(keywords, mode, &first_seen).await;
    log::info!(
        "Fetched {} offers for {} keyword(s) from {} page(s), {} page failure(s)",
        fetched.offers.len(),
        fetched.keyword_total,
        fetched.pages_fetched,
        fetched.page_failures
    );

    let diff = calculate_new(&fetched.offers, &known);
    log::info!(
        "{} new, {} already known, {} duplicate(s) across keywords",
        diff.added.len(),
        diff.already_known,
        diff.duplicates
    );

    if diff.has_changes() {
        log::debug!("New offer ids: {:?}", diff.added_ids());
    }

    let mut added = diff.added;
    if !added.is_empty() {
        let enriched = fetcher.enrich(&mut added).await;
        log::debug!("Enriched {} of {} new offers", enriched, added.len());
    }

    if options.dry_run {
        for offer in &added {
            log::info!("[dry-run] {}", offer.format("{title} | {company} | {url}"));
        }
        return Ok(RunReport {
            mode,
            fetched: fetched.offers.len(),
            new: added.len(),
            appended: 0,
            total: existing.len(),
            page_failures: fetched.page_failures,
            notification: NotifyOutcome::Skipped("dry run"),
        });
    }

    let appended = store.append(&added).await?;
    let total = existing.len() + appended;
    log::info!("Appended {} offers, store now holds {}", appended, total);

    let mut digest = added;
    sort_newest_first(&mut digest);

    let attachments = match export.render(&digest, now.date_naive(), config.notify.attach_xlsx) {
        Ok(files) => {
            match export.save(&files).await {
                Ok(paths) => {
                    for path in &paths {
                        log::info!("Saved {}", path.display());
                    }
                }
                Err(e) => log::warn!("Failed to save daily export: {}", e),
            }
            files
        }
        Err(e) => {
            log::warn!("Failed to render daily export: {}", e);
            Vec::new()
        }
    };

    let notification = notifier.notify(&digest, attachments).await;

    let report = RunReport {
        mode,
        fetched: fetched.offers.len(),
        new: digest.len(),
        appended,
        total,
        page_failures: fetched.page_failures,
        notification,
    };
    log::info!(
        "Run complete: fetched={} new={} appended={} total={} notification={:?}",
        report.fetched,
        report.new,
        report.appended,
        report.total,
        report.notification
    );

    Ok(report)
}
