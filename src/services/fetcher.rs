// src/services/fetcher.rs

//! Offer fetcher service.
//!
//! Walks the paginated search results for every keyword phrase, one request
//! at a time, and optionally visits detail pages of selected offers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use scraper::Html;

use crate::error::Result;
use crate::models::{Config, Keywords, Offer, RunMode};
use crate::services::parser::OfferParser;
use crate::utils::http::fetch_text;
use crate::utils::url::search_page_url;

/// Summary of a fetch run.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Offers in fetch order, possibly repeating across keywords
    pub offers: Vec<Offer>,
    pub keyword_total: usize,
    pub pages_fetched: usize,
    pub page_failures: usize,
}

/// Service for fetching offers from the search endpoint.
pub struct OfferFetcher {
    config: Arc<Config>,
    client: Client,
    parser: OfferParser,
}

impl OfferFetcher {
    /// Create a fetcher sharing the given HTTP client.
    pub fn new(config: Arc<Config>, client: Client) -> Result<Self> {
        let parser = OfferParser::new(&config.site)?;
        Ok(Self {
            config,
            client,
            parser,
        })
    }

    /// Fetch offers for all keywords, sequentially.
    ///
    /// Failures never abort the run: a failing page ends pagination for its
    /// keyword and the next keyword proceeds.
    pub async fn fetch_all(
        &self,
        keywords: &Keywords,
        mode: RunMode,
        first_seen: &str,
    ) -> FetchOutcome {
        let page_cap = mode.page_cap(&self.config.fetcher);
        let mut outcome = FetchOutcome {
            keyword_total: keywords.len(),
            ..FetchOutcome::default()
        };

        for keyword in keywords.iter() {
            log::info!("Searching '{}' ({}, up to {} pages)", keyword, mode.as_str(), page_cap);
            let offers = self
                .fetch_keyword(keyword, page_cap, first_seen, &mut outcome)
                .await;
            log::info!("Found {} offers for '{}'", offers.len(), keyword);
            outcome.offers.extend(offers);
        }

        outcome
    }

    /// Fetch all pages of one keyword until an empty page, a page with
    /// nothing unseen, a failure, or the page cap.
    async fn fetch_keyword(
        &self,
        keyword: &str,
        page_cap: u32,
        first_seen: &str,
        outcome: &mut FetchOutcome,
    ) -> Vec<Offer> {
        let delay = Duration::from_millis(self.config.fetcher.request_delay_ms);
        let needle = keyword.to_lowercase();
        let mut seen = HashSet::new();
        let mut collected = Vec::new();

        for page in 1..=page_cap {
            let url = search_page_url(
                &self.config.site.search_url,
                &self.config.site.page_param,
                keyword,
                page,
            );

            let html = match fetch_text(&self.client, &url).await {
                Ok(html) => html,
                Err(error) => {
                    outcome.page_failures += 1;
                    log::warn!("Failed to fetch page {} for '{}': {}", page, keyword, error);
                    break;
                }
            };
            outcome.pages_fetched += 1;

            let batch: Vec<Offer> = {
                let document = Html::parse_document(&html);
                self.parser.parse_page(&document, first_seen).collect()
            };

            if batch.is_empty() {
                log::debug!("Page {} for '{}' has no offers, stopping", page, keyword);
                break;
            }

            let fresh: Vec<Offer> = batch
                .into_iter()
                .filter(|offer| offer.title.to_lowercase().contains(&needle))
                .filter(|offer| seen.insert(offer.id.clone()))
                .collect();

            if fresh.is_empty() && page > 1 {
                log::debug!("Page {} for '{}' repeats earlier offers, stopping", page, keyword);
                break;
            }
            collected.extend(fresh);

            if page < page_cap && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        collected
    }

    /// Fill posted date and industry from detail pages.
    ///
    /// Visits at most `max_detail_requests` offers, in order. Returns the
    /// number of offers whose detail page was fetched.
    pub async fn enrich(&self, offers: &mut [Offer]) -> usize {
        let limit = self.config.fetcher.max_detail_requests;
        let delay = Duration::from_millis(self.config.fetcher.detail_delay_ms);
        let mut enriched = 0;

        for (i, offer) in offers.iter_mut().take(limit).enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let html = match fetch_text(&self.client, &offer.url).await {
                Ok(html) => html,
                Err(error) => {
                    log::debug!("Skipping details for {}: {}", offer.url, error);
                    continue;
                }
            };

            let details = {
                let document = Html::parse_document(&html);
                self.parser.parse_details(&document)
            };

            if offer.posted_date.is_none() {
                offer.posted_date = details.posted_date;
            }
            if details.industry.is_some() {
                offer.industry = details.industry;
            }
            enriched += 1;
        }

        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::create_client;

    #[test]
    fn test_new_rejects_invalid_selector() {
        let mut config = Config::default();
        config.site.selectors.card = "[[invalid".to_string();
        let client = create_client(&config.fetcher).unwrap();
        assert!(OfferFetcher::new(Arc::new(config), client).is_err());
    }
}
