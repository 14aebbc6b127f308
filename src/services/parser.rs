// src/services/parser.rs

//! Listing page parser.
//!
//! Extracts offers from search result markup using configured CSS selectors.
//! Every optional field is extracted independently, so a card missing its
//! company or date still yields an offer.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Offer, SiteConfig};
use crate::utils::url::extract_offer_id;
use crate::utils::{non_empty, resolve_url};

static DETAIL_BLOCKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li, dd, dt, div, span, p").expect("static selector is valid")
});

/// Fields only available on an offer's own page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OfferDetails {
    pub posted_date: Option<String>,
    pub industry: Option<String>,
}

/// Typed extractor for listing and detail pages.
pub struct OfferParser {
    card: Selector,
    link: Selector,
    title: Option<Selector>,
    company: Option<Selector>,
    location: Option<Selector>,
    posted: Option<Selector>,
    fallback_link: Selector,
    attr_name: String,
    id_pattern: Regex,
    posted_pattern: Regex,
    industry_pattern: Regex,
    base_url: Url,
    source: String,
}

impl OfferParser {
    /// Compile selectors and patterns from the site configuration.
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let selectors = &site.selectors;
        let optional = |s: &Option<String>| s.as_deref().map(Self::parse_selector).transpose();

        Ok(Self {
            card: Self::parse_selector(&selectors.card)?,
            link: Self::parse_selector(&selectors.link)?,
            title: optional(&selectors.title)?,
            company: optional(&selectors.company)?,
            location: optional(&selectors.location)?,
            posted: optional(&selectors.posted)?,
            fallback_link: Self::parse_selector(&selectors.fallback_link)?,
            attr_name: selectors.attr_name.clone(),
            id_pattern: Regex::new(&site.id_pattern)?,
            posted_pattern: Regex::new(&site.posted_pattern)?,
            industry_pattern: Regex::new(&site.industry_pattern)?,
            base_url: Url::parse(&site.base_url)?,
            source: site.name.clone(),
        })
    }

    /// Lazily extract offers from one listing page.
    ///
    /// Pages without offer cards fall back to scanning offer anchors.
    /// Duplicate ids on the same page are yielded once.
    pub fn parse_page<'a>(
        &'a self,
        document: &'a Html,
        first_seen: &'a str,
    ) -> Box<dyn Iterator<Item = Offer> + 'a> {
        let mut seen = HashSet::new();
        let has_cards = document.select(&self.card).next().is_some();

        let offers: Box<dyn Iterator<Item = Offer> + 'a> = if has_cards {
            Box::new(
                document
                    .select(&self.card)
                    .filter_map(move |card| self.parse_card(card, first_seen)),
            )
        } else {
            log::debug!("No offer cards found, scanning offer anchors instead");
            Box::new(
                document
                    .select(&self.fallback_link)
                    .filter_map(move |anchor| self.parse_anchor(anchor, first_seen)),
            )
        };

        Box::new(offers.filter(move |offer| seen.insert(offer.id.clone())))
    }

    /// Extract publication date and industry from an offer's detail page.
    pub fn parse_details(&self, document: &Html) -> OfferDetails {
        OfferDetails {
            posted_date: Self::find_in_blocks(document, &self.posted_pattern),
            industry: Self::find_in_blocks(document, &self.industry_pattern),
        }
    }

    fn parse_card(&self, card: ElementRef<'_>, first_seen: &str) -> Option<Offer> {
        let link = card.select(&self.link).next()?;
        let href = link.value().attr(&self.attr_name)?.trim();
        if href.is_empty() {
            return None;
        }

        let title = Self::select_text(card, self.title.as_ref())
            .or_else(|| non_empty(&Self::text(link)))?;

        Some(self.build_offer(
            href,
            title,
            Self::select_text(card, self.company.as_ref()),
            Self::select_text(card, self.location.as_ref()),
            Self::select_text(card, self.posted.as_ref()),
            first_seen,
        ))
    }

    fn parse_anchor(&self, anchor: ElementRef<'_>, first_seen: &str) -> Option<Offer> {
        let href = anchor.value().attr(&self.attr_name)?.trim();
        let title = non_empty(&Self::text(anchor))?;
        if href.is_empty() {
            return None;
        }
        Some(self.build_offer(href, title, None, None, None, first_seen))
    }

    fn build_offer(
        &self,
        href: &str,
        title: String,
        company: Option<String>,
        location: Option<String>,
        posted_date: Option<String>,
        first_seen: &str,
    ) -> Offer {
        let url = resolve_url(&self.base_url, href);
        Offer {
            id: extract_offer_id(&self.id_pattern, &url),
            title,
            company,
            location,
            url,
            posted_date,
            industry: None,
            first_seen: first_seen.to_string(),
            source: self.source.clone(),
        }
    }

    fn select_text(scope: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
        selector
            .and_then(|sel| scope.select(sel).next())
            .and_then(|el| non_empty(&Self::text(el)))
    }

    fn text(el: ElementRef<'_>) -> String {
        el.text().collect()
    }

    /// Match `pattern` against the smallest block whose text matches.
    ///
    /// Returns the first capture group if the pattern has one, the whole
    /// match otherwise.
    fn find_in_blocks(document: &Html, pattern: &Regex) -> Option<String> {
        document
            .select(&DETAIL_BLOCKS)
            .filter_map(|el| non_empty(&Self::text(el)))
            .filter(|text| pattern.is_match(text))
            .min_by_key(|text| text.len())
            .and_then(|text| {
                let caps = pattern.captures(&text)?;
                let m = caps.get(1).or_else(|| caps.get(0))?;
                non_empty(m.as_str())
            })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <div data-test="default-offer">
            <h2 data-test="offer-title">
              <a href="/praca/glowna-ksiegowa-warszawa,oferta,1004000001">Główna Księgowa</a>
            </h2>
            <h3 data-test="text-company-name">ACME   Sp. z o.o.</h3>
            <h4 data-test="text-region">Warszawa, mazowieckie</h4>
            <p data-test="text-added">Opublikowana: 12 września 2025</p>
          </div>
          <div data-test="default-offer">
            <a href="https://www.pracuj.pl/praca/chief-accountant,oferta,1004000002">
              <span data-test="offer-title">Chief Accountant</span>
            </a>
          </div>
          <div data-test="default-offer">
            <a href="/praca/glowna-ksiegowa-warszawa,oferta,1004000001">Główna Księgowa</a>
          </div>
          <div data-test="default-offer"><span>Promoted content</span></div>
        </body></html>
    "#;

    fn parser() -> OfferParser {
        OfferParser::new(&SiteConfig::default()).unwrap()
    }

    fn parse(html: &str) -> Vec<Offer> {
        let parser = parser();
        let document = Html::parse_document(html);
        parser.parse_page(&document, "2026-10-18 07:00:00+0200").collect()
    }

    #[test]
    fn test_parse_cards() {
        let offers = parse(LISTING);
        assert_eq!(offers.len(), 2);

        let first = &offers[0];
        assert_eq!(first.id, "1004000001");
        assert_eq!(first.title, "Główna Księgowa");
        assert_eq!(first.company.as_deref(), Some("ACME Sp. z o.o."));
        assert_eq!(first.location.as_deref(), Some("Warszawa, mazowieckie"));
        assert_eq!(
            first.posted_date.as_deref(),
            Some("Opublikowana: 12 września 2025")
        );
        assert_eq!(
            first.url,
            "https://www.pracuj.pl/praca/glowna-ksiegowa-warszawa,oferta,1004000001"
        );
        assert_eq!(first.source, "pracuj.pl");
        assert_eq!(first.first_seen, "2026-10-18 07:00:00+0200");
    }

    #[test]
    fn test_missing_optional_fields_are_none() {
        let offers = parse(LISTING);
        let second = &offers[1];
        assert_eq!(second.id, "1004000002");
        assert_eq!(second.title, "Chief Accountant");
        assert_eq!(second.company, None);
        assert_eq!(second.location, None);
        assert_eq!(second.posted_date, None);
    }

    #[test]
    fn test_anchor_fallback() {
        let html = r#"
            <ul>
              <li><a href="/praca/ksiegowa,oferta,1004000003">Główny Księgowy</a></li>
              <li><a href="/praca/ksiegowa,oferta,1004000004">  </a></li>
              <li><a href="/praca/ksiegowa">Not an offer</a></li>
            </ul>
        "#;
        let offers = parse(html);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id, "1004000003");
        assert_eq!(offers[0].title, "Główny Księgowy");
    }

    #[test]
    fn test_page_without_listings_yields_nothing() {
        assert!(parse("<html><body><p>Brak ofert</p></body></html>").is_empty());
        assert!(parse("<<<not really html").is_empty());
    }

    #[test]
    fn test_parse_details() {
        let html = r#"
            <html><body>
              <div class="header">
                <span>Opublikowana: 3 października 2026</span>
                <ul>
                  <li>Branża: Finanse / Ekonomia</li>
                  <li>Umowa o pracę</li>
                </ul>
              </div>
            </body></html>
        "#;
        let details = parser().parse_details(&Html::parse_document(html));
        assert_eq!(
            details.posted_date.as_deref(),
            Some("Opublikowana: 3 października 2026")
        );
        assert_eq!(details.industry.as_deref(), Some("Finanse / Ekonomia"));
    }

    #[test]
    fn test_parse_details_missing() {
        let details = parser().parse_details(&Html::parse_document("<p>Nothing here</p>"));
        assert_eq!(details, OfferDetails::default());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(OfferParser::parse_selector("[[invalid").is_err());
    }
}
