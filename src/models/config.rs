//! Application configuration structures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and pagination behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Target site endpoints and extraction rules
    #[serde(default)]
    pub site: SiteConfig,

    /// Email rendering settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// File names inside the storage directory
    #[serde(default)]
    pub paths: PathsConfig,

    /// IANA time zone used for `first_seen` and daily file names
    #[serde(default = "defaults::timezone")]
    pub timezone: String,
}

impl Config {
    /// Load configuration, or defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                log::error!("Malformed config {}", path.display());
                AppError::Toml(e)
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Config not found at {}. Using defaults.", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(AppError::config(format!(
                "Cannot read config {}: {e}",
                path.display()
            ))),
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.full_page_cap == 0 || self.fetcher.incremental_page_cap == 0 {
            return Err(AppError::validation("fetcher page caps must be > 0"));
        }
        if self.fetcher.incremental_page_cap > self.fetcher.full_page_cap {
            return Err(AppError::validation(
                "fetcher.incremental_page_cap must not exceed fetcher.full_page_cap",
            ));
        }
        if !self.site.search_url.contains("{keyword}") {
            return Err(AppError::validation(
                "site.search_url must contain a {keyword} placeholder",
            ));
        }
        url::Url::parse(&self.site.base_url)?;
        if self.site.page_param.trim().is_empty() {
            return Err(AppError::validation("site.page_param is empty"));
        }
        self.site.selectors.validate()?;
        for pattern in [
            &self.site.id_pattern,
            &self.site.posted_pattern,
            &self.site.industry_pattern,
        ] {
            Regex::new(pattern)?;
        }
        self.tz()?;
        if self.paths.master_file.trim().is_empty() {
            return Err(AppError::validation("paths.master_file is empty"));
        }
        Ok(())
    }

    /// Parsed time zone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::validation(format!("Unknown timezone '{}': {e}", self.timezone)))
    }

    /// Full path of the master store inside a storage directory.
    pub fn master_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.paths.master_file)
    }

    /// Full path of the keywords file inside a storage directory.
    pub fn keywords_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.paths.keywords_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            site: SiteConfig::default(),
            notify: NotifyConfig::default(),
            paths: PathsConfig::default(),
            timezone: defaults::timezone(),
        }
    }
}

/// HTTP client and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header for HTTP requests
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between listing page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Delay between detail page requests in milliseconds
    #[serde(default = "defaults::detail_delay")]
    pub detail_delay_ms: u64,

    /// Page cap per keyword when the master store does not exist yet
    #[serde(default = "defaults::full_page_cap")]
    pub full_page_cap: u32,

    /// Page cap per keyword on regular runs
    #[serde(default = "defaults::incremental_page_cap")]
    pub incremental_page_cap: u32,

    /// Maximum detail pages fetched per run to fill posted date and industry (0 disables)
    #[serde(default = "defaults::max_detail_requests")]
    pub max_detail_requests: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            detail_delay_ms: defaults::detail_delay(),
            full_page_cap: defaults::full_page_cap(),
            incremental_page_cap: defaults::incremental_page_cap(),
            max_detail_requests: defaults::max_detail_requests(),
        }
    }
}

/// Target site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Short site name written to the `source` column
    #[serde(default = "defaults::site_name")]
    pub name: String,

    /// Base URL used to resolve relative offer links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Search URL template, `{keyword}` is replaced by the encoded phrase
    #[serde(default = "defaults::search_url")]
    pub search_url: String,

    /// Query parameter carrying the page number
    #[serde(default = "defaults::page_param")]
    pub page_param: String,

    /// Regex whose first group extracts the site-assigned id from a URL
    #[serde(default = "defaults::id_pattern")]
    pub id_pattern: String,

    /// Regex matching the publication date text on a detail page
    #[serde(default = "defaults::posted_pattern")]
    pub posted_pattern: String,

    /// Regex whose first group captures the industry on a detail page
    #[serde(default = "defaults::industry_pattern")]
    pub industry_pattern: String,

    /// CSS selectors for listing pages
    #[serde(default)]
    pub selectors: ListingSelectors,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: defaults::site_name(),
            base_url: defaults::base_url(),
            search_url: defaults::search_url(),
            page_param: defaults::page_param(),
            id_pattern: defaults::id_pattern(),
            posted_pattern: defaults::posted_pattern(),
            industry_pattern: defaults::industry_pattern(),
            selectors: ListingSelectors::default(),
        }
    }
}

/// CSS selectors for scraping a listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each offer card
    #[serde(default = "defaults::card_selector")]
    pub card: String,

    /// Selector for the offer link within a card
    #[serde(default = "defaults::link_selector")]
    pub link: String,

    /// Selector for the title within a card (falls back to the link text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Selector for the company name within a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    /// Selector for the location within a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Selector for the publication date within a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted: Option<String>,

    /// Anchor selector used when a page has no cards
    #[serde(default = "defaults::fallback_link_selector")]
    pub fallback_link: String,

    /// HTML attribute name for extracting links (usually "href")
    #[serde(default = "defaults::attr_name")]
    pub attr_name: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            card: defaults::card_selector(),
            link: defaults::link_selector(),
            title: Some("[data-test=\"offer-title\"]".to_string()),
            company: Some("[data-test=\"text-company-name\"]".to_string()),
            location: Some("[data-test=\"text-region\"]".to_string()),
            posted: Some("[data-test=\"text-added\"]".to_string()),
            fallback_link: defaults::fallback_link_selector(),
            attr_name: defaults::attr_name(),
        }
    }
}

impl ListingSelectors {
    /// Check that every configured selector parses.
    pub fn validate(&self) -> Result<()> {
        let required = [&self.card, &self.link, &self.fallback_link];
        let optional = [&self.title, &self.company, &self.location, &self.posted];

        for s in required.into_iter().chain(optional.into_iter().flatten()) {
            Selector::parse(s).map_err(|e| AppError::selector(s.as_str(), format!("{e:?}")))?;
        }
        Ok(())
    }
}

/// Email rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Email subject line
    #[serde(default = "defaults::subject")]
    pub subject: String,

    /// Send a "no new offers" notice when nothing is new
    #[serde(default = "defaults::send_when_empty")]
    pub send_when_empty: bool,

    /// Attach an XLSX table next to the CSV
    #[serde(default = "defaults::attach_xlsx")]
    pub attach_xlsx: bool,

    /// Maximum offers listed in the plain-text body
    #[serde(default = "defaults::max_text_lines")]
    pub max_text_lines: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            subject: defaults::subject(),
            send_when_empty: defaults::send_when_empty(),
            attach_xlsx: defaults::attach_xlsx(),
            max_text_lines: defaults::max_text_lines(),
        }
    }
}

/// File names inside the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Master store CSV
    #[serde(default = "defaults::master_file")]
    pub master_file: String,

    /// Keyword phrases (JSON array or one phrase per line)
    #[serde(default = "defaults::keywords_file")]
    pub keywords_file: String,

    /// Prefix of the daily export files, followed by `YYYYMMDD`
    #[serde(default = "defaults::daily_prefix")]
    pub daily_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            master_file: defaults::master_file(),
            keywords_file: defaults::keywords_file(),
            daily_prefix: defaults::daily_prefix(),
        }
    }
}

mod defaults {
    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; offerwatch/0.1)".into()
    }
    pub fn accept_language() -> String {
        "pl-PL,pl;q=0.9,en;q=0.8".into()
    }
    pub fn timeout() -> u64 {
        25
    }
    pub fn request_delay() -> u64 {
        1200
    }
    pub fn detail_delay() -> u64 {
        200
    }
    pub fn full_page_cap() -> u32 {
        80
    }
    pub fn incremental_page_cap() -> u32 {
        20
    }
    pub fn max_detail_requests() -> usize {
        100
    }

    // Site defaults
    pub fn site_name() -> String {
        "pracuj.pl".into()
    }
    pub fn base_url() -> String {
        "https://www.pracuj.pl".into()
    }
    pub fn search_url() -> String {
        "https://www.pracuj.pl/praca/{keyword}%3Bkw".into()
    }
    pub fn page_param() -> String {
        "pn".into()
    }
    pub fn id_pattern() -> String {
        r"oferta.*?(\d{7,})".into()
    }
    pub fn posted_pattern() -> String {
        r"Opublikowana:\s*\d{1,2}\s+\S+\s+\d{4}".into()
    }
    pub fn industry_pattern() -> String {
        r"(?i)\bBranża\b[:\s]+(.+)$".into()
    }

    // Selector defaults
    pub fn card_selector() -> String {
        "[data-test=\"default-offer\"]".into()
    }
    pub fn link_selector() -> String {
        "a[href*='oferta']".into()
    }
    pub fn fallback_link_selector() -> String {
        "a[href*='/praca/'][href*='oferta']".into()
    }
    pub fn attr_name() -> String {
        "href".into()
    }

    // Notify defaults
    pub fn subject() -> String {
        "New offers (Pracuj.pl): Chief Accountant / Główna/y Księgowa/y".into()
    }
    pub fn send_when_empty() -> bool {
        true
    }
    pub fn attach_xlsx() -> bool {
        true
    }
    pub fn max_text_lines() -> usize {
        30
    }

    // Path defaults
    pub fn master_file() -> String {
        "offers_master.csv".into()
    }
    pub fn keywords_file() -> String {
        "keywords.json".into()
    }
    pub fn daily_prefix() -> String {
        "offers_NEW_".into()
    }

    pub fn timezone() -> String {
        "Europe/Warsaw".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetcher.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_page_cap() {
        let mut config = Config::default();
        config.fetcher.incremental_page_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_template_without_placeholder() {
        let mut config = Config::default();
        config.site.search_url = "https://www.pracuj.pl/praca".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.site.selectors.company = Some("[[invalid".to_string());
        assert!(matches!(
            config.validate(),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_timezone() {
        let mut config = Config::default();
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetcher]
            incremental_page_cap = 5

            [notify]
            send_when_empty = false
            "#,
        )
        .unwrap();

        assert_eq!(config.fetcher.incremental_page_cap, 5);
        assert_eq!(config.fetcher.full_page_cap, 80);
        assert!(!config.notify.send_when_empty);
        assert_eq!(config.site.page_param, "pn");
        assert_eq!(config.timezone, "Europe/Warsaw");
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let config = Config::load_or_default("/nonexistent/offerwatch/config.toml").unwrap();
        assert_eq!(config.paths.master_file, "offers_master.csv");
    }

    #[test]
    fn load_or_default_rejects_malformed_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[site]\nsearch_url = \"https://example.com/{keyword}\n").unwrap();

        assert!(matches!(
            Config::load_or_default(&path),
            Err(AppError::Toml(_))
        ));
    }

    #[test]
    fn load_or_default_reads_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[fetcher]\nincremental_page_cap = 4\n").unwrap();

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.fetcher.incremental_page_cap, 4);
    }
}
