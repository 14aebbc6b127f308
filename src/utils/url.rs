// src/utils/url.rs

//! URL manipulation utilities.

use regex::Regex;
use sha2::{Digest, Sha256};

/// Percent-encode a search phrase for use inside a URL path segment.
///
/// # Examples
/// ```
/// use offerwatch::utils::url::encode_keyword;
///
/// assert_eq!(encode_keyword("Główna księgowa"), "G%C5%82%C3%B3wna%20ksi%C4%99gowa");
/// ```
pub fn encode_keyword(keyword: &str) -> String {
    // form encoding turns spaces into '+' and escapes a literal '+' as %2B
    ::url::form_urlencoded::byte_serialize(keyword.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Build the URL of one search results page.
///
/// The first page is the bare template; later pages append the page parameter.
pub fn search_page_url(template: &str, page_param: &str, keyword: &str, page: u32) -> String {
    let url = template.replace("{keyword}", &encode_keyword(keyword));
    if page <= 1 {
        return url;
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{page_param}={page}")
}

/// Extract a stable offer identifier from a URL.
///
/// Uses the first capture group of `pattern` when it matches, otherwise a
/// short SHA-256 digest of the URL so the id stays stable across runs.
pub fn extract_offer_id(pattern: &Regex, url: &str) -> String {
    if let Some(id) = pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    {
        return id;
    }

    let digest = Sha256::digest(url.as_bytes());
    format!("url-{}", &hex::encode(digest)[..16])
}
