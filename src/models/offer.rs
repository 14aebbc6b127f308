//! Offer data structure.

use serde::{Deserialize, Serialize};

/// A job offer scraped from a listing page.
///
/// Field order matches the column order of the master and daily CSV files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Offer {
    /// Stable identifier derived from the offer URL
    pub id: String,

    /// Offer title
    pub title: String,

    /// Hiring company, when the listing shows one
    #[serde(default)]
    pub company: Option<String>,

    /// Location text as shown on the listing
    #[serde(default)]
    pub location: Option<String>,

    /// Absolute URL to the offer
    pub url: String,

    /// Publication date as presented by the site
    #[serde(default)]
    pub posted_date: Option<String>,

    /// Industry from the detail page, if enriched
    #[serde(default)]
    pub industry: Option<String>,

    /// Timestamp of the run that first fetched the offer
    #[serde(default)]
    pub first_seen: String,

    /// Site the offer was scraped from
    #[serde(default)]
    pub source: String,
}

impl Offer {
    /// Column names in file order.
    pub const COLUMNS: [&'static str; 9] = [
        "id",
        "title",
        "company",
        "location",
        "url",
        "posted_date",
        "industry",
        "first_seen",
        "source",
    ];

    /// Value of a CSV column by name. Unknown columns and absent fields are `None`.
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "id" => Some(&self.id),
            "title" => Some(&self.title),
            "company" => self.company.as_deref(),
            "location" => self.location.as_deref(),
            "url" => Some(&self.url),
            "posted_date" => self.posted_date.as_deref(),
            "industry" => self.industry.as_deref(),
            "first_seen" => Some(&self.first_seen),
            "source" => Some(&self.source),
            _ => None,
        }
    }

    /// Format offer for display using a template.
    ///
    /// Supported placeholders:
    /// - `{id}`, `{title}`, `{company}`, `{location}`, `{url}`, `{posted}`
    ///
    /// Missing optional fields render as an empty string.
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{id}", &self.id)
            .replace("{title}", &self.title)
            .replace("{company}", self.company.as_deref().unwrap_or(""))
            .replace("{location}", self.location.as_deref().unwrap_or(""))
            .replace("{url}", &self.url)
            .replace("{posted}", self.posted_date.as_deref().unwrap_or(""))
    }
}
