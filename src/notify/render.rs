//! Email body rendering.

use std::cmp::Reverse;

use chrono::NaiveDate;

use crate::models::Offer;
use crate::utils::dates::parse_posted_date;
use crate::utils::escape_html;

/// Best known date of an offer: publication date, else first seen.
pub fn offer_date(offer: &Offer) -> Option<NaiveDate> {
    offer
        .posted_date
        .as_deref()
        .and_then(parse_posted_date)
        .or_else(|| parse_posted_date(&offer.first_seen))
}

/// Sort newest first; offers without any date go last, ties keep their order.
pub fn sort_newest_first(offers: &mut [Offer]) {
    offers.sort_by_key(|offer| match offer_date(offer) {
        Some(date) => (0, Reverse(date)),
        None => (1, Reverse(NaiveDate::MIN)),
    });
}

/// Plain-text body listing at most `max_lines` offers.
pub fn text_body(offers: &[Offer], max_lines: usize) -> String {
    if offers.is_empty() {
        return "No new offers.".to_string();
    }

    let mut lines: Vec<String> = offers
        .iter()
        .take(max_lines)
        .map(|offer| offer.format("- {title} | {company} | {url}"))
        .collect();

    if offers.len() > max_lines {
        lines.push(format!("... and {} more.", offers.len() - max_lines));
    }

    format!("New offers ({}):\n\n{}\n", offers.len(), lines.join("\n"))
}

/// HTML body with one table row per offer.
pub fn html_body(offers: &[Offer], site_name: &str) -> String {
    if offers.is_empty() {
        return "<p>(No new offers)</p>".to_string();
    }

    let rows: String = offers
        .iter()
        .map(|offer| {
            let date = offer_date(offer)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">open offer</a></td><td>{}</td></tr>",
                escape_html(offer.company.as_deref().unwrap_or("-")),
                escape_html(&offer.title),
                escape_html(offer.location.as_deref().unwrap_or("-")),
                escape_html(&offer.url),
                date,
            )
        })
        .collect();

    format!(
        "<p style='font-family:Arial,sans-serif'>New offers ({}): <strong>{}</strong></p>\
         <table border='1' cellpadding='6' cellspacing='0' \
         style='border-collapse:collapse;width:100%;font-family:Arial,sans-serif;font-size:13px'>\
         <thead><tr>\
         <th style='text-align:left'>Company</th>\
         <th style='text-align:left'>Title</th>\
         <th style='text-align:left'>Location</th>\
         <th style='text-align:left'>Link</th>\
         <th style='text-align:left'>Posted</th>\
         </tr></thead><tbody>{}</tbody></table>",
        escape_html(site_name),
        offers.len(),
        rows
    )
}
