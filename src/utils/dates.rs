// src/utils/dates.rs

//! Parsing of publication dates as shown on Polish job boards.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s+([a-z]+)\s+(\d{4})").expect("static regex is valid")
});

/// Genitive month names, accents stripped.
const MONTHS: [&str; 12] = [
    "stycznia",
    "lutego",
    "marca",
    "kwietnia",
    "maja",
    "czerwca",
    "lipca",
    "sierpnia",
    "wrzesnia",
    "pazdziernika",
    "listopada",
    "grudnia",
];

const NUMERIC_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y"];

/// Map Polish diacritics to their ASCII base letter.
fn strip_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'ą' => 'a',
            'ć' => 'c',
            'ę' => 'e',
            'ł' => 'l',
            'ń' => 'n',
            'ó' => 'o',
            'ś' => 's',
            'ź' | 'ż' => 'z',
            other => other,
        })
        .collect()
}

/// Parse a posted date such as `Opublikowana: 12 września 2025`.
///
/// Also accepts numeric dates (`2025-09-12`, `12.09.2025`) and the date part
/// of a `first_seen` timestamp. Returns `None` for anything else.
pub fn parse_posted_date(text: &str) -> Option<NaiveDate> {
    let lowered = strip_accents(&text.to_lowercase());
    let cleaned = lowered.replace("opublikowana:", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(caps) = DAY_MONTH_YEAR.captures(cleaned) {
        let day: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        let month = MONTHS.iter().position(|m| *m == &caps[2])? as u32 + 1;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Ok(ts) = DateTime::parse_from_str(cleaned, "%Y-%m-%d %H:%M:%S%z") {
        return Some(ts.date_naive());
    }

    NUMERIC_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
}
