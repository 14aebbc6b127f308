//! Keyword phrases driving the search.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Phrases used when no keywords file exists.
pub const DEFAULT_KEYWORDS: [&str; 3] = ["Główna księgowa", "Główny księgowy", "Chief Accountant"];

/// Ordered, de-duplicated list of search phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keywords(Vec<String>);

impl Keywords {
    /// Build from raw phrases: trims, drops empties, collapses case-insensitive duplicates.
    pub fn new<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let list: Vec<String> = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .filter(|p| seen.insert(p.to_lowercase()))
            .collect();

        if list.is_empty() {
            return Err(AppError::config("Keyword list is empty"));
        }
        Ok(Self(list))
    }

    /// Load phrases from a file.
    ///
    /// `.json` files hold an array of strings; any other file is read as one
    /// phrase per line, with `#` comments. A missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "Keywords file {} not found. Using defaults.",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::config(format!(
                    "Cannot read keywords file {}: {e}",
                    path.display()
                )));
            }
        };

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            let phrases: Vec<String> = serde_json::from_str(&content).map_err(|e| {
                AppError::config(format!("Malformed keywords file {}: {e}", path.display()))
            })?;
            Self::new(phrases)
        } else {
            Self::new(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.starts_with('#')),
            )
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Keywords {
    fn default() -> Self {
        Self(DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect())
    }
}
