use regex::Regex;
use tracing::debug;

use super::gazetteer::{Gazetteer, GazetteerError};
use super::TARGET_LOCATION;
use crate::article::Article;

/// An article paired with the single place name chosen for it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationMatch {
    pub article: Article,
    pub location_name: String,
}

struct CompiledEntry {
    pattern: Regex,
    name_len: usize,
    canonical: String,
}

/// Scans article text for gazetteer names.
pub struct LocationExtractor {
    entries: Vec<CompiledEntry>,
}

impl LocationExtractor {
    pub fn new(gazetteer: &Gazetteer) -> Result<Self, GazetteerError> {
        if gazetteer.is_empty() {
            return Err(GazetteerError::Empty);
        }

        let entries = gazetteer
            .entries()
            .iter()
            .map(|entry| {
                // Words may be separated by any run of whitespace in the article text.
                let body = entry
                    .name
                    .split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+");
                let pattern = Regex::new(&format!(r"(?i)\b{}\b", body)).map_err(|source| {
                    GazetteerError::Pattern {
                        name: entry.name.clone(),
                        source,
                    }
                })?;
                Ok(CompiledEntry {
                    pattern,
                    name_len: entry.name.chars().count(),
                    canonical: entry.canonical.clone(),
                })
            })
            .collect::<Result<Vec<_>, GazetteerError>>()?;

        Ok(LocationExtractor { entries })
    }

    /// Picks the most specific place name mentioned in `text`.
    ///
    /// The longest matching name wins so that "Bishan-Toa Payoh" is preferred over "Bishan";
    /// equal lengths fall back to the earliest position in the text, then gazetteer order.
    pub fn find_location(&self, text: &str) -> Option<&str> {
        let mut best: Option<(usize, usize, &CompiledEntry)> = None;

        for entry in &self.entries {
            let Some(found) = entry.pattern.find(text) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((len, start, _)) => {
                    entry.name_len > len || (entry.name_len == len && found.start() < start)
                }
            };
            if better {
                best = Some((entry.name_len, found.start(), entry));
            }
        }

        best.map(|(_, _, entry)| entry.canonical.as_str())
    }

    /// Annotates an article with its location, or returns `None` when it mentions no known place.
    pub fn extract(&self, article: Article) -> Option<LocationMatch> {
        if !article.is_usable() {
            debug!(target: TARGET_LOCATION, "Skipping article without title or url");
            return None;
        }

        let location_name = self.find_location(&article.search_text())?.to_string();
        debug!(
            target: TARGET_LOCATION,
            "Matched '{}' in article '{}'", location_name, article.title
        );

        Some(LocationMatch {
            article,
            location_name,
        })
    }
}
