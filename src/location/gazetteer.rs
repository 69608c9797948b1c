use lazy_static::lazy_static;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use super::TARGET_LOCATION;

#[derive(Error, Debug)]
pub enum GazetteerError {
    #[error("gazetteer contains no usable place names")]
    Empty,

    #[error("failed to compile pattern for '{name}': {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

// General places, planning areas and landmarks.
const GENERAL_LOCATIONS: &[&str] = &[
    "Orchard Road", "Marina Bay", "Sentosa", "Changi Airport", "Jurong East",
    "Jurong West", "Tampines", "Pasir Ris", "Woodlands", "Yishun", "Ang Mo Kio",
    "Bishan", "Toa Payoh", "Bukit Merah", "Queenstown", "Clementi", "Bukit Timah",
    "Novena", "Geylang", "Bedok", "Punggol", "Sengkang", "Hougang", "Serangoon",
    "Bukit Panjang", "Choa Chu Kang", "Tuas", "Pulau Ubin", "Tekong",
    "Raffles Place", "Tanjong Pagar", "City Hall", "Dhoby Ghaut", "Somerset",
    "Newton", "Stevens", "Botanic Gardens", "Holland Village", "Buona Vista",
    "Commonwealth", "Dover", "Outram Park", "HarbourFront", "Telok Blangah",
    "Labrador Park", "Pasir Panjang", "Haw Par Villa", "Kent Ridge", "one-north",
    "Singapore",
];

// 2025 electoral divisions (GRCs and SMCs) plus the bare names they are often cited by.
const ELECTORAL_DIVISIONS: &[&str] = &[
    "Aljunied", "Ang Mo Kio", "Bishan-Toa Payoh", "Chua Chu Kang", "East Coast",
    "Holland-Bukit Timah", "Jalan Besar", "Jurong-Clementi", "Marine Parade",
    "Marsiling-Yew Tee", "Nee Soon", "Pasir Ris-Punggol", "Sembawang", "Tampines",
    "Tanjong Pagar", "West Coast",
    "Bukit Batok", "Bukit Panjang", "Hong Kah North", "Hougang", "Kebun Baru",
    "MacPherson", "Marymount", "Mountbatten", "Pioneer", "Potong Pasir",
    "Punggol West", "Radin Mas", "Sengkang Central", "Yio Chu Kang", "Yuhua",
    "Jurong", "Clementi", "Marsiling", "Yew Tee", "Pasir Ris", "Sengkang",
];

// Alternative spellings mapped to the canonical gazetteer name.
const LOCATION_ALIASES: &[(&str, &str)] = &[
    ("Harbour Front", "HarbourFront"),
    ("one north", "one-north"),
    ("Orchard Rd", "Orchard Road"),
    ("Holland V", "Holland Village"),
    ("Pulau Tekong", "Tekong"),
    ("Changi International Airport", "Changi Airport"),
];

lazy_static! {
    static ref SINGAPORE_GAZETTEER: Gazetteer = {
        let entries = GENERAL_LOCATIONS
            .iter()
            .chain(ELECTORAL_DIVISIONS.iter())
            .map(|name| GazetteerEntry::new(name))
            .chain(
                LOCATION_ALIASES
                    .iter()
                    .map(|(alias, canonical)| GazetteerEntry::alias(alias, canonical)),
            )
            .collect();
        Gazetteer::from_entries_unchecked(entries)
    };
}

/// One recognizable surface form and the canonical place name it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GazetteerEntry {
    pub name: String,
    pub canonical: String,
}

impl GazetteerEntry {
    pub fn new(name: &str) -> Self {
        GazetteerEntry {
            name: name.trim().to_string(),
            canonical: name.trim().to_string(),
        }
    }

    pub fn alias(name: &str, canonical: &str) -> Self {
        GazetteerEntry {
            name: name.trim().to_string(),
            canonical: canonical.trim().to_string(),
        }
    }

    /// Entries must begin and end on a word character so that word-boundary matching holds.
    fn is_matchable(&self) -> bool {
        let mut chars = self.name.chars();
        match (chars.next(), self.name.chars().last()) {
            (Some(first), Some(last)) => first.is_alphanumeric() && last.is_alphanumeric(),
            _ => false,
        }
    }
}

/// Static mapping of known place names to canonical forms.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

impl Gazetteer {
    /// Builds a gazetteer, dropping duplicate and unmatchable names.
    pub fn new(entries: Vec<GazetteerEntry>) -> Result<Self, GazetteerError> {
        let gazetteer = Self::from_entries_unchecked(entries);
        if gazetteer.entries.is_empty() {
            return Err(GazetteerError::Empty);
        }
        Ok(gazetteer)
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, GazetteerError> {
        Self::new(
            names
                .iter()
                .map(|name| GazetteerEntry::new(name.as_ref()))
                .collect(),
        )
    }

    /// The built-in list of Singapore places and electoral divisions.
    pub fn singapore() -> Self {
        SINGAPORE_GAZETTEER.clone()
    }

    /// Adds configured names after the existing entries.
    pub fn with_extra_names<S: AsRef<str>>(self, names: &[S]) -> Self {
        let mut entries = self.entries;
        entries.extend(names.iter().map(|name| GazetteerEntry::new(name.as_ref())));
        Self::from_entries_unchecked(entries)
    }

    fn from_entries_unchecked(entries: Vec<GazetteerEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(entries.len());

        for entry in entries {
            if !entry.is_matchable() {
                if !entry.name.is_empty() {
                    warn!(
                        target: TARGET_LOCATION,
                        "Skipping gazetteer name '{}': must start and end with a letter or digit",
                        entry.name
                    );
                }
                continue;
            }
            if !seen.insert(fold_name(&entry.name)) {
                debug!(target: TARGET_LOCATION, "Dropping duplicate gazetteer name '{}'", entry.name);
                continue;
            }
            kept.push(entry);
        }

        Gazetteer { entries: kept }
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the canonical form of a surface name, ignoring case and spacing.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        let folded = fold_name(name);
        self.entries
            .iter()
            .find(|entry| fold_name(&entry.name) == folded)
            .map(|entry| entry.canonical.as_str())
    }
}

fn fold_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singapore_gazetteer_is_deduplicated() {
        let gazetteer = Gazetteer::singapore();
        assert!(!gazetteer.is_empty());

        let tampines = gazetteer
            .entries()
            .iter()
            .filter(|entry| entry.name == "Tampines")
            .count();
        assert_eq!(tampines, 1);
    }

    #[test]
    fn test_empty_gazetteer_is_rejected() {
        let names: [&str; 0] = [];
        assert!(matches!(
            Gazetteer::from_names(&names),
            Err(GazetteerError::Empty)
        ));
        assert!(matches!(
            Gazetteer::from_names(&["  ", "-"]),
            Err(GazetteerError::Empty)
        ));
    }

    #[test]
    fn test_aliases_resolve_to_canonical_names() {
        let gazetteer = Gazetteer::singapore();
        assert_eq!(gazetteer.canonical_name("harbour  front"), Some("HarbourFront"));
        assert_eq!(gazetteer.canonical_name("ONE NORTH"), Some("one-north"));
        assert_eq!(gazetteer.canonical_name("Bedok"), Some("Bedok"));
        assert_eq!(gazetteer.canonical_name("Atlantis"), None);
    }

    #[test]
    fn test_extra_names_are_appended() {
        let gazetteer = Gazetteer::from_names(&["Bishan"])
            .unwrap()
            .with_extra_names(&["Kranji".to_string(), "bishan".to_string()]);
        let names: Vec<_> = gazetteer.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bishan", "Kranji"]);
    }
}
