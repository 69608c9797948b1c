use unicode_normalization::UnicodeNormalization;

/// Cache key for a place name: Unicode-compatible, case-folded, single-spaced.
pub fn normalize_location_key(name: &str) -> String {
    name.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display form used in the outgoing query: trimmed and single-spaced, case kept.
pub fn collapse_whitespace(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}
