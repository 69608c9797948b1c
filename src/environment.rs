use std::str::FromStr;
use tracing::warn;

/// Splits a list-valued variable on `delimiter`, trimming items and dropping empty ones.
pub fn split_list(value: &str, delimiter: char) -> Vec<String> {
    value
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses `value`, falling back to `default` with a warning when it does not parse.
pub fn parse_or_default<T>(var: &str, value: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match value.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!("Invalid value '{}' for {}, using default {}", value, var, default);
            default
        }
    }
}
