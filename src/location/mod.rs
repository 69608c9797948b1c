//! Place-name recognition for article text.
//!
//! The gazetteer holds the fixed list of recognized place names and their canonical forms;
//! the extractor scans article text for those names.

pub mod extraction;
pub mod gazetteer;

pub use extraction::{LocationExtractor, LocationMatch};
pub use gazetteer::{Gazetteer, GazetteerEntry, GazetteerError};

pub const TARGET_LOCATION: &str = "location";
