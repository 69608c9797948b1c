//! RSS feed processing module.
//!
//! This module fetches RSS/Atom feeds and HTML listing pages and turns them into articles.

mod client;
mod html;
mod parser;
mod source;
mod types;
mod util;

// Re-export types
pub use self::types::*;

pub use self::client::{create_http_client, fetch_feed_body};
pub use self::html::parse_html_page;
pub use self::parser::parse_feed;
pub use self::source::{ArticleSource, FeedSource};
pub use self::util::*;
