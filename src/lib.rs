pub mod app;
pub mod article;
pub mod clustering;
pub mod config;
pub mod constituency;
pub mod db;
pub mod environment;
pub mod geocode;
pub mod location;
pub mod logging;
pub mod pipeline;
pub mod rss;

pub use article::Article;
pub use clustering::Cluster;
pub use geocode::GeoPoint;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_GEOCODE: &str = "geocode";
pub const TARGET_BOUNDARY: &str = "boundary";
pub const TARGET_PIPELINE: &str = "pipeline";
pub const TARGET_DB: &str = "db_query";
