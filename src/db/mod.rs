//! SQLite persistence for settled geocoding results.

pub mod core;
mod geocode;
mod schema;

pub use self::core::Database;
