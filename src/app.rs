//! HTTP surface of the service.

pub mod api;

pub use api::{router, serve};
