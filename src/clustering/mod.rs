// Module declarations
pub mod builder;
pub mod types;

pub use builder::build_clusters;
pub use types::*;
