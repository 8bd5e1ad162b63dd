pub mod billing;
pub mod config;
pub mod error;
pub mod extractor;
pub mod platform;
pub mod routes;
pub mod usage;

pub use platform::{Platform, UnsupportedPlatform};
pub use routes::api_routes;
