//! Common types for the Celebi fediverse login client

#![warn(missing_docs)]
pub use smol_str;
pub use url;

pub mod error;
/// HTTP client abstraction used by celebi crates.
pub mod http_client;
/// Key/value storage traits and backends.
pub mod store;
/// Baseline data types shared across crates.
pub mod types;

pub use types::instance::Instance;
