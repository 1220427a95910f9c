//! OAuth 2 login against fediverse instances: dynamic app registration,
//! optional PKCE, and a flow split across a redirect.
//! Transport and storage backends live in `celebi-common`.

pub mod authstore;
pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod registrar;
pub mod request;
pub mod resolver;
pub mod scopes;
pub mod session;
pub mod types;
pub mod utils;

#[cfg(all(feature = "loopback", not(target_arch = "wasm32")))]
pub mod loopback;
