//! # Celebi
//!
//! Log in to any self-hosted fediverse instance with OAuth 2.
//!
//! The app registers itself with the instance the first time it is used
//! there (`POST /api/v1/apps`) and caches the credentials. If the instance
//! advertises PKCE (S256) in its authorization server metadata, the login is
//! bound to a verifier that never leaves the client. The flow is split across
//! the browser redirect: [`start_auth`](oauth::client::OAuthClient::start_auth)
//! and [`callback`](oauth::client::OAuthClient::callback) only share what is
//! in the two stores, so they can run in different processes.
//!
//! ## Example
//!
//! ```no_run
//! use celebi::credentials::Credentials;
//! use celebi::oauth::client::OAuthClient;
//! use celebi::oauth::config::ClientConfig;
//! use celebi::store::{FileStore, MemoryStore};
//! # async fn demo() -> miette::Result<()> {
//! let oauth = OAuthClient::new(
//!     reqwest::Client::new(),
//!     FileStore::new("/tmp/celebi-store.json")?,
//!     MemoryStore::new(),
//!     ClientConfig::default(),
//! )?;
//!
//! let redirect = oauth
//!     .start_auth("@alice@mastodon.social", Default::default())
//!     .await?;
//! println!("visit {}", redirect.url);
//!
//! // ...later, with the `code` from the landing page
//! let session = oauth.callback("the-code").await?;
//! let request = session
//!     .authorized_get("timelines/home")
//!     .map_err(|e| miette::miette!("{e}"))?;
//! # let _ = request;
//! # Ok(())
//! # }
//! ```

pub mod credentials;

pub use celebi_common as common;
pub use celebi_common::Instance;
pub use celebi_common::store;
pub use celebi_common::{smol_str, url};

/// OAuth flow, stores and configuration.
pub use celebi_oauth as oauth;
pub use celebi_oauth::session::Session;
