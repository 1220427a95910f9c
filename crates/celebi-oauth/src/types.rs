mod metadata;
mod registration;
mod request;
mod response;

pub use self::metadata::*;
pub use self::registration::*;
pub use self::request::*;
pub use self::response::*;

use serde::Deserialize;
use smol_str::SmolStr;

/// Options for [`start_auth`](crate::client::OAuthClient::start_auth).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorizeOptions {
    /// Ask the instance to show its login form even when the user already
    /// has a session there (`force_login=true`).
    pub force_login: bool,
}

/// Query parameters of the landing URL after the instance redirects back.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<SmolStr>,
    pub error: Option<SmolStr>,
    pub error_description: Option<SmolStr>,
}

impl CallbackParams {
    /// Extract the callback parameters from a landing URL. Unknown or
    /// malformed parameters are ignored.
    pub fn from_url(url: &url::Url) -> Self {
        let mut params = Self {
            code: None,
            error: None,
            error_description: None,
        };
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(SmolStr::new(value));
            }
        }
        params
    }
}
