use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

// https://datatracker.ietf.org/doc/html/rfc6749#section-5.1
//
// Everything is optional here so that a body without `access_token` can still
// be parsed and reported as a failed exchange instead of a decode error.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OAuthTokenResponse {
    pub access_token: Option<SmolStr>,
    pub token_type: Option<SmolStr>,
    pub scope: Option<SmolStr>,
    pub created_at: Option<i64>,
    // https://datatracker.ietf.org/doc/html/rfc6749#section-5.2
    pub error: Option<SmolStr>,
    pub error_description: Option<SmolStr>,
}

impl OAuthTokenResponse {
    /// The access token, ignoring an empty string.
    pub fn access_token(&self) -> Option<&SmolStr> {
        self.access_token.as_ref().filter(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("has_access_token", &self.access_token.is_some())
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("created_at", &self.created_at)
            .field("error", &self.error)
            .field("error_description", &self.error_description)
            .finish()
    }
}
