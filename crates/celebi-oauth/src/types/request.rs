use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationResponseType {
    Code,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationCodeChallengeMethod {
    S256,
}

/// Query string of `GET /oauth/authorize`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationParameters {
    // https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.1
    pub client_id: SmolStr,
    pub response_type: AuthorizationResponseType,
    pub scope: SmolStr,
    pub redirect_uri: SmolStr,
    // https://datatracker.ietf.org/doc/html/rfc7636#section-4.3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<AuthorizationCodeChallengeMethod>,
    // instance extension: show the login form even with an existing session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_login: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenGrantType {
    AuthorizationCode,
}

/// Form body of `POST /oauth/token`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenRequestParameters {
    // https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.3
    pub client_id: SmolStr,
    pub redirect_uri: SmolStr,
    pub grant_type: TokenGrantType,
    pub code: SmolStr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SmolStr>,
    // https://datatracker.ietf.org/doc/html/rfc7636#section-4.5
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<SmolStr>,
}

impl std::fmt::Debug for TokenRequestParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequestParameters")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("grant_type", &self.grant_type)
            .field("has_client_secret", &self.client_secret.is_some())
            .field("has_code_verifier", &self.code_verifier.is_some())
            .finish_non_exhaustive()
    }
}
