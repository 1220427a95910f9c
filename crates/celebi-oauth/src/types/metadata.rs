use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Authorization server metadata as served from
/// `/.well-known/oauth-authorization-server`.
///
/// Instances only fill in part of RFC 8414, so every field is optional and
/// unknown fields are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OAuthAuthorizationServerMetadata {
    // https://datatracker.ietf.org/doc/html/rfc8414#section-2
    pub issuer: Option<SmolStr>,
    pub authorization_endpoint: Option<SmolStr>,
    pub token_endpoint: Option<SmolStr>,
    pub revocation_endpoint: Option<SmolStr>,
    pub registration_endpoint: Option<SmolStr>,
    pub userinfo_endpoint: Option<SmolStr>,
    pub service_documentation: Option<SmolStr>,
    pub app_registration_endpoint: Option<SmolStr>,
    pub scopes_supported: Option<Vec<SmolStr>>,
    pub response_types_supported: Option<Vec<SmolStr>>,
    pub response_modes_supported: Option<Vec<SmolStr>>,
    pub grant_types_supported: Option<Vec<SmolStr>>,
    pub token_endpoint_auth_methods_supported: Option<Vec<SmolStr>>,
    // https://datatracker.ietf.org/doc/html/rfc7636#section-4.3
    pub code_challenge_methods_supported: Option<Vec<SmolStr>>,
}

impl OAuthAuthorizationServerMetadata {
    /// Whether the server advertises the `S256` PKCE method.
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .as_ref()
            .is_some_and(|methods| methods.iter().any(|m| m == "S256"))
    }
}
