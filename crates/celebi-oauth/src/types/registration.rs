use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Form body of `POST /api/v1/apps`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppRegistrationParameters {
    pub client_name: SmolStr,
    pub redirect_uris: SmolStr,
    pub scopes: SmolStr,
    pub website: SmolStr,
}

/// Credentials issued by an instance's app registration endpoint.
///
/// Whatever else the server returned (name, vapid key, redirect uris...) is
/// kept in `extra` so the record round-trips unchanged.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClientRegistration {
    pub client_id: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SmolStr>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClientRegistration {
    /// Validate a raw registration record. `None` unless it is an object
    /// with a non-empty string `client_id`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let registration: Self = serde_json::from_value(value.clone()).ok()?;
        registration.is_usable().then_some(registration)
    }

    /// Whether the record carries a client id to authorize with.
    pub fn is_usable(&self) -> bool {
        !self.client_id.trim().is_empty()
    }

    /// Redirect URIs the instance recorded for this app, from `redirect_uri`
    /// (whitespace separated) or `redirect_uris`. Empty when the server did
    /// not echo them back.
    pub fn redirect_uris(&self) -> Vec<&str> {
        let mut uris = Vec::new();
        for key in ["redirect_uri", "redirect_uris"] {
            match self.extra.get(key) {
                Some(Value::String(s)) => uris.extend(s.split_whitespace()),
                Some(Value::Array(items)) => {
                    uris.extend(items.iter().filter_map(Value::as_str));
                }
                _ => {}
            }
        }
        uris.sort_unstable();
        uris.dedup();
        uris
    }

    /// Client secret, ignoring an empty string.
    pub fn secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}
