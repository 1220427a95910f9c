use bon::Builder;
use smol_str::SmolStr;
use thiserror::Error;
use url::Url;

use crate::scopes::{DEFAULT_SCOPES, Scope};
use crate::types::AppRegistrationParameters;

pub const DEFAULT_CLIENT_NAME: &str = "Celebi.social";
pub const DEFAULT_WEBSITE: &str = "http://localhost:8000";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:4000/oauth/callback";

#[derive(Error, Debug, miette::Diagnostic)]
pub enum ConfigError {
    #[error("`scopes` must not be empty")]
    #[diagnostic(
        code(celebi_oauth::config::empty_scopes),
        help("request at least `read`")
    )]
    EmptyScopes,
    #[error("`redirect_uri` must use http or https, got `{0}`")]
    #[diagnostic(code(celebi_oauth::config::redirect_scheme))]
    RedirectScheme(SmolStr),
    #[error("`redirect_uri` must not carry credentials")]
    #[diagnostic(code(celebi_oauth::config::redirect_credentials))]
    RedirectCredentials,
    #[error("`client_name` must not be empty")]
    #[diagnostic(code(celebi_oauth::config::empty_client_name))]
    EmptyClientName,
}

pub type Result<T> = core::result::Result<T, ConfigError>;

/// How this application presents itself to instances.
///
/// The same values are sent at registration time and on every authorization
/// request, so they must stay stable between the two halves of a login.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(start_fn = new)]
pub struct ClientConfig {
    /// Application name shown on the instance's consent screen
    #[builder(into, default = SmolStr::new_static(DEFAULT_CLIENT_NAME))]
    pub client_name: SmolStr,
    /// Application homepage
    #[builder(default = default_url(DEFAULT_WEBSITE))]
    pub website: Url,
    /// Where the instance sends the browser back to. Any query string or
    /// fragment is dropped when it is sent.
    #[builder(default = default_url(DEFAULT_REDIRECT_URI))]
    pub redirect_uri: Url,
    /// Requested permissions
    #[builder(default = default_scopes())]
    pub scopes: Vec<Scope>,
}

fn default_url(url: &str) -> Url {
    // constants above are valid URLs
    Url::parse(url).unwrap_or_else(|e| unreachable!("bad default url {url}: {e}"))
}

fn default_scopes() -> Vec<Scope> {
    Scope::parse_multiple(DEFAULT_SCOPES)
        .unwrap_or_else(|e| unreachable!("bad default scopes: {e}"))
}

/// The page URL without its query string or fragment.
pub fn landing_url(mut url: Url) -> Url {
    url.set_query(None);
    url.set_fragment(None);
    url
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new().build()
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(ConfigError::EmptyClientName);
        }
        if self.scopes.is_empty() {
            return Err(ConfigError::EmptyScopes);
        }
        let redirect = &self.redirect_uri;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(ConfigError::RedirectScheme(redirect.scheme().into()));
        }
        if !redirect.username().is_empty() || redirect.password().is_some() {
            return Err(ConfigError::RedirectCredentials);
        }
        Ok(())
    }

    /// Space-separated scope string sent to the instance.
    pub fn scope_string(&self) -> SmolStr {
        Scope::serialize_multiple(&self.scopes)
    }

    /// The redirect target as sent to the instance.
    pub fn redirect_target(&self) -> Url {
        landing_url(self.redirect_uri.clone())
    }

    pub fn redirect_uri_string(&self) -> SmolStr {
        SmolStr::new(self.redirect_target().as_str())
    }

    /// Same config, redirecting to `redirect_uri` instead.
    pub fn with_redirect_uri(&self, redirect_uri: Url) -> Self {
        Self {
            redirect_uri: landing_url(redirect_uri),
            ..self.clone()
        }
    }

    pub fn registration_parameters(&self) -> AppRegistrationParameters {
        AppRegistrationParameters {
            client_name: self.client_name.clone(),
            redirect_uris: self.redirect_uri_string(),
            scopes: self.scope_string(),
            website: SmolStr::new(self.website.as_str()),
        }
    }
}
