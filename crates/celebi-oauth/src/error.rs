use celebi_common::store::StoreError;
use celebi_common::types::instance::InstanceError;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::request::{RequestError, RequestErrorKind};

/// Errors emitted by the login flow.
#[derive(Debug, Error, Diagnostic)]
pub enum OAuthError {
    /// Malformed or empty server identifier
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidInstance(#[from] InstanceError),
    /// Registration, authorization URL or token exchange failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Request(#[from] RequestError),
    /// The landing URL could not be matched to a login in progress
    #[error(transparent)]
    #[diagnostic(transparent)]
    Callback(#[from] CallbackError),
    /// Writing to one of the stores failed
    #[error(transparent)]
    #[diagnostic(code(celebi_oauth::store))]
    Store(#[from] StoreError),
    /// Client configuration rejected
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] crate::config::ConfigError),
    /// URL error
    #[error(transparent)]
    #[diagnostic(code(celebi_oauth::url))]
    Url(#[from] url::ParseError),
    /// Form encoding error
    #[error(transparent)]
    #[diagnostic(code(celebi_oauth::url_encoding))]
    UrlEncoding(#[from] serde_html_form::ser::Error),
}

impl OAuthError {
    /// The request error kind, when this is a request failure.
    pub fn request_kind(&self) -> Option<&RequestErrorKind> {
        match self {
            OAuthError::Request(e) => Some(e.kind()),
            _ => None,
        }
    }

    pub fn is_registration_failed(&self) -> bool {
        matches!(
            self.request_kind(),
            Some(RequestErrorKind::RegistrationFailed)
        )
    }

    pub fn is_token_exchange_failed(&self) -> bool {
        matches!(
            self.request_kind(),
            Some(RequestErrorKind::TokenExchangeFailed)
        )
    }
}

/// Errors from completing a login on the landing page.
#[derive(Debug, Error, Diagnostic)]
pub enum CallbackError {
    /// No login was started from this store
    #[error("no login in progress: the instance was never recorded")]
    #[diagnostic(
        code(celebi_oauth::callback::no_instance),
        help("start the login again from the same application")
    )]
    MissingInstance,
    /// The instance was recorded but its app registration is gone
    #[error("no app registration found for {0}")]
    #[diagnostic(
        code(celebi_oauth::callback::no_registration),
        help("start the login again; the app will be registered afresh")
    )]
    MissingRegistration(SmolStr),
    /// The instance redirected back with an error instead of a code
    #[error("authorization was not granted: {error}")]
    #[diagnostic(code(celebi_oauth::callback::denied))]
    Denied {
        error: SmolStr,
        description: Option<SmolStr>,
    },
    /// The local callback server could not be started
    #[error("could not start the callback server: {0}")]
    #[diagnostic(
        code(celebi_oauth::callback::server),
        help("pick another port or close whatever is listening on it")
    )]
    Server(SmolStr),
    /// The app was registered with a different redirect URI
    #[error("{requested} is not a registered redirect for this app (registered: {registered})")]
    #[diagnostic(
        code(celebi_oauth::callback::redirect_mismatch),
        help("listen on the port the app was registered with")
    )]
    RedirectMismatch {
        registered: SmolStr,
        requested: SmolStr,
    },
    /// The loopback server never saw the redirect
    #[error("timed out waiting for the authorization redirect")]
    #[diagnostic(
        code(celebi_oauth::callback::timeout),
        help("finish logging in within the browser before the timeout")
    )]
    Timeout,
}

pub type Result<T> = core::result::Result<T, OAuthError>;
