use celebi_common::Instance;
use celebi_common::http_client::HttpClient;
use http::{Method, Request, StatusCode};
use smol_str::{SmolStr, format_smolstr};
use url::Url;

use crate::{
    config::ClientConfig,
    types::{
        AuthorizationCodeChallengeMethod, AuthorizationParameters, AuthorizationResponseType,
        AuthorizeOptions, ClientRegistration, OAuthTokenResponse, TokenGrantType,
        TokenRequestParameters,
    },
    utils::PkceChallenge,
};

pub const AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const TOKEN_PATH: &str = "/oauth/token";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error talking to an instance's app registration or OAuth endpoints
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{kind}")]
pub struct RequestError {
    #[diagnostic_source]
    kind: RequestErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<SmolStr>,
    context: Option<SmolStr>,
    url: Option<SmolStr>,
    details: Option<SmolStr>,
}

/// Error categories for instance requests
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RequestErrorKind {
    /// App registration endpoint unreachable or its response unusable
    #[error("app registration failed")]
    #[diagnostic(
        code(celebi_oauth::request::registration_failed),
        help("check the instance address and that it allows new applications")
    )]
    RegistrationFailed,

    /// Token endpoint unreachable or no access token returned
    #[error("token exchange failed")]
    #[diagnostic(
        code(celebi_oauth::request::token_exchange_failed),
        help("authorization codes are single use; start the login again")
    )]
    TokenExchangeFailed,

    /// The registration cannot be used to authorize
    #[error("invalid app registration: empty client id")]
    #[diagnostic(code(celebi_oauth::request::invalid_registration))]
    InvalidRegistration,

    /// HTTP build error
    #[error("http build error")]
    #[diagnostic(code(celebi_oauth::request::http_build))]
    HttpBuild,

    /// Form serialization error
    #[error("form serialization error")]
    #[diagnostic(code(celebi_oauth::request::serde_form))]
    SerdeHtmlForm,
}

impl RequestError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: RequestErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
            url: None,
            details: None,
        }
    }

    pub fn kind(&self) -> &RequestErrorKind {
        &self.kind
    }

    pub fn source_err(&self) -> Option<&BoxError> {
        self.source.as_ref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn request_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn with_help(mut self, help: impl Into<SmolStr>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<SmolStr>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<SmolStr>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<SmolStr>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn registration_failed(source: Option<BoxError>) -> Self {
        Self::new(RequestErrorKind::RegistrationFailed, source)
    }

    pub fn token_exchange_failed(source: Option<BoxError>) -> Self {
        Self::new(RequestErrorKind::TokenExchangeFailed, source)
    }

    pub fn invalid_registration() -> Self {
        Self::new(RequestErrorKind::InvalidRegistration, None)
    }

    pub fn http_build(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(RequestErrorKind::HttpBuild, Some(Box::new(source)))
    }
}

impl From<http::Error> for RequestError {
    fn from(e: http::Error) -> Self {
        let msg = format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::HttpBuild, Some(Box::new(e)))
            .with_context(msg)
            .with_help("verify request URIs and headers are valid")
    }
}

impl From<serde_html_form::ser::Error> for RequestError {
    fn from(e: serde_html_form::ser::Error) -> Self {
        let msg = format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::SerdeHtmlForm, Some(Box::new(e)))
            .with_context(msg)
            .with_help("check request parameters are serializable")
    }
}

pub type Result<T> = core::result::Result<T, RequestError>;

/// Short printable excerpt of a response body for error details.
pub(crate) fn body_excerpt(status: StatusCode, body: &[u8]) -> SmolStr {
    const MAX: usize = 256;
    let text = String::from_utf8_lossy(body);
    let mut end = text.len().min(MAX);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format_smolstr!("status {status}: {}", &text[..end])
}

/// Build a form-encoded `POST` to `url`.
pub(crate) fn form_post<S: serde::Serialize>(url: &Url, form: &S) -> Result<Request<Vec<u8>>> {
    let body = serde_html_form::to_string(form)?;
    Ok(Request::builder()
        .uri(url.as_str())
        .method(Method::POST)
        .header(http::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
        .header(http::header::ACCEPT, "application/json")
        .body(body.into_bytes())?)
}

/// The URL to send the browser to, and the verifier to keep until the
/// callback when PKCE is in use.
///
/// No I/O happens here.
pub fn build_authorization_url(
    instance: &Instance,
    registration: &ClientRegistration,
    config: &ClientConfig,
    pkce: Option<&PkceChallenge>,
    options: AuthorizeOptions,
) -> Result<(Url, Option<SmolStr>)> {
    if !registration.is_usable() {
        return Err(RequestError::invalid_registration().with_context(format_smolstr!(
            "registration for {instance} has no client id"
        )));
    }
    let parameters = AuthorizationParameters {
        client_id: registration.client_id.clone(),
        response_type: AuthorizationResponseType::Code,
        scope: config.scope_string(),
        redirect_uri: config.redirect_uri_string(),
        code_challenge: pkce.map(|p| p.challenge.clone()),
        code_challenge_method: pkce.map(|_| AuthorizationCodeChallengeMethod::S256),
        force_login: options.force_login.then_some(true),
    };
    let mut url = instance.endpoint(AUTHORIZE_PATH);
    url.set_query(Some(&serde_html_form::to_string(&parameters)?));
    Ok((url, pkce.map(|p| p.verifier.clone())))
}

/// Trade an authorization code for an access token.
///
/// One attempt only. Any transport failure, undecodable body or response
/// without a non-empty `access_token` is a `TokenExchangeFailed`.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(%instance, pkce = verifier.is_some())))]
pub async fn exchange_code<T>(
    client: &T,
    instance: &Instance,
    config: &ClientConfig,
    registration: &ClientRegistration,
    code: &str,
    verifier: Option<&str>,
) -> Result<SmolStr>
where
    T: HttpClient + ?Sized,
{
    if !registration.is_usable() {
        return Err(RequestError::invalid_registration());
    }
    let url = instance.endpoint(TOKEN_PATH);
    let parameters = TokenRequestParameters {
        client_id: registration.client_id.clone(),
        redirect_uri: config.redirect_uri_string(),
        grant_type: TokenGrantType::AuthorizationCode,
        code: code.into(),
        client_secret: registration.secret().map(SmolStr::new),
        code_verifier: verifier.map(SmolStr::new),
    };
    let req = form_post(&url, &parameters)?;
    let res = client.send_http(req).await.map_err(|e| {
        RequestError::token_exchange_failed(Some(Box::new(e))).with_url(url.as_str())
    })?;

    let status = res.status();
    let token = serde_json::from_slice::<OAuthTokenResponse>(res.body())
        .map_err(|e| {
            RequestError::token_exchange_failed(Some(Box::new(e)))
                .with_context("token response is not JSON")
        })
        .and_then(|response| {
            response.access_token().cloned().ok_or_else(|| {
                let context = response
                    .error_description
                    .clone()
                    .or_else(|| response.error.clone())
                    .unwrap_or_else(|| SmolStr::new_static("no access_token in response"));
                RequestError::token_exchange_failed(None).with_context(context)
            })
        })
        .map_err(|e| {
            e.with_url(url.as_str())
                .with_details(body_excerpt(status, res.body()))
        })?;

    #[cfg(feature = "tracing")]
    tracing::debug!(%status, "token exchange succeeded");
    Ok(token)
}
