use std::future::Future;
use std::sync::Arc;

use celebi_common::Instance;
use celebi_common::error::TransportError;
use celebi_common::http_client::HttpClient;
use http::{Request, StatusCode};

use crate::types::OAuthAuthorizationServerMetadata;

pub const AUTHORIZATION_SERVER_METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

#[derive(thiserror::Error, Debug, miette::Diagnostic)]
pub enum ResolverError {
    #[error(transparent)]
    #[diagnostic(code(celebi_oauth::resolver::transport))]
    Transport(#[from] TransportError),
    #[error("http status: {0:?}")]
    #[diagnostic(
        code(celebi_oauth::resolver::http_status),
        help("older instances do not serve authorization server metadata")
    )]
    HttpStatus(StatusCode),
    #[error(transparent)]
    #[diagnostic(code(celebi_oauth::resolver::serde_json))]
    SerdeJson(#[from] serde_json::Error),
}

async fn get_authorization_server_metadata_impl<T: HttpClient + Sync + ?Sized>(
    client: &T,
    instance: &Instance,
) -> Result<OAuthAuthorizationServerMetadata, ResolverError> {
    resolve_authorization_server(client, instance).await
}

async fn supports_pkce_impl<T: OAuthResolver + Sync + ?Sized>(
    resolver: &T,
    instance: &Instance,
) -> bool {
    match resolver.get_authorization_server_metadata(instance).await {
        Ok(metadata) => metadata.supports_s256(),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(%instance, error = %_e, "metadata probe failed, not using PKCE");
            false
        }
    }
}

/// Server capability discovery for an instance.
#[cfg_attr(not(target_arch = "wasm32"), trait_variant::make(Send))]
pub trait OAuthResolver: HttpClient {
    /// Fetch `/.well-known/oauth-authorization-server`.
    fn get_authorization_server_metadata(
        &self,
        instance: &Instance,
    ) -> impl Future<Output = Result<OAuthAuthorizationServerMetadata, ResolverError>>
    where
        Self: Sync,
    {
        get_authorization_server_metadata_impl(self, instance)
    }

    /// Whether the instance advertises S256 PKCE.
    ///
    /// Any failure (network, non-200, undecodable body) reads as `false`.
    fn supports_pkce(&self, instance: &Instance) -> impl Future<Output = bool>
    where
        Self: Sync,
    {
        supports_pkce_impl(self, instance)
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(%instance)))]
pub async fn resolve_authorization_server<T: HttpClient + ?Sized>(
    client: &T,
    instance: &Instance,
) -> Result<OAuthAuthorizationServerMetadata, ResolverError> {
    let url = instance.endpoint(AUTHORIZATION_SERVER_METADATA_PATH);

    let req = Request::builder()
        .uri(url.as_str())
        .header(http::header::ACCEPT, "application/json")
        .body(Vec::new())
        .map_err(|e| ResolverError::Transport(TransportError::InvalidRequest(e.to_string())))?;
    let res = client
        .send_http(req)
        .await
        .map_err(|e| ResolverError::Transport(TransportError::other(e)))?;
    if res.status() == StatusCode::OK {
        Ok(serde_json::from_slice::<OAuthAuthorizationServerMetadata>(
            res.body(),
        )?)
    } else {
        Err(ResolverError::HttpStatus(res.status()))
    }
}

impl OAuthResolver for reqwest::Client {}

#[cfg(not(target_arch = "wasm32"))]
impl<T: OAuthResolver + Sync + Send> OAuthResolver for Arc<T> {
    async fn get_authorization_server_metadata(
        &self,
        instance: &Instance,
    ) -> Result<OAuthAuthorizationServerMetadata, ResolverError> {
        self.as_ref()
            .get_authorization_server_metadata(instance)
            .await
    }

    async fn supports_pkce(&self, instance: &Instance) -> bool {
        self.as_ref().supports_pkce(instance).await
    }
}
