use celebi_common::Instance;
use celebi_common::http_client::HttpClient;
use celebi_common::store::KeyValueStore;
use serde_json::Value;

use crate::authstore::FlowStore;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::request::{RequestError, body_excerpt, form_post};
use crate::types::ClientRegistration;

pub const APPS_PATH: &str = "/api/v1/apps";

/// Register this application with `instance`.
///
/// Returns the validated registration and the response body exactly as the
/// server sent it, so it can be cached without loss.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(%instance)))]
pub async fn register_application<T>(
    client: &T,
    instance: &Instance,
    config: &ClientConfig,
) -> core::result::Result<(ClientRegistration, Value), RequestError>
where
    T: HttpClient + ?Sized,
{
    let url = instance.endpoint(APPS_PATH);
    let req = form_post(&url, &config.registration_parameters())?;
    let res = client.send_http(req).await.map_err(|e| {
        RequestError::registration_failed(Some(Box::new(e)))
            .with_url(url.as_str())
            .with_context("instance unreachable")
    })?;

    let status = res.status();
    let raw: Value = serde_json::from_slice(res.body()).map_err(|e| {
        RequestError::registration_failed(Some(Box::new(e)))
            .with_url(url.as_str())
            .with_context("registration response is not JSON")
            .with_details(body_excerpt(status, res.body()))
    })?;
    let Some(registration) = ClientRegistration::from_value(&raw) else {
        return Err(RequestError::registration_failed(None)
            .with_url(url.as_str())
            .with_context("registration response has no client_id")
            .with_details(body_excerpt(status, res.body())));
    };
    Ok((registration, raw))
}

/// The cached registration for `instance`, registering first if there is
/// none or the cached one has no client id.
///
/// A usable cached registration is returned without any network traffic. On
/// failure the cache is left as it was.
pub async fn register_or_get_cached<T, P, E>(
    client: &T,
    store: &FlowStore<P, E>,
    instance: &Instance,
    config: &ClientConfig,
) -> Result<ClientRegistration>
where
    T: HttpClient + ?Sized,
    P: KeyValueStore + Sync,
    E: KeyValueStore + Sync,
{
    if let Some(registration) = store.registration(instance).await {
        #[cfg(feature = "tracing")]
        tracing::debug!(%instance, "reusing cached app registration");
        return Ok(registration);
    }
    let (registration, raw) = register_application(client, instance, config).await?;
    store.save_registration(instance, raw).await?;
    Ok(registration)
}
