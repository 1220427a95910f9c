use celebi_common::Instance;
use celebi_common::store::{KeyValueStore, StoreError};
use serde_json::Value;
use smol_str::{SmolStr, format_smolstr};

use crate::session::{AuthRequestData, Session};
use crate::types::ClientRegistration;

/// Instance the current login was started against.
pub const INSTANCE_URL_KEY: &str = "instanceURL";
/// Access token of the active session.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Instance the active session belongs to.
pub const CURRENT_INSTANCE_KEY: &str = "currentInstance";
/// PKCE verifier, ephemeral store only.
pub const CODE_VERIFIER_KEY: &str = "codeVerifier";

/// Key of the cached app registration for `instance`.
pub fn registration_key(instance: &Instance) -> SmolStr {
    format_smolstr!("app_{instance}")
}

/// Typed access to the two stores the login flow is split across.
///
/// `persistent` holds the instance, registrations and the session.
/// `ephemeral` only carries the verifier across the redirect.
#[derive(Debug, Clone)]
pub struct FlowStore<P, E> {
    persistent: P,
    ephemeral: E,
}

fn as_string(value: Value) -> Option<SmolStr> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.into()),
        _ => None,
    }
}

impl<P, E> FlowStore<P, E>
where
    P: KeyValueStore + Sync,
    E: KeyValueStore + Sync,
{
    pub fn new(persistent: P, ephemeral: E) -> Self {
        Self {
            persistent,
            ephemeral,
        }
    }

    pub fn persistent(&self) -> &P {
        &self.persistent
    }

    pub fn ephemeral(&self) -> &E {
        &self.ephemeral
    }

    pub async fn set_instance(&self, instance: &Instance) -> Result<(), StoreError> {
        self.persistent
            .set(INSTANCE_URL_KEY, Value::String(instance.to_string()))
            .await
    }

    /// The instance a login was started against. A value that no longer
    /// normalizes cleanly reads as absent.
    pub async fn instance(&self) -> Option<Instance> {
        let value = self.persistent.get(INSTANCE_URL_KEY).await?;
        serde_json::from_value(value).ok()
    }

    /// Raw registration record for `instance`, exactly as the server sent it.
    pub async fn raw_registration(&self, instance: &Instance) -> Option<Value> {
        self.persistent.get(&registration_key(instance)).await
    }

    /// Cached registration, if present and carrying a client id.
    pub async fn registration(&self, instance: &Instance) -> Option<ClientRegistration> {
        let value = self.raw_registration(instance).await?;
        ClientRegistration::from_value(&value)
    }

    pub async fn save_registration(
        &self,
        instance: &Instance,
        raw: Value,
    ) -> Result<(), StoreError> {
        self.persistent.set(&registration_key(instance), raw).await
    }

    pub async fn save_verifier(&self, verifier: &str) -> Result<(), StoreError> {
        self.ephemeral
            .set(CODE_VERIFIER_KEY, Value::String(verifier.to_owned()))
            .await
    }

    pub async fn verifier(&self) -> Option<SmolStr> {
        self.ephemeral.get(CODE_VERIFIER_KEY).await.and_then(as_string)
    }

    pub async fn delete_verifier(&self) -> Result<(), StoreError> {
        self.ephemeral.remove(CODE_VERIFIER_KEY).await
    }

    /// Everything needed to finish a login, as left behind by `start_auth`.
    ///
    /// `Err` carries the instance when only the registration is missing.
    pub async fn load_auth_request(&self) -> Result<AuthRequestData, Option<Instance>> {
        let instance = self.instance().await.ok_or(None)?;
        let Some(registration) = self.registration(&instance).await else {
            return Err(Some(instance));
        };
        let verifier = self.verifier().await;
        Ok(AuthRequestData {
            instance,
            registration,
            verifier,
        })
    }

    /// `currentInstance` is written before `accessToken`, so a failed second
    /// write never leaves a token that reads as logged in.
    pub async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.persistent
            .set(
                CURRENT_INSTANCE_KEY,
                Value::String(session.instance_url.to_string()),
            )
            .await?;
        self.persistent
            .set(
                ACCESS_TOKEN_KEY,
                Value::String(session.access_token.to_string()),
            )
            .await
    }

    pub async fn access_token(&self) -> Option<SmolStr> {
        self.persistent
            .get(ACCESS_TOKEN_KEY)
            .await
            .and_then(as_string)
    }

    pub async fn current_instance(&self) -> Option<Instance> {
        let value = self.persistent.get(CURRENT_INSTANCE_KEY).await?;
        serde_json::from_value(value).ok()
    }

    /// The active session, when both halves are present.
    pub async fn session(&self) -> Option<Session> {
        let access_token = self.access_token().await?;
        let instance_url = self.current_instance().await?;
        Some(Session {
            instance_url,
            access_token,
        })
    }

    /// Drop the session and any verifier left from an unfinished login.
    /// Cached registrations are kept.
    pub async fn clear_session(&self) -> Result<(), StoreError> {
        self.persistent.remove(ACCESS_TOKEN_KEY).await?;
        self.persistent.remove(CURRENT_INSTANCE_KEY).await?;
        self.ephemeral.remove(CODE_VERIFIER_KEY).await
    }
}
