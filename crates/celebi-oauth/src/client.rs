use std::sync::Arc;

use celebi_common::Instance;
use celebi_common::store::KeyValueStore;
use smol_str::SmolStr;
use url::Url;

use crate::{
    authstore::FlowStore,
    config::{ClientConfig, landing_url},
    error::{CallbackError, Result},
    location::Location,
    registrar::register_or_get_cached,
    request::{build_authorization_url, exchange_code},
    resolver::OAuthResolver,
    session::{FlowState, Session},
    types::{AuthorizeOptions, CallbackParams},
    utils::PkceChallenge,
};

/// Where to send the browser to finish logging in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRedirect {
    pub url: Url,
    pub instance: Instance,
    /// Whether a verifier was stored for the callback.
    pub pkce: bool,
}

/// Drives the login flow against a fediverse instance.
///
/// Holds no login state of its own: everything that has to survive the
/// redirect lives in the two stores, so the half that handles the callback
/// can be a fresh `OAuthClient` in a new process.
pub struct OAuthClient<T, P, E> {
    pub client: Arc<T>,
    store: FlowStore<P, E>,
    config: ClientConfig,
}

impl<T, P, E> Clone for OAuthClient<T, P, E>
where
    P: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

fn transition(_state: FlowState) {
    #[cfg(feature = "tracing")]
    tracing::debug!(state = %_state, "login flow");
}

impl<T, P, E> OAuthClient<T, P, E>
where
    T: OAuthResolver + Send + Sync,
    P: KeyValueStore + Sync,
    E: KeyValueStore + Sync,
{
    pub fn new(client: T, persistent: P, ephemeral: E, config: ClientConfig) -> Result<Self> {
        Self::new_with_shared(Arc::new(client), FlowStore::new(persistent, ephemeral), config)
    }

    pub fn new_with_shared(
        client: Arc<T>,
        store: FlowStore<P, E>,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            store,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &FlowStore<P, E> {
        &self.store
    }

    /// First half of a login: normalize `input`, make sure the app is
    /// registered with the instance, and build the URL to send the user to.
    ///
    /// The instance and, for PKCE-capable servers, the verifier are stored
    /// before returning, ready for [`callback`](Self::callback).
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(input = input.as_ref())))]
    pub async fn start_auth(
        &self,
        input: impl AsRef<str>,
        options: AuthorizeOptions,
    ) -> Result<AuthorizationRedirect> {
        let instance = Instance::normalize(input.as_ref())?;
        transition(FlowState::Registering);
        self.store.set_instance(&instance).await?;

        let registration =
            register_or_get_cached(self.client.as_ref(), &self.store, &instance, &self.config)
                .await?;

        let pkce = self
            .client
            .supports_pkce(&instance)
            .await
            .then(PkceChallenge::generate);
        let (url, verifier) = build_authorization_url(
            &instance,
            &registration,
            &self.config,
            pkce.as_ref(),
            options,
        )?;
        match &verifier {
            Some(verifier) => self.store.save_verifier(verifier).await?,
            // a verifier left by an earlier attempt must not reach a
            // non-PKCE exchange
            None => self.store.delete_verifier().await?,
        }
        transition(FlowState::AwaitingCallback {
            pkce: verifier.is_some(),
        });
        Ok(AuthorizationRedirect {
            url,
            instance,
            pkce: verifier.is_some(),
        })
    }

    /// [`start_auth`](Self::start_auth), then navigate `location` to the
    /// instance.
    pub async fn login_to_instance<L: Location>(
        &self,
        input: impl AsRef<str>,
        options: AuthorizeOptions,
        location: &mut L,
    ) -> Result<AuthorizationRedirect> {
        let redirect = self.start_auth(input, options).await?;
        location.assign(&redirect.url);
        Ok(redirect)
    }

    /// Second half of a login: exchange `code` using what `start_auth` left
    /// in the stores.
    ///
    /// On success the session is stored and the verifier deleted. On failure
    /// nothing is written and nothing is cleaned up.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub async fn callback(&self, code: &str) -> Result<Session> {
        let request = self
            .store
            .load_auth_request()
            .await
            .map_err(|missing| match missing {
                None => CallbackError::MissingInstance,
                Some(instance) => CallbackError::MissingRegistration(instance.into()),
            })?;

        transition(FlowState::Exchanging);
        let access_token = exchange_code(
            self.client.as_ref(),
            &request.instance,
            &self.config,
            &request.registration,
            code,
            request.verifier.as_deref(),
        )
        .await
        .inspect_err(|_| transition(FlowState::Error))?;

        let session = Session {
            instance_url: request.instance,
            access_token,
        };
        self.store.save_session(&session).await?;
        self.store.delete_verifier().await?;
        transition(FlowState::LoggedIn);
        Ok(session)
    }

    /// Finish a login if `location` is the landing page of a redirect.
    ///
    /// Safe to call on every page load: without a `code` parameter it
    /// returns `Ok(None)` and touches nothing. With one, the query string is
    /// removed from the visible URL before the exchange starts.
    pub async fn handle_callback<L: Location>(&self, location: &mut L) -> Result<Option<Session>> {
        let url = location.current_url();
        let params = CallbackParams::from_url(&url);
        let Some(code) = params.code else {
            if let Some(_error) = &params.error {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    error = %_error,
                    description = params.error_description.as_deref(),
                    "authorization was not granted"
                );
            }
            return Ok(None);
        };
        location.replace(&landing_url(url));
        self.callback(&code).await.map(Some)
    }

    pub async fn is_logged_in(&self) -> bool {
        self.store.access_token().await.is_some()
    }

    pub async fn current_instance(&self) -> Option<Instance> {
        self.store.current_instance().await
    }

    pub async fn access_token(&self) -> Option<SmolStr> {
        self.store.access_token().await
    }

    pub async fn session(&self) -> Option<Session> {
        self.store.session().await
    }

    /// The flow state as far as the stores can tell.
    ///
    /// A pending login without PKCE leaves nothing behind that tells it
    /// apart from being logged out, so it reads as `LoggedOut`.
    pub async fn state(&self) -> FlowState {
        if self.store.session().await.is_some() {
            FlowState::LoggedIn
        } else if self.store.instance().await.is_some() && self.store.verifier().await.is_some()
        {
            FlowState::AwaitingCallback { pkce: true }
        } else {
            FlowState::LoggedOut
        }
    }

    /// Forget the session and any unfinished login's verifier.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear_session().await?;
        transition(FlowState::LoggedOut);
        Ok(())
    }
}
