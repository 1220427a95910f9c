#![cfg(feature = "loopback")]

use crate::{
    client::OAuthClient,
    error::{CallbackError, OAuthError},
    resolver::OAuthResolver,
    session::Session,
    types::{AuthorizeOptions, CallbackParams, ClientRegistration},
};
use celebi_common::Instance;
use celebi_common::store::KeyValueStore;
use rouille::Server;
use smol_str::{SmolStr, format_smolstr};
use tokio::sync::mpsc;
use url::Url;

#[derive(Clone, Debug)]
pub struct LoopbackConfig {
    pub host: String,
    /// Part of the registered redirect URI, so it must stay the same across
    /// logins to an instance.
    pub port: u16,
    pub open_browser: bool,
    pub timeout_ms: u64,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4000,
            open_browser: true,
            timeout_ms: 5 * 60 * 1000,
        }
    }
}

#[cfg(feature = "browser-open")]
fn try_open_in_browser(url: &str) -> bool {
    webbrowser::open(url).is_ok()
}
#[cfg(not(feature = "browser-open"))]
fn try_open_in_browser(_url: &str) -> bool {
    false
}

pub fn create_callback_router(
    request: &rouille::Request,
    tx: mpsc::Sender<CallbackParams>,
) -> rouille::Response {
    rouille::router!(request,
            (GET) (/oauth/callback) => {
                let params = CallbackParams {
                    code: request.get_param("code").filter(|c| !c.is_empty()).map(SmolStr::from),
                    error: request.get_param("error").map(SmolStr::from),
                    error_description: request.get_param("error_description").map(SmolStr::from),
                };
                match (params.code.is_some(), params.error.is_some()) {
                    (false, false) => {
                        rouille::Response::text("Missing authorization code").with_status_code(400)
                    }
                    (granted, _) => {
                        // a full channel means a redirect was already captured
                        let _ = tx.try_send(params);
                        if granted {
                            rouille::Response::text("Logged in! You can close this window.")
                        } else {
                            rouille::Response::text("Login was cancelled.")
                        }
                    }
                }
            },
            _ => rouille::Response::empty_404()
    )
}

struct CallbackHandle {
    #[allow(dead_code)]
    server_handle: std::thread::JoinHandle<()>,
    server_stop: std::sync::mpsc::Sender<()>,
    callback_rx: mpsc::Receiver<CallbackParams>,
}

fn one_shot_server(host: &str, port: u16) -> Result<CallbackHandle, CallbackError> {
    let (tx, callback_rx) = mpsc::channel(1);
    let server = Server::new((host, port), move |request| {
        create_callback_router(request, tx.clone())
    })
    .map_err(|e| CallbackError::Server(format_smolstr!("{host}:{port}: {e}")))?;
    let (server_handle, server_stop) = server.stoppable();
    Ok(CallbackHandle {
        server_handle,
        server_stop,
        callback_rx,
    })
}

/// A cached registration only accepts the redirect URIs it was created with.
/// Registrations that did not record any are let through.
fn check_registered_redirect(
    registration: &ClientRegistration,
    requested: &str,
) -> Result<(), CallbackError> {
    let registered = registration.redirect_uris();
    if registered.is_empty() || registered.contains(&requested) {
        Ok(())
    } else {
        Err(CallbackError::RedirectMismatch {
            registered: registered.join(" ").into(),
            requested: requested.into(),
        })
    }
}

impl<T, P, E> OAuthClient<T, P, E>
where
    T: OAuthResolver + Send + Sync,
    P: KeyValueStore + Clone + Sync,
    E: KeyValueStore + Clone + Sync,
{
    /// Drive the whole login with a local server standing in for the
    /// landing page.
    ///
    /// The redirect URI becomes `http://<host>:<port>/oauth/callback`. When
    /// the instance already has a cached registration for another redirect,
    /// this fails with [`CallbackError::RedirectMismatch`] before anything is
    /// sent.
    pub async fn login_with_local_server(
        &self,
        input: impl AsRef<str>,
        opts: AuthorizeOptions,
        cfg: LoopbackConfig,
    ) -> crate::error::Result<Session> {
        let instance = Instance::normalize(input.as_ref())?;
        let redirect = Url::parse(&format!(
            "http://{}:{}/oauth/callback",
            cfg.host, cfg.port
        ))?;
        let flow_client = OAuthClient::new_with_shared(
            self.client.clone(),
            self.store().clone(),
            self.config().with_redirect_uri(redirect),
        )?;
        if let Some(registration) = self.store().registration(&instance).await {
            check_registered_redirect(
                &registration,
                &flow_client.config().redirect_uri_string(),
            )?;
        }

        let handle = one_shot_server(&cfg.host, cfg.port)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(redirect = %flow_client.config().redirect_uri, "callback server listening");

        let redirect = flow_client.start_auth(instance.as_str(), opts).await?;
        println!(
            "To log in to {}, visit:\n{}\n",
            redirect.instance, redirect.url
        );
        if cfg.open_browser {
            let _ = try_open_in_browser(redirect.url.as_str());
        }

        let mut callback_rx = handle.callback_rx;
        let cb = tokio::time::timeout(
            std::time::Duration::from_millis(cfg.timeout_ms),
            callback_rx.recv(),
        )
        .await;
        let _ = handle.server_stop.send(());
        match cb {
            Ok(Some(CallbackParams {
                code: Some(code), ..
            })) => flow_client.callback(&code).await,
            Ok(Some(CallbackParams {
                error: Some(error),
                error_description,
                ..
            })) => Err(OAuthError::Callback(CallbackError::Denied {
                error,
                description: error_description,
            })),
            _ => Err(OAuthError::Callback(CallbackError::Timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use celebi_common::http_client::HttpClient;
    use celebi_common::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingClient {
        log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("no route to host")]
    struct Unreachable;

    impl HttpClient for RecordingClient {
        type Error = Unreachable;
        fn send_http(
            &self,
            request: http::Request<Vec<u8>>,
        ) -> impl core::future::Future<
            Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
        > + Send {
            let log = self.log.clone();
            async move {
                log.lock().await.push(request);
                Err(Unreachable)
            }
        }
    }

    impl OAuthResolver for RecordingClient {}

    fn registration(redirect: &str) -> ClientRegistration {
        ClientRegistration::from_value(&json!({
            "client_id": "cid",
            "client_secret": "secret",
            "redirect_uri": redirect,
        }))
        .unwrap()
    }

    fn get(url: &str) -> rouille::Request {
        rouille::Request::fake_http("GET", url, vec![], vec![])
    }

    #[test]
    fn registered_redirect_must_match() {
        let reg = registration("http://127.0.0.1:4000/oauth/callback");
        assert!(check_registered_redirect(&reg, "http://127.0.0.1:4000/oauth/callback").is_ok());
        let err =
            check_registered_redirect(&reg, "http://127.0.0.1:4001/oauth/callback").unwrap_err();
        assert!(matches!(
            err,
            CallbackError::RedirectMismatch { ref requested, .. }
                if requested == "http://127.0.0.1:4001/oauth/callback"
        ));

        let bare = ClientRegistration::from_value(&json!({"client_id": "cid"})).unwrap();
        assert!(check_registered_redirect(&bare, "http://127.0.0.1:4001/oauth/callback").is_ok());
    }

    #[tokio::test]
    async fn second_login_on_another_port_is_refused() {
        let http = RecordingClient::default();
        let client = OAuthClient::new(
            http.clone(),
            MemoryStore::new(),
            MemoryStore::new(),
            ClientConfig::default(),
        )
        .unwrap();
        let instance = Instance::raw("mastodon.example");
        client
            .store()
            .save_registration(
                &instance,
                json!({
                    "client_id": "cid",
                    "redirect_uri": "http://127.0.0.1:51000/oauth/callback",
                }),
            )
            .await
            .unwrap();

        let cfg = LoopbackConfig {
            port: 52000,
            open_browser: false,
            timeout_ms: 10,
            ..LoopbackConfig::default()
        };
        let err = client
            .login_with_local_server("mastodon.example", AuthorizeOptions::default(), cfg)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OAuthError::Callback(CallbackError::RedirectMismatch { ref registered, ref requested })
                if registered == "http://127.0.0.1:51000/oauth/callback"
                    && requested == "http://127.0.0.1:52000/oauth/callback"
        ));
        assert!(http.log.lock().await.is_empty());
        assert!(client.store().instance().await.is_none());
    }

    #[test]
    fn router_captures_code() {
        let (tx, mut rx) = mpsc::channel(1);
        let res = create_callback_router(&get("/oauth/callback?code=abc123"), tx);
        assert_eq!(res.status_code, 200);
        let params = rx.try_recv().unwrap();
        assert_eq!(params.code.as_deref(), Some("abc123"));
    }

    #[test]
    fn router_captures_denial() {
        let (tx, mut rx) = mpsc::channel(1);
        let res = create_callback_router(
            &get("/oauth/callback?error=access_denied&error_description=nope"),
            tx,
        );
        assert_eq!(res.status_code, 200);
        let params = rx.try_recv().unwrap();
        assert_eq!(params.code, None);
        assert_eq!(params.error.as_deref(), Some("access_denied"));
    }

    #[test]
    fn router_rejects_bare_callback_and_other_paths() {
        let (tx, mut rx) = mpsc::channel(1);
        let res = create_callback_router(&get("/oauth/callback"), tx.clone());
        assert_eq!(res.status_code, 400);
        let res = create_callback_router(&get("/favicon.ico"), tx);
        assert_eq!(res.status_code, 404);
        assert!(rx.try_recv().is_err());
    }
}
