use std::collections::VecDeque;
use std::sync::Arc;

use celebi::credentials::Credentials;
use celebi::oauth::client::OAuthClient;
use celebi::oauth::config::ClientConfig;
use celebi::oauth::location::{Location, MemoryLocation};
use celebi::oauth::resolver::OAuthResolver;
use celebi::oauth::session::FlowState;
use celebi::oauth::types::AuthorizeOptions;
use celebi::oauth::utils::derive_challenge;
use celebi::store::{KeyValueStore, MemoryStore};
use celebi_common::http_client::HttpClient;
use http::{Method, Response as HttpResponse, StatusCode};
use serde_json::{Value, json};
use url::Url;

#[derive(Clone, Default)]
struct MockClient {
    queue: Arc<tokio::sync::Mutex<VecDeque<http::Response<Vec<u8>>>>>,
    requests: Arc<tokio::sync::Mutex<Vec<http::Request<Vec<u8>>>>>,
}

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct Refused;

impl MockClient {
    async fn push(&self, status: StatusCode, body: Value) {
        self.queue.lock().await.push_back(
            HttpResponse::builder()
                .status(status)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&body).unwrap())
                .unwrap(),
        );
    }

    async fn requests(&self) -> Vec<(Method, String)> {
        self.requests
            .lock()
            .await
            .iter()
            .map(|r| (r.method().clone(), r.uri().to_string()))
            .collect()
    }

    async fn form(&self, index: usize) -> Vec<(String, String)> {
        serde_html_form::from_bytes(self.requests.lock().await[index].body()).unwrap()
    }
}

impl HttpClient for MockClient {
    type Error = Refused;
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl core::future::Future<
        Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
    > + Send {
        let queue = self.queue.clone();
        let requests = self.requests.clone();
        async move {
            requests.lock().await.push(request);
            queue.lock().await.pop_front().ok_or(Refused)
        }
    }
}

impl OAuthResolver for MockClient {}

type Flow = OAuthClient<MockClient, MemoryStore, MemoryStore>;

struct Env {
    http: MockClient,
    persistent: MemoryStore,
    ephemeral: MemoryStore,
}

impl Env {
    fn new() -> Self {
        Self {
            http: MockClient::default(),
            persistent: MemoryStore::new(),
            ephemeral: MemoryStore::new(),
        }
    }

    /// A fresh client over the same stores, as a new page load would build.
    fn client(&self) -> Flow {
        OAuthClient::new(
            self.http.clone(),
            self.persistent.clone(),
            self.ephemeral.clone(),
            ClientConfig::default(),
        )
        .unwrap()
    }

    async fn snapshot(&self) -> Vec<Option<Value>> {
        let mut out = Vec::new();
        for key in [
            "instanceURL",
            "app_mastodon.example",
            "accessToken",
            "currentInstance",
        ] {
            out.push(self.persistent.get(key).await);
        }
        out.push(self.ephemeral.get("codeVerifier").await);
        out
    }
}

fn get<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn query(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn start_registers_probes_and_stores_verifier() {
    let env = Env::new();
    env.http
        .push(
            StatusCode::OK,
            json!({
                "id": "1",
                "name": "Celebi.social",
                "client_id": "cid",
                "client_secret": "sec"
            }),
        )
        .await;
    env.http
        .push(
            StatusCode::OK,
            json!({
                "issuer": "https://mastodon.example/",
                "code_challenge_methods_supported": ["S256"]
            }),
        )
        .await;

    let oauth = env.client();
    let redirect = oauth
        .start_auth("https://mastodon.example/", AuthorizeOptions::default())
        .await
        .unwrap();
    assert_eq!(redirect.instance.as_str(), "mastodon.example");
    assert!(redirect.pkce);

    assert_eq!(
        env.http.requests().await,
        vec![
            (
                Method::POST,
                "https://mastodon.example/api/v1/apps".to_string()
            ),
            (
                Method::GET,
                "https://mastodon.example/.well-known/oauth-authorization-server".to_string()
            ),
        ]
    );
    assert_eq!(
        env.persistent.get("instanceURL").await,
        Some(json!("mastodon.example"))
    );
    assert_eq!(
        env.persistent
            .get("app_mastodon.example")
            .await
            .and_then(|v| v.get("client_id").cloned()),
        Some(json!("cid"))
    );

    let verifier = env.ephemeral.get("codeVerifier").await.unwrap();
    let verifier = verifier.as_str().unwrap();
    assert_eq!(verifier.len(), 56);

    let pairs = query(&redirect.url);
    assert_eq!(redirect.url.path(), "/oauth/authorize");
    assert_eq!(get(&pairs, "code_challenge_method"), Some("S256"));
    assert_eq!(
        get(&pairs, "code_challenge"),
        Some(derive_challenge(verifier).as_str())
    );
    assert_eq!(get(&pairs, "client_id"), Some("cid"));
    assert_eq!(get(&pairs, "response_type"), Some("code"));
    assert_eq!(
        oauth.state().await,
        FlowState::AwaitingCallback { pkce: true }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_registration_skips_registration_call() {
    let env = Env::new();
    env.persistent
        .set("app_mastodon.example", json!({"client_id": "cid"}))
        .await
        .unwrap();
    env.http.push(StatusCode::NOT_FOUND, json!({})).await;

    let redirect = env
        .client()
        .start_auth("@alice@mastodon.example", AuthorizeOptions::default())
        .await
        .unwrap();
    assert!(!redirect.pkce);
    assert!(!redirect.url.as_str().contains("code_challenge"));
    assert_eq!(env.http.requests().await.len(), 1);
    assert_eq!(env.ephemeral.get("codeVerifier").await, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn callback_without_code_is_a_no_op() {
    let env = Env::new();
    env.persistent
        .set("instanceURL", json!("mastodon.example"))
        .await
        .unwrap();
    env.persistent
        .set("app_mastodon.example", json!({"client_id": "cid"}))
        .await
        .unwrap();
    env.ephemeral.set("codeVerifier", json!("v1")).await.unwrap();
    let before = env.snapshot().await;

    let mut location =
        MemoryLocation::new(Url::parse("http://127.0.0.1:4000/?page=2").unwrap());
    let session = env.client().handle_callback(&mut location).await.unwrap();
    assert_eq!(session, None);
    assert_eq!(env.snapshot().await, before);
    assert!(env.http.requests().await.is_empty());
    assert_eq!(
        location.current_url().as_str(),
        "http://127.0.0.1:4000/?page=2"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn callback_exchanges_code_for_session() {
    let env = Env::new();
    env.persistent
        .set("instanceURL", json!("mastodon.example"))
        .await
        .unwrap();
    env.persistent
        .set("app_mastodon.example", json!({"client_id": "cid"}))
        .await
        .unwrap();
    env.ephemeral.set("codeVerifier", json!("v1")).await.unwrap();
    env.http
        .push(StatusCode::OK, json!({"access_token": "tok"}))
        .await;

    let oauth = env.client();
    let mut location =
        MemoryLocation::new(Url::parse("http://127.0.0.1:4000/?code=abc123").unwrap());
    let session = oauth
        .handle_callback(&mut location)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(session.instance_url.as_str(), "mastodon.example");
    assert_eq!(session.access_token, "tok");
    assert_eq!(
        serde_json::to_value(&session).unwrap(),
        json!({"instanceURL": "mastodon.example", "accessToken": "tok"})
    );
    assert_eq!(env.persistent.get("accessToken").await, Some(json!("tok")));
    assert_eq!(
        env.persistent.get("currentInstance").await,
        Some(json!("mastodon.example"))
    );
    assert_eq!(env.ephemeral.get("codeVerifier").await, None);
    assert!(
        location
            .history()
            .iter()
            .all(|u| u.query().is_none())
    );

    let form = env.http.form(0).await;
    assert_eq!(get(&form, "grant_type"), Some("authorization_code"));
    assert_eq!(get(&form, "code"), Some("abc123"));
    assert_eq!(get(&form, "client_id"), Some("cid"));
    assert_eq!(get(&form, "code_verifier"), Some("v1"));
    assert_eq!(get(&form, "client_secret"), None);

    assert!(oauth.is_logged_in().await);
    assert_eq!(oauth.state().await, FlowState::LoggedIn);
    assert_eq!(
        session.api_url("timelines/home").as_str(),
        "https://mastodon.example/api/v1/timelines/home"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn full_round_trip_across_page_loads() {
    let env = Env::new();
    env.http
        .push(
            StatusCode::OK,
            json!({"client_id": "cid", "client_secret": "sec"}),
        )
        .await;
    env.http
        .push(
            StatusCode::OK,
            json!({"code_challenge_methods_supported": ["plain", "S256"]}),
        )
        .await;
    env.http
        .push(
            StatusCode::OK,
            json!({"access_token": "tok", "token_type": "Bearer", "scope": "read write follow push"}),
        )
        .await;

    let mut location = MemoryLocation::new(Url::parse("http://127.0.0.1:4000/").unwrap());
    env.client()
        .login_to_instance(
            "mastodon.example",
            AuthorizeOptions::default(),
            &mut location,
        )
        .await
        .unwrap();
    assert_eq!(location.current_url().path(), "/oauth/authorize");

    // the instance sends the browser back
    location.assign(&Url::parse("http://127.0.0.1:4000/?code=abc123").unwrap());
    let oauth = env.client();
    let session = oauth
        .handle_callback(&mut location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.access_token, "tok");
    assert_eq!(location.current_url().as_str(), "http://127.0.0.1:4000/");

    let form = env.http.form(2).await;
    assert_eq!(get(&form, "client_secret"), Some("sec"));
    assert_eq!(get(&form, "code_verifier").map(str::len), Some(56));

    // the page is loaded again: nothing left to do
    assert_eq!(oauth.handle_callback(&mut location).await.unwrap(), None);
    assert_eq!(env.http.requests().await.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_exchange_writes_no_session() {
    let env = Env::new();
    env.persistent
        .set("instanceURL", json!("mastodon.example"))
        .await
        .unwrap();
    env.persistent
        .set("app_mastodon.example", json!({"client_id": "cid"}))
        .await
        .unwrap();
    env.ephemeral.set("codeVerifier", json!("v1")).await.unwrap();

    let oauth = env.client();
    let err = oauth.callback("abc123").await.unwrap_err();
    assert!(err.is_token_exchange_failed());
    assert_eq!(env.http.requests().await.len(), 1);
    assert!(!oauth.is_logged_in().await);
    assert_eq!(env.persistent.get("accessToken").await, None);
    assert_eq!(env.ephemeral.get("codeVerifier").await, Some(json!("v1")));
}

#[tokio::test(flavor = "multi_thread")]
async fn registration_failure_aborts_start() {
    let env = Env::new();
    env.http
        .push(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "Validation failed"}),
        )
        .await;
    let err = env
        .client()
        .start_auth("mastodon.example", AuthorizeOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_registration_failed());
    assert_eq!(env.persistent.get("app_mastodon.example").await, None);
    assert_eq!(env.ephemeral.get("codeVerifier").await, None);
    // no probe after a failed registration
    assert_eq!(env.http.requests().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn logout_clears_session_and_verifier() {
    let env = Env::new();
    env.persistent
        .set("accessToken", json!("tok"))
        .await
        .unwrap();
    env.persistent
        .set("currentInstance", json!("mastodon.example"))
        .await
        .unwrap();
    env.persistent
        .set("app_mastodon.example", json!({"client_id": "cid"}))
        .await
        .unwrap();
    env.ephemeral.set("codeVerifier", json!("v1")).await.unwrap();

    let oauth = env.client();
    assert!(oauth.is_logged_in().await);
    assert_eq!(
        oauth.current_instance().await.map(|i| i.to_string()),
        Some("mastodon.example".to_string())
    );

    oauth.logout().await.unwrap();
    assert!(!oauth.is_logged_in().await);
    assert_eq!(oauth.access_token().await, None);
    assert_eq!(oauth.current_instance().await, None);
    assert_eq!(env.persistent.get("accessToken").await, None);
    assert_eq!(env.persistent.get("currentInstance").await, None);
    assert_eq!(env.ephemeral.get("codeVerifier").await, None);
    assert!(
        env.persistent
            .get("app_mastodon.example")
            .await
            .is_some()
    );
    assert_eq!(oauth.state().await, FlowState::LoggedOut);
}
