//! Using a [`Session`] against the instance's REST API.

use celebi_oauth::session::Session;
use http::{Method, Request, header};
use url::Url;

pub const API_PREFIX: &str = "/api/v1/";

/// Helpers for authenticating requests with a logged-in session.
pub trait Credentials {
    /// `https://<instance>/api/v1/<path>`.
    fn api_url(&self, path: &str) -> Url;

    /// Value of the `Authorization` header.
    fn bearer(&self) -> String;

    /// Attach the bearer token to `builder`.
    fn authorize(&self, builder: http::request::Builder) -> http::request::Builder {
        builder.header(header::AUTHORIZATION, self.bearer())
    }

    /// An authenticated `GET` of `path` under the API prefix.
    fn authorized_get(&self, path: &str) -> Result<Request<Vec<u8>>, http::Error> {
        self.authorize(
            Request::builder()
                .method(Method::GET)
                .uri(self.api_url(path).as_str())
                .header(header::ACCEPT, "application/json"),
        )
        .body(Vec::new())
    }
}

impl Credentials for Session {
    fn api_url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        let path = path.strip_prefix(&API_PREFIX[1..]).unwrap_or(path);
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        let mut url = self.instance_url.endpoint(&format!("{API_PREFIX}{path}"));
        url.set_query(query);
        url
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}
