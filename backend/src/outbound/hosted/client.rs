//! Reqwest client shared by the hosted auth and data adapters.
//!
//! Owns transport details only: base URL resolution, the `apikey` and bearer
//! headers, status checks, and JSON decoding. Each adapter maps
//! [`HostedError`] into its own port error.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

const AUTH_PREFIX: &str = "auth/v1/";
const REST_PREFIX: &str = "rest/v1/";

/// Failures shared by every hosted adapter.
#[derive(Debug, thiserror::Error)]
pub(super) enum HostedError {
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("status {}: {body}", status.as_u16())]
    Status { status: StatusCode, body: String },
    #[error("invalid payload: {0}")]
    Decode(String),
}

impl HostedError {
    /// Whether the service itself is unreachable or failing.
    pub(super) fn is_unavailable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Decode(_) => false,
        }
    }

    pub(super) fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection to one hosted project.
///
/// Cloning is cheap; clones share the bearer token installed by the session
/// source so data requests run as the signed-in user.
#[derive(Clone)]
pub struct HostedClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base: Url,
    anon_key: Zeroizing<String>,
    access_token: Mutex<Option<Zeroizing<String>>>,
}

impl HostedClient {
    /// Build a client for the project at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base: Url,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base: with_trailing_slash(base),
                anon_key: Zeroizing::new(anon_key.into()),
                access_token: Mutex::new(None),
            }),
        })
    }

    /// Install or clear the user token sent as bearer.
    pub(super) fn set_access_token(&self, token: Option<&str>) {
        let token = token.map(|raw| Zeroizing::new(raw.to_owned()));
        match self.inner.access_token.lock() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn bearer(&self) -> Zeroizing<String> {
        let held = match self.inner.access_token.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        held.unwrap_or_else(|| self.inner.anon_key.clone())
    }

    /// Request against `{base}/auth/v1/{path}`.
    pub(super) fn auth(&self, method: Method, path: &str) -> Result<RequestBuilder, HostedError> {
        self.request(method, &format!("{AUTH_PREFIX}{path}"))
    }

    /// Request against `{base}/rest/v1/{table}`.
    pub(super) fn table(&self, method: Method, table: &str) -> Result<RequestBuilder, HostedError> {
        self.request(method, &format!("{REST_PREFIX}{table}"))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, HostedError> {
        let url = self
            .inner
            .base
            .join(path)
            .map_err(|error| HostedError::Transport(format!("invalid URL for {path}: {error}")))?;
        Ok(self
            .inner
            .http
            .request(method, url)
            .header("apikey", self.inner.anon_key.as_str())
            .bearer_auth(self.bearer().as_str())
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    /// Send `request` and return the body of a successful response.
    pub(super) async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, HostedError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(HostedError::Status {
                status,
                body: body_preview(body.as_ref()),
            });
        }
        Ok(body.to_vec())
    }

    /// Send `request` and decode the JSON body.
    pub(super) async fn send_json<T>(&self, request: RequestBuilder) -> Result<T, HostedError>
    where
        T: DeserializeOwned,
    {
        let body = self.send(request).await?;
        decode(&body)
    }
}

pub(super) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, HostedError> {
    serde_json::from_slice(body).map_err(|error| HostedError::Decode(error.to_string()))
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn map_transport_error(error: reqwest::Error) -> HostedError {
    HostedError::Transport(error.to_string())
}

pub(super) fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn client(base: &str) -> HostedClient {
        HostedClient::new(
            Url::parse(base).expect("url"),
            "anon-key",
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[rstest]
    #[case("https://project.example.test", "https://project.example.test/rest/v1/profiles")]
    #[case("https://gateway.test/tenant", "https://gateway.test/tenant/rest/v1/profiles")]
    #[case("https://gateway.test/tenant/", "https://gateway.test/tenant/rest/v1/profiles")]
    fn table_urls_keep_the_base_path(#[case] base: &str, #[case] expected: &str) {
        let request = client(base)
            .table(Method::GET, "profiles")
            .expect("builder")
            .build()
            .expect("request");
        assert_eq!(request.url().as_str(), expected);
    }

    #[test]
    fn requests_carry_anon_key_until_a_user_token_is_installed() {
        let client = client("https://project.example.test");
        let bearer = |client: &HostedClient| {
            let request = client
                .auth(Method::POST, "logout")
                .expect("builder")
                .build()
                .expect("request");
            request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };

        assert_eq!(bearer(&client).as_deref(), Some("Bearer anon-key"));
        client.set_access_token(Some("user-token"));
        assert_eq!(bearer(&client).as_deref(), Some("Bearer user-token"));
        client.set_access_token(None);
        assert_eq!(bearer(&client).as_deref(), Some("Bearer anon-key"));
    }

    #[rstest]
    #[case(HostedError::Transport("refused".into()), true)]
    #[case(HostedError::Status { status: StatusCode::BAD_GATEWAY, body: String::new() }, true)]
    #[case(HostedError::Status { status: StatusCode::CONFLICT, body: String::new() }, false)]
    #[case(HostedError::Decode("eof".into()), false)]
    fn unavailability_covers_transport_and_server_errors(
        #[case] error: HostedError,
        #[case] expected: bool,
    ) {
        assert_eq!(error.is_unavailable(), expected);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x ".repeat(200);
        let preview = body_preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 163);
    }
}
