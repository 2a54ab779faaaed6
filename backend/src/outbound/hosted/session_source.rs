//! Hosted auth adapter for the `SessionSource` port.
//!
//! Holds the current session in memory, refreshes it when the access token
//! has expired, and announces every change on a broadcast channel. The
//! shared [`HostedClient`] is kept in step so data requests carry the user's
//! token.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockable::Clock;
use reqwest::{Method, StatusCode};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::client::{HostedClient, HostedError, decode};
use super::dto::{AuthErrorDto, CredentialsDto, RefreshDto, SignUpDto, TokenGrantDto};
use crate::domain::ports::{AUTH_CHANGE_CAPACITY, SessionSource, SessionSourceError};
use crate::domain::{AuthChange, AuthEventKind, AuthUser, LoginCredentials, Session};

/// Session source backed by the hosted auth endpoints.
pub struct HostedSessionSource {
    client: HostedClient,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<Session>>,
    changes: broadcast::Sender<AuthChange>,
}

impl HostedSessionSource {
    /// Create a source with no session held.
    pub fn new(client: HostedClient, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(AUTH_CHANGE_CAPACITY);
        Self {
            client,
            clock,
            current: Mutex::new(None),
            changes,
        }
    }

    fn held(&self) -> Option<Session> {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, session: Option<Session>) {
        self.client
            .set_access_token(session.as_ref().map(Session::access_token));
        match self.current.lock() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn announce(&self, kind: AuthEventKind, session: Option<Session>) {
        // No receivers is fine: nobody has subscribed yet.
        let _ = self.changes.send(AuthChange::new(kind, session));
    }

    async fn request_grant(
        &self,
        grant_type: &str,
        body: &impl serde::Serialize,
    ) -> Result<Session, SessionSourceError> {
        let request = self
            .client
            .auth(Method::POST, "token")
            .map_err(map_auth_error)?
            .query(&[("grant_type", grant_type)])
            .json(body);
        let grant: TokenGrantDto = self.client.send_json(request).await.map_err(map_auth_error)?;
        grant
            .into_session(self.clock.utc())
            .map_err(SessionSourceError::protocol)
    }

    async fn refresh(&self, expired: &Session) -> Result<Option<Session>, SessionSourceError> {
        let Some(refresh_token) = expired.refresh_token() else {
            self.replace(None);
            self.announce(AuthEventKind::SignedOut, None);
            return Ok(None);
        };
        match self
            .request_grant("refresh_token", &RefreshDto { refresh_token })
            .await
        {
            Ok(session) => {
                self.replace(Some(session.clone()));
                self.announce(AuthEventKind::TokenRefreshed, Some(session.clone()));
                Ok(Some(session))
            }
            Err(SessionSourceError::Rejected { message }) => {
                warn!(%message, "session refresh rejected; signing out");
                self.replace(None);
                self.announce(AuthEventKind::SignedOut, None);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl SessionSource for HostedSessionSource {
    async fn current_session(&self) -> Result<Option<Session>, SessionSourceError> {
        match self.held() {
            Some(session) if session.is_expired_at(self.clock.utc()) => {
                self.refresh(&session).await
            }
            other => Ok(other),
        }
    }

    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<Session, SessionSourceError> {
        let body = CredentialsDto {
            email: credentials.email(),
            password: credentials.password(),
        };
        let session = self.request_grant("password", &body).await?;
        info!(user_id = %session.user().id(), "signed in");
        self.replace(Some(session.clone()));
        self.announce(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthUser, SessionSourceError> {
        let body = CredentialsDto {
            email: credentials.email(),
            password: credentials.password(),
        };
        let request = self
            .client
            .auth(Method::POST, "signup")
            .map_err(map_auth_error)?
            .json(&body);
        let created: SignUpDto = self.client.send_json(request).await.map_err(map_auth_error)?;
        let (user, session) = created
            .into_outcome(self.clock.utc())
            .map_err(SessionSourceError::protocol)?;
        if let Some(session) = session {
            info!(user_id = %user.id(), "signed up with an open session");
            self.replace(Some(session.clone()));
            self.announce(AuthEventKind::SignedIn, Some(session));
        }
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), SessionSourceError> {
        if self.held().is_some() {
            let request = self
                .client
                .auth(Method::POST, "logout")
                .map_err(map_auth_error)?;
            match self.client.send(request).await {
                Ok(_) => {}
                // An expired or revoked token is already signed out remotely.
                Err(error) if is_revoked(&error) => {}
                Err(error) => return Err(map_auth_error(error)),
            }
        }
        self.replace(None);
        info!("signed out");
        self.announce(AuthEventKind::SignedOut, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

fn map_auth_error(error: HostedError) -> SessionSourceError {
    match error {
        HostedError::Transport(message) => SessionSourceError::connection(message),
        HostedError::Status { status, .. } if status.is_server_error() => {
            SessionSourceError::connection(error.to_string())
        }
        HostedError::Status { body, .. } => SessionSourceError::rejected(auth_message(&body)),
        HostedError::Decode(message) => SessionSourceError::protocol(message),
    }
}

fn is_revoked(error: &HostedError) -> bool {
    error
        .status()
        .is_some_and(|status| status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
}

fn auth_message(body: &str) -> String {
    decode::<AuthErrorDto>(body.as_bytes())
        .ok()
        .and_then(AuthErrorDto::into_message)
        .unwrap_or_else(|| body.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use mockable::MockClock;
    use rstest::rstest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::domain::UserId;

    const USER: &str = "11111111-2222-4333-8444-555555555555";

    #[rstest]
    #[case(
        StatusCode::BAD_REQUEST,
        r#"{"code":400,"msg":"User already registered"}"#,
        "User already registered"
    )]
    #[case(
        StatusCode::BAD_REQUEST,
        r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        "Invalid login credentials"
    )]
    #[case(StatusCode::UNPROCESSABLE_ENTITY, "not json", "not json")]
    fn client_errors_are_rejections_with_the_service_message(
        #[case] status: StatusCode,
        #[case] body: &str,
        #[case] expected: &str,
    ) {
        let error = map_auth_error(HostedError::Status {
            status,
            body: body.to_owned(),
        });
        assert_eq!(error, SessionSourceError::rejected(expected));
    }

    #[rstest]
    #[case(HostedError::Transport("refused".into()))]
    #[case(HostedError::Status { status: StatusCode::SERVICE_UNAVAILABLE, body: String::new() })]
    fn outages_are_connection_errors(#[case] error: HostedError) {
        assert!(matches!(
            map_auth_error(error),
            SessionSourceError::Connection { .. }
        ));
    }

    fn unreachable_client() -> HostedClient {
        HostedClient::new(
            reqwest::Url::parse("http://127.0.0.1:9").expect("url"),
            "anon",
            std::time::Duration::from_millis(50),
        )
        .expect("client")
    }

    fn source_at(now: DateTime<Utc>) -> HostedSessionSource {
        let mut clock = MockClock::new();
        clock.expect_utc().return_const(now);
        HostedSessionSource::new(unreachable_client(), Arc::new(clock))
    }

    fn session_expiring(at: DateTime<Utc>, refresh_token: Option<&str>) -> Session {
        let user = AuthUser::new(UserId::new(USER).expect("user id"));
        Session::new("access", refresh_token.map(str::to_owned), at, user)
    }

    #[tokio::test]
    async fn live_sessions_are_returned_without_a_request() {
        let now = Utc::now();
        let source = source_at(now);
        let session = session_expiring(now + TimeDelta::minutes(5), Some("refresh"));
        source.replace(Some(session.clone()));

        let current = source.current_session().await.expect("held session");
        assert_eq!(current, Some(session));
    }

    #[tokio::test]
    async fn expired_sessions_without_a_refresh_token_sign_out() {
        let now = Utc::now();
        let source = source_at(now);
        source.replace(Some(session_expiring(now - TimeDelta::seconds(1), None)));
        let mut changes = source.subscribe();

        let current = source.current_session().await.expect("local sign-out");

        assert_eq!(current, None);
        assert_eq!(changes.recv().await.expect("announced"), AuthChange::signed_out());
    }

    #[tokio::test]
    async fn sign_out_without_a_session_stays_local() {
        let source =
            HostedSessionSource::new(unreachable_client(), Arc::new(mockable::DefaultClock));
        let mut changes = source.subscribe();

        source.sign_out().await.expect("nothing to revoke");

        let change = changes.recv().await.expect("announced");
        assert_eq!(change, AuthChange::signed_out());
    }

    /// Answer one request on a loopback port with a JSON body.
    async fn serve_json_once(body: String) -> reqwest::Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            let mut buffer = [0_u8; 1024];
            while !request_complete(&received) {
                let read = socket.read(&mut buffer).await.expect("read request");
                if read == 0 {
                    break;
                }
                received.extend_from_slice(&buffer[..read]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.expect("shutdown");
        });
        reqwest::Url::parse(&format!("http://{address}")).expect("url")
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..head_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        received.len() >= head_end + 4 + length
    }

    fn bearer(client: &HostedClient) -> Option<String> {
        let request = client
            .table(Method::GET, "profiles")
            .expect("builder")
            .build()
            .expect("request");
        request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    #[tokio::test]
    async fn sign_up_with_an_open_session_holds_it() {
        let now = Utc::now();
        let base = serve_json_once(format!(
            r#"{{"access_token":"fresh-token","refresh_token":"r","expires_in":3600,"user":{{"id":"{USER}","email":"reader@archive.test"}}}}"#
        ))
        .await;
        let client =
            HostedClient::new(base, "anon", std::time::Duration::from_secs(5)).expect("client");
        let mut clock = MockClock::new();
        clock.expect_utc().return_const(now);
        let source = HostedSessionSource::new(client.clone(), Arc::new(clock));
        let mut changes = source.subscribe();
        let credentials =
            LoginCredentials::try_from_parts("reader@archive.test", "secret").expect("credentials");

        let user = source.sign_up(&credentials).await.expect("sign up");

        assert_eq!(user.id().as_ref(), USER);
        let held = source.current_session().await.expect("held").expect("session");
        assert_eq!(held.access_token(), "fresh-token");
        assert_eq!(bearer(&client).as_deref(), Some("Bearer fresh-token"));
        let change = changes.recv().await.expect("announced");
        assert_eq!(change.kind, AuthEventKind::SignedIn);
    }
}
