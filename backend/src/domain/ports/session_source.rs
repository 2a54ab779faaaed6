//! Port for the hosted authentication service.
//!
//! The session source owns the authoritative session. It announces every
//! change on a broadcast channel; the [`crate::domain::SessionStore`] listens
//! and keeps a read-only copy alongside the derived role.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::domain::{AuthChange, AuthEventKind, AuthUser, LoginCredentials, Session, UserId};

use super::define_port_error;

/// Capacity of the change channel used by in-process sources.
pub const AUTH_CHANGE_CAPACITY: usize = 32;

define_port_error! {
    /// Errors raised by session source adapters.
    pub enum SessionSourceError {
        /// The auth service could not be reached.
        Connection { message: String } =>
            "auth service connection failed: {message}",
        /// The auth service refused the credentials or token.
        Rejected { message: String } =>
            "auth service rejected the request: {message}",
        /// The auth service answered with an unexpected payload.
        Protocol { message: String } =>
            "auth service response was invalid: {message}",
    }
}

/// Hosted auth service: session queries, credential flows, and change events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Return the session currently held by the source, if any.
    async fn current_session(&self) -> Result<Option<Session>, SessionSourceError>;

    /// Exchange credentials for a session; emits `SIGNED_IN` on success.
    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<Session, SessionSourceError>;

    /// Register a new account and return its identity.
    ///
    /// When the service opens a session straight away it becomes the current
    /// session and `SIGNED_IN` is emitted.
    async fn sign_up(&self, credentials: &LoginCredentials)
    -> Result<AuthUser, SessionSourceError>;

    /// End the current session; emits `SIGNED_OUT` on success.
    async fn sign_out(&self) -> Result<(), SessionSourceError>;

    /// Receive every later session change.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

const FIXTURE_EMAIL: &str = "curator@archive.test";
const FIXTURE_PASSWORD: &str = "password";
const FIXTURE_USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

/// In-memory source accepting one development account.
///
/// `curator@archive.test` / `password` signs in as a fixed user id. Sessions
/// never expire.
#[derive(Debug)]
pub struct FixtureSessionSource {
    current: Mutex<Option<Session>>,
    changes: broadcast::Sender<AuthChange>,
}

impl Default for FixtureSessionSource {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(AUTH_CHANGE_CAPACITY);
        Self {
            current: Mutex::new(None),
            changes,
        }
    }
}

impl FixtureSessionSource {
    /// Identifier of the development account.
    pub fn fixture_user_id() -> Result<UserId, SessionSourceError> {
        UserId::new(FIXTURE_USER_ID)
            .map_err(|err| SessionSourceError::protocol(format!("invalid fixture user id: {err}")))
    }

    fn replace(&self, session: Option<Session>) {
        match self.current.lock() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn announce(&self, change: AuthChange) {
        // No receivers is not an error: nobody is listening yet.
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl SessionSource for FixtureSessionSource {
    async fn current_session(&self) -> Result<Option<Session>, SessionSourceError> {
        match self.current.lock() {
            Ok(guard) => Ok(guard.clone()),
            Err(poisoned) => Ok(poisoned.into_inner().clone()),
        }
    }

    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<Session, SessionSourceError> {
        if credentials.email() != FIXTURE_EMAIL || credentials.password() != FIXTURE_PASSWORD {
            return Err(SessionSourceError::rejected("invalid login credentials"));
        }
        let user = AuthUser::try_new(Self::fixture_user_id()?, Some(FIXTURE_EMAIL))
            .map_err(|err| SessionSourceError::protocol(err.to_string()))?;
        let session = Session::new("fixture-access-token", None, DateTime::<Utc>::MAX_UTC, user);
        self.replace(Some(session.clone()));
        self.announce(AuthChange::new(AuthEventKind::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthUser, SessionSourceError> {
        if credentials.email() == FIXTURE_EMAIL {
            return Err(SessionSourceError::rejected("user already registered"));
        }
        AuthUser::try_new(UserId::random(), Some(credentials.email()))
            .map_err(|err| SessionSourceError::protocol(err.to_string()))
    }

    async fn sign_out(&self) -> Result<(), SessionSourceError> {
        self.replace(None);
        self.announce(AuthChange::signed_out());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("curator@archive.test", "password", true)]
    #[case("curator@archive.test", "wrong", false)]
    #[case("reader@archive.test", "password", false)]
    #[tokio::test]
    async fn fixture_accepts_only_the_development_account(
        #[case] email: &str,
        #[case] password: &str,
        #[case] should_succeed: bool,
    ) {
        let source = FixtureSessionSource::default();
        let creds = LoginCredentials::try_from_parts(email, password).expect("credentials shape");
        let result = source.sign_in_with_password(&creds).await;
        match (should_succeed, result) {
            (true, Ok(session)) => assert_eq!(session.user().id().as_ref(), FIXTURE_USER_ID),
            (false, Err(err)) => assert!(matches!(err, SessionSourceError::Rejected { .. })),
            (true, Err(err)) => panic!("expected success, got error: {err:?}"),
            (false, Ok(session)) => panic!("expected failure, got session: {session:?}"),
        }
    }

    #[tokio::test]
    async fn fixture_announces_sign_in_and_sign_out() {
        let source = FixtureSessionSource::default();
        let mut changes = source.subscribe();
        let creds =
            LoginCredentials::try_from_parts(FIXTURE_EMAIL, FIXTURE_PASSWORD).expect("creds");

        source.sign_in_with_password(&creds).await.expect("sign in");
        source.sign_out().await.expect("sign out");

        let first = changes.recv().await.expect("sign-in event");
        assert_eq!(first.kind, AuthEventKind::SignedIn);
        let second = changes.recv().await.expect("sign-out event");
        assert_eq!(second, AuthChange::signed_out());
        assert!(source.current_session().await.expect("query").is_none());
    }
}
