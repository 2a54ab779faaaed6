//! Authentication primitives: login credentials and session-change events.
//!
//! Keep inbound payload parsing outside the domain by exposing constructors
//! that validate string inputs before an adapter talks to a port or service.

use std::fmt;

use zeroize::Zeroizing;

use crate::domain::Session;

/// Minimum password length accepted at sign-up.
pub const PASSWORD_MIN: usize = 6;

/// Domain error returned when login payload values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginValidationError {
    /// Email was missing or blank once trimmed.
    EmptyEmail,
    /// Email does not look like an address.
    InvalidEmail,
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for LoginValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyEmail => write!(f, "email must not be empty"),
            Self::InvalidEmail => write!(f, "email must contain a single '@'"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
        }
    }
}

impl std::error::Error for LoginValidationError {}

/// Validated login credentials used by the session source.
///
/// ## Invariants
/// - `email` is trimmed, non-empty and contains exactly one `@`.
/// - `password` is required to be non-empty but retains caller-provided
///   whitespace to avoid surprising credential comparisons.
///
/// # Examples
/// ```
/// use portal::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts(" curator@archive.test ", "password").unwrap();
/// assert_eq!(creds.email(), "curator@archive.test");
/// assert_eq!(creds.password(), "password");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    email: String,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw email/password inputs.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, LoginValidationError> {
        let normalized = email.trim();
        if normalized.is_empty() {
            return Err(LoginValidationError::EmptyEmail);
        }
        if normalized.matches('@').count() != 1 {
            return Err(LoginValidationError::InvalidEmail);
        }

        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }

        Ok(Self {
            email: normalized.to_owned(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Email address suitable for auth lookups.
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

/// Kind of session-change notification emitted by the hosted auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEventKind {
    /// First notification after subscribing, carrying any stored session.
    InitialSession,
    /// Credentials were accepted or a session was re-established.
    SignedIn,
    /// The session ended.
    SignedOut,
    /// The account was removed.
    UserDeleted,
    /// A new access token replaced an expiring one.
    TokenRefreshed,
    /// Account attributes changed.
    UserUpdated,
    /// A password-recovery link was followed.
    PasswordRecovery,
}

impl AuthEventKind {
    /// Wire name used by the hosted auth service.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::UserDeleted => "USER_DELETED",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One session-change notification: what happened and the resulting session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    /// Event classification reported by the auth service.
    pub kind: AuthEventKind,
    /// Session in effect after the event, if any.
    pub session: Option<Session>,
}

impl AuthChange {
    /// Build a notification.
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    /// Build the synthetic initial notification for a stored session.
    pub fn initial(session: Option<Session>) -> Self {
        Self::new(AuthEventKind::InitialSession, session)
    }

    /// Build a sign-out notification.
    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }
}
