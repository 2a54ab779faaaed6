//! Authenticated identity and session data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Validation errors returned by [`UserId::new`] and [`AuthUser::try_new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    EmptyId,
    InvalidId,
    InvalidEmail,
}

impl fmt::Display for UserValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "user id must not be empty"),
            Self::InvalidId => write!(f, "user id must be a valid UUID"),
            Self::InvalidEmail => write!(f, "email must contain a single '@'"),
        }
    }
}

impl std::error::Error for UserValidationError {}

/// Stable user identifier issued by the hosted auth service.
///
/// The raw string is kept alongside the parsed UUID so the identifier can be
/// compared against configuration values without reformatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(Uuid, String);

impl UserId {
    /// Validate and construct a [`UserId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UserValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    /// Generate a new random [`UserId`].
    pub fn random() -> Self {
        let uuid = Uuid::new_v4();
        Self(uuid, uuid.to_string())
    }

    fn from_owned(id: String) -> Result<Self, UserValidationError> {
        if id.is_empty() {
            return Err(UserValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(UserValidationError::InvalidId);
        }

        let parsed = Uuid::parse_str(&id).map_err(|_| UserValidationError::InvalidId)?;
        Ok(Self(parsed, id))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        let UserId(_, raw) = value;
        raw
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Authenticated identity attached to a [`Session`].
///
/// ## Invariants
/// - `email`, when present, is trimmed and contains exactly one `@`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl AuthUser {
    /// Build an identity without an email address.
    pub fn new(id: UserId) -> Self {
        Self { id, email: None }
    }

    /// Build an identity, validating the optional email.
    pub fn try_new(id: UserId, email: Option<&str>) -> Result<Self, UserValidationError> {
        let email = match email.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) if value.matches('@').count() == 1 => Some(value.to_owned()),
            Some(_) => return Err(UserValidationError::InvalidEmail),
            None => None,
        };
        Ok(Self { id, email })
    }

    /// Stable user identifier.
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Email address registered with the auth service, if known.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// Backend-issued proof of authentication.
///
/// Tokens are zeroized when the session is dropped and never printed by
/// `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: Zeroizing<String>,
    refresh_token: Option<Zeroizing<String>>,
    expires_at: DateTime<Utc>,
    user: AuthUser,
}

impl Session {
    /// Assemble a session from the auth service's token grant.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
        user: AuthUser,
    ) -> Self {
        Self {
            access_token: Zeroizing::new(access_token.into()),
            refresh_token: refresh_token.map(Zeroizing::new),
            expires_at,
            user,
        }
    }

    /// Bearer token for data requests.
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// Token used to obtain a fresh access token.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|token| token.as_str())
    }

    /// End of the validity window.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the validity window has closed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Identity the session was issued for.
    pub fn user(&self) -> &AuthUser {
        &self.user
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}
