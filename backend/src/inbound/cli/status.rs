//! Waiting for the session store to settle, and its printable view.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use super::CliError;
use crate::domain::{AuthState, Role, SessionStore, VerificationStatus};

/// Longest wait for a settled session state.
pub(super) const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Session state without tokens, for printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// Signed-in user id.
    pub user_id: Option<String>,
    /// Signed-in email.
    pub email: Option<String>,
    /// Profile name.
    pub full_name: Option<String>,
    /// Profile verification status.
    pub verification: Option<VerificationStatus>,
    /// Derived role.
    pub role: Role,
    /// Whether a loading transition is visible.
    pub loading: bool,
    /// Whether the first notification has been processed.
    pub is_initialized: bool,
}

impl From<&AuthState> for StatusView {
    fn from(state: &AuthState) -> Self {
        Self {
            user_id: state.user.as_ref().map(|user| user.id().to_string()),
            email: state
                .user
                .as_ref()
                .and_then(|user| user.email())
                .map(str::to_owned),
            full_name: state.profile.as_ref().map(|profile| profile.full_name.clone()),
            verification: state.profile.as_ref().map(|profile| profile.status),
            role: state.role,
            loading: state.loading,
            is_initialized: state.is_initialized,
        }
    }
}

/// Wait until `store` publishes a snapshot that is initialised, not loading,
/// and accepted by `ready`.
pub(super) async fn settled(
    store: &SessionStore,
    ready: impl Fn(&AuthState) -> bool + Send + Sync + 'static,
) -> Result<AuthState, CliError> {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let _subscription = store.subscribe(move |state| {
        if state.is_initialized && !state.loading && ready(state) {
            // The receiver outlives the subscription.
            let _ = sender.send(state.clone());
        }
    });
    match tokio::time::timeout(SETTLE_TIMEOUT, receiver.recv()).await {
        Ok(Some(state)) => Ok(state),
        Ok(None) | Err(_) => Err(CliError::Unsettled {
            seconds: SETTLE_TIMEOUT.as_secs(),
        }),
    }
}
