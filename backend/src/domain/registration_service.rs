//! Account registration and administrator verification.
//!
//! New members sign up with the hosted auth service and then store a profile
//! that starts out `pending`. Only an administrator can move it on.

use std::sync::Arc;

use tracing::info;

use crate::domain::port_errors::{map_profile_error, map_session_error};
use crate::domain::ports::{ProfileRepository, SessionSource, SessionSourceError};
use crate::domain::{
    Area, AuthUser, Error, LoginCredentials, PASSWORD_MIN, Profile, ProfileDraft, ReviewDecision,
    Role, UserId, VerificationStatus, require_area,
};

/// Sign-up and profile completion.
#[derive(Clone)]
pub struct RegistrationService<S: ?Sized, P> {
    source: Arc<S>,
    profiles: Arc<P>,
}

impl<S: ?Sized, P> RegistrationService<S, P> {
    /// Create a new service with the given ports.
    pub fn new(source: Arc<S>, profiles: Arc<P>) -> Self {
        Self { source, profiles }
    }
}

impl<S, P> RegistrationService<S, P>
where
    S: SessionSource + ?Sized,
    P: ProfileRepository,
{
    /// Create an account and its pending profile.
    pub async fn register(
        &self,
        credentials: &LoginCredentials,
        draft: ProfileDraft,
    ) -> Result<Profile, Error> {
        if credentials.password().chars().count() < PASSWORD_MIN {
            return Err(Error::invalid_request(format!(
                "password must be at least {PASSWORD_MIN} characters"
            )));
        }
        let user = self
            .source
            .sign_up(credentials)
            .await
            .map_err(|error| match error {
                SessionSourceError::Rejected { message } => Error::invalid_request(message),
                other => map_session_error(other),
            })?;
        let profile = draft.into_pending_profile(user.id().clone());
        self.profiles
            .insert(&profile)
            .await
            .map_err(map_profile_error)?;
        info!(user_id = %profile.user_id, "registered new member");
        Ok(profile)
    }

    /// Store a pending profile for an authenticated user who has none.
    pub async fn complete_profile(
        &self,
        user: &AuthUser,
        draft: ProfileDraft,
    ) -> Result<Profile, Error> {
        let existing = self
            .profiles
            .find_by_user_id(user.id())
            .await
            .map_err(map_profile_error)?;
        if existing.is_some() {
            return Err(Error::conflict(format!(
                "profile already exists for user {}",
                user.id()
            )));
        }
        let profile = draft.into_pending_profile(user.id().clone());
        self.profiles
            .insert(&profile)
            .await
            .map_err(map_profile_error)?;
        info!(user_id = %profile.user_id, "profile completed");
        Ok(profile)
    }
}

/// Administrator review of pending members.
#[derive(Clone)]
pub struct VerificationService<P> {
    profiles: Arc<P>,
}

impl<P> VerificationService<P> {
    /// Create a new service with the given repository.
    pub fn new(profiles: Arc<P>) -> Self {
        Self { profiles }
    }
}

impl<P> VerificationService<P>
where
    P: ProfileRepository,
{
    /// Profiles awaiting a decision.
    pub async fn pending(&self, role: Role) -> Result<Vec<Profile>, Error> {
        require_area(role, Area::Admin)?;
        self.profiles
            .list_by_status(VerificationStatus::Pending)
            .await
            .map_err(map_profile_error)
    }

    /// Verify or reject a member.
    pub async fn decide(
        &self,
        role: Role,
        user_id: &UserId,
        decision: ReviewDecision,
    ) -> Result<VerificationStatus, Error> {
        require_area(role, Area::Admin)?;
        let status = match decision {
            ReviewDecision::Approve => VerificationStatus::Verified,
            ReviewDecision::Reject => VerificationStatus::Rejected,
        };
        let updated = self
            .profiles
            .set_status(user_id, status)
            .await
            .map_err(map_profile_error)?;
        if !updated {
            return Err(Error::not_found(format!("no profile for user {user_id}")));
        }
        info!(%user_id, %status, "verification decision recorded");
        Ok(status)
    }
}
