//! Role derivation from identity, profile status, and the configured admin.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{AuthUser, Profile, VerificationStatus};

/// Authorization tag controlling which areas a user may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Anonymous visitor, or a user without a usable profile.
    Guest,
    /// Registered user awaiting verification.
    Pending,
    /// Verified contributor.
    VerifiedUser,
    /// Archive administrator.
    Admin,
}

impl Role {
    /// Stable tag used in logs and CLI output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Pending => "pending",
            Self::VerifiedUser => "verified_user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an identity and its profile to a [`Role`].
///
/// The admin check compares trimmed strings and wins over any profile state.
/// A blank admin identifier never matches.
///
/// # Examples
/// ```
/// use portal::domain::{derive_role, Role};
///
/// let admin = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
/// assert_eq!(derive_role(Some(admin), None, admin), Role::Admin);
/// assert_eq!(derive_role(None, None, admin), Role::Guest);
/// ```
pub fn derive_role(user_id: Option<&str>, profile: Option<&Profile>, admin_id: &str) -> Role {
    let admin_id = admin_id.trim();
    if let Some(user_id) = user_id {
        if !admin_id.is_empty() && user_id.trim() == admin_id {
            return Role::Admin;
        }
    }

    match profile.map(|profile| profile.status) {
        None => Role::Guest,
        Some(VerificationStatus::Verified) => Role::VerifiedUser,
        Some(VerificationStatus::Pending) => Role::Pending,
        Some(VerificationStatus::Rejected | VerificationStatus::Unknown) => Role::Guest,
    }
}

/// Policy deciding the role of the current identity.
///
/// The session store only talks to this trait so the admin-identification
/// mechanism can change (for example to a token claim) without touching it.
pub trait AuthorizationPolicy: Send + Sync {
    /// Derive the role for `user` with its looked-up `profile`.
    fn role_for(&self, user: Option<&AuthUser>, profile: Option<&Profile>) -> Role;
}

/// Policy that recognises one configured administrator identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentifierPolicy {
    admin_id: String,
}

impl AdminIdentifierPolicy {
    /// Build the policy for the configured admin user id.
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
        }
    }
}

impl AuthorizationPolicy for AdminIdentifierPolicy {
    fn role_for(&self, user: Option<&AuthUser>, profile: Option<&Profile>) -> Role {
        derive_role(
            user.map(|user| user.id().as_ref()),
            profile,
            self.admin_id.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    //! Role derivation truth table.
    use super::*;
    use crate::domain::{ProfileDraft, UserId};
    use rstest::{fixture, rstest};

    const ADMIN: &str = "00000000-0000-4000-8000-000000000001";
    const MEMBER: &str = "00000000-0000-4000-8000-000000000002";

    #[fixture]
    fn profile() -> Profile {
        ProfileDraft::builder()
            .full_name("Member")
            .domicile("Surakarta")
            .institution("Archive")
            .occupation("Researcher")
            .phone("081234567890")
            .build()
            .expect("valid draft")
            .into_pending_profile(UserId::new(MEMBER).expect("valid id"))
    }

    fn with_status(mut profile: Profile, status: VerificationStatus) -> Profile {
        profile.status = status;
        profile
    }

    #[rstest]
    #[case(None)]
    #[case(Some(VerificationStatus::Pending))]
    #[case(Some(VerificationStatus::Verified))]
    #[case(Some(VerificationStatus::Rejected))]
    fn admin_wins_over_any_profile(profile: Profile, #[case] status: Option<VerificationStatus>) {
        let profile = status.map(|status| with_status(profile, status));
        assert_eq!(derive_role(Some(ADMIN), profile.as_ref(), ADMIN), Role::Admin);
    }

    #[rstest]
    fn admin_comparison_trims_both_sides() {
        let padded = format!("  {ADMIN} ");
        assert_eq!(derive_role(Some(&padded), None, &padded), Role::Admin);
    }

    #[rstest]
    fn blank_admin_id_never_matches() {
        assert_eq!(derive_role(Some(" "), None, " "), Role::Guest);
    }

    #[rstest]
    #[case(VerificationStatus::Verified, Role::VerifiedUser)]
    #[case(VerificationStatus::Pending, Role::Pending)]
    #[case(VerificationStatus::Rejected, Role::Guest)]
    #[case(VerificationStatus::Unknown, Role::Guest)]
    fn non_admin_role_follows_status(
        profile: Profile,
        #[case] status: VerificationStatus,
        #[case] expected: Role,
    ) {
        let profile = with_status(profile, status);
        assert_eq!(derive_role(Some(MEMBER), Some(&profile), ADMIN), expected);
        assert_eq!(
            derive_role(Some(MEMBER), Some(&profile), ADMIN),
            derive_role(Some(MEMBER), Some(&profile), ADMIN),
            "derivation must be deterministic"
        );
    }

    #[rstest]
    #[case(Some(MEMBER))]
    #[case(None)]
    fn missing_profile_is_guest(#[case] user_id: Option<&str>) {
        assert_eq!(derive_role(user_id, None, ADMIN), Role::Guest);
    }

    #[rstest]
    fn admin_policy_delegates_to_derivation(profile: Profile) {
        let policy = AdminIdentifierPolicy::new(ADMIN);
        let admin = AuthUser::new(UserId::new(ADMIN).expect("valid id"));
        let member = AuthUser::new(UserId::new(MEMBER).expect("valid id"));
        let verified = with_status(profile, VerificationStatus::Verified);

        assert_eq!(policy.role_for(Some(&admin), None), Role::Admin);
        assert_eq!(policy.role_for(Some(&member), Some(&verified)), Role::VerifiedUser);
        assert_eq!(policy.role_for(None, None), Role::Guest);
    }
}
