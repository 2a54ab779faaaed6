//! Port for application profile storage.
//!
//! Profiles live in the hosted `profiles` table keyed by the auth user id. A
//! missing row is `Ok(None)`, never an error.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{Profile, UserId, VerificationStatus};

use super::define_port_error;

define_port_error! {
    /// Errors raised by profile repository adapters.
    pub enum ProfileRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "profile repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "profile repository query failed: {message}",
        /// A profile already exists for the user.
        Duplicate { user_id: String } =>
            "profile already exists for user {user_id}",
    }
}

/// Profile lookup and verification-status persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch the profile owned by `user_id`.
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError>;

    /// Store a new profile.
    ///
    /// Fails with [`ProfileRepositoryError::Duplicate`] when the user already
    /// has one.
    async fn insert(&self, profile: &Profile) -> Result<(), ProfileRepositoryError>;

    /// Change a profile's verification status.
    ///
    /// Returns `false` when no profile exists for the user.
    async fn set_status(
        &self,
        user_id: &UserId,
        status: VerificationStatus,
    ) -> Result<bool, ProfileRepositoryError>;

    /// List profiles in the given status, oldest registrations first.
    async fn list_by_status(
        &self,
        status: VerificationStatus,
    ) -> Result<Vec<Profile>, ProfileRepositoryError>;
}

/// In-memory repository for tests and offline runs.
#[derive(Debug, Default)]
pub struct FixtureProfileRepository {
    profiles: Mutex<BTreeMap<String, Profile>>,
}

impl FixtureProfileRepository {
    /// Seed the repository with existing profiles.
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.user_id.to_string(), profile))
            .collect();
        Self {
            profiles: Mutex::new(profiles),
        }
    }

    fn with_store<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Profile>) -> R,
    ) -> Result<R, ProfileRepositoryError> {
        let mut guard = self
            .profiles
            .lock()
            .map_err(|_| ProfileRepositoryError::query("fixture store poisoned"))?;
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl ProfileRepository for FixtureProfileRepository {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        self.with_store(|store| store.get(user_id.as_ref()).cloned())
    }

    async fn insert(&self, profile: &Profile) -> Result<(), ProfileRepositoryError> {
        let key = profile.user_id.to_string();
        let inserted = self.with_store(|store| {
            if store.contains_key(&key) {
                return false;
            }
            store.insert(key.clone(), profile.clone());
            true
        })?;
        if inserted {
            Ok(())
        } else {
            Err(ProfileRepositoryError::duplicate(key))
        }
    }

    async fn set_status(
        &self,
        user_id: &UserId,
        status: VerificationStatus,
    ) -> Result<bool, ProfileRepositoryError> {
        self.with_store(|store| match store.get_mut(user_id.as_ref()) {
            Some(profile) => {
                profile.status = status;
                true
            }
            None => false,
        })
    }

    async fn list_by_status(
        &self,
        status: VerificationStatus,
    ) -> Result<Vec<Profile>, ProfileRepositoryError> {
        self.with_store(|store| {
            store
                .values()
                .filter(|profile| profile.status == status)
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProfileDraft;

    fn pending_profile() -> Profile {
        ProfileDraft::builder()
            .full_name("Reader")
            .domicile("Bandung")
            .institution("Independent")
            .occupation("Student")
            .phone("0812345678")
            .build()
            .expect("valid draft")
            .into_pending_profile(UserId::random())
    }

    #[tokio::test]
    async fn fixture_rejects_duplicate_inserts() {
        let repo = FixtureProfileRepository::default();
        let profile = pending_profile();
        repo.insert(&profile).await.expect("first insert");

        let err = repo.insert(&profile).await.expect_err("duplicate");
        assert!(matches!(err, ProfileRepositoryError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn fixture_updates_status_and_filters() {
        let profile = pending_profile();
        let repo = FixtureProfileRepository::with_profiles([profile.clone()]);

        assert!(repo
            .set_status(&profile.user_id, VerificationStatus::Verified)
            .await
            .expect("update"));
        assert!(!repo
            .set_status(&UserId::random(), VerificationStatus::Verified)
            .await
            .expect("missing update"));

        let pending = repo
            .list_by_status(VerificationStatus::Pending)
            .await
            .expect("list");
        assert!(pending.is_empty());
        let stored = repo
            .find_by_user_id(&profile.user_id)
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(stored.status, VerificationStatus::Verified);
    }

    #[test]
    fn duplicate_error_names_user() {
        let err = ProfileRepositoryError::duplicate("abc");
        assert_eq!(err.to_string(), "profile already exists for user abc");
    }
}
