//! `profiles` table adapter.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use super::client::{HostedClient, HostedError};
use super::dto::{ProfileRow, StatusPatch, rows_into_domain};
use super::{PREFER_MINIMAL, PREFER_REPRESENTATION, eq};
use crate::domain::ports::{ProfileRepository, ProfileRepositoryError};
use crate::domain::{Profile, UserId, VerificationStatus};

const TABLE: &str = "profiles";

/// Profile repository over the hosted REST interface.
#[derive(Clone)]
pub struct HostedProfileRepository {
    client: HostedClient,
}

impl HostedProfileRepository {
    /// Create a repository sharing `client`.
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }

    async fn fetch(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Vec<Profile>, ProfileRepositoryError> {
        let request = self
            .client
            .table(Method::GET, TABLE)
            .map_err(map_error)?
            .query(filters);
        let rows: Vec<ProfileRow> = self.client.send_json(request).await.map_err(map_error)?;
        rows_into_domain(rows, ProfileRow::into_domain).map_err(ProfileRepositoryError::query)
    }
}

#[async_trait]
impl ProfileRepository for HostedProfileRepository {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        let mut found = self
            .fetch(&[("user_id", eq(user_id)), ("limit", "1".to_owned())])
            .await?;
        Ok(found.pop())
    }

    async fn insert(&self, profile: &Profile) -> Result<(), ProfileRepositoryError> {
        let request = self
            .client
            .table(Method::POST, TABLE)
            .map_err(map_error)?
            .header("Prefer", PREFER_MINIMAL)
            .json(&ProfileRow::from(profile));
        match self.client.send(request).await {
            Ok(_) => Ok(()),
            Err(error) if error.status() == Some(StatusCode::CONFLICT) => Err(
                ProfileRepositoryError::duplicate(profile.user_id.to_string()),
            ),
            Err(error) => Err(map_error(error)),
        }
    }

    async fn set_status(
        &self,
        user_id: &UserId,
        status: VerificationStatus,
    ) -> Result<bool, ProfileRepositoryError> {
        let request = self
            .client
            .table(Method::PATCH, TABLE)
            .map_err(map_error)?
            .query(&[("user_id", eq(user_id))])
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&StatusPatch { status });
        let updated: Vec<ProfileRow> = self.client.send_json(request).await.map_err(map_error)?;
        Ok(!updated.is_empty())
    }

    async fn list_by_status(
        &self,
        status: VerificationStatus,
    ) -> Result<Vec<Profile>, ProfileRepositoryError> {
        self.fetch(&[
            ("status", eq(status.as_str())),
            ("order", "created_at.asc".to_owned()),
        ])
        .await
    }
}

fn map_error(error: HostedError) -> ProfileRepositoryError {
    if error.is_unavailable() {
        ProfileRepositoryError::connection(error.to_string())
    } else {
        ProfileRepositoryError::query(error.to_string())
    }
}
