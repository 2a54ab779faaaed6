//! `guestbook` table adapter.

use async_trait::async_trait;
use reqwest::Method;
use uuid::Uuid;

use super::client::{HostedClient, HostedError};
use super::dto::GuestbookRow;
use super::{PREFER_MINIMAL, PREFER_REPRESENTATION, eq};
use crate::domain::GuestbookEntry;
use crate::domain::ports::{GuestbookRepository, GuestbookRepositoryError};

const TABLE: &str = "guestbook";

/// Guestbook repository over the hosted REST interface.
#[derive(Clone)]
pub struct HostedGuestbookRepository {
    client: HostedClient,
}

impl HostedGuestbookRepository {
    /// Create a repository sharing `client`.
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GuestbookRepository for HostedGuestbookRepository {
    async fn insert(&self, entry: &GuestbookEntry) -> Result<(), GuestbookRepositoryError> {
        let request = self
            .client
            .table(Method::POST, TABLE)
            .map_err(map_error)?
            .header("Prefer", PREFER_MINIMAL)
            .json(&GuestbookRow::from(entry));
        self.client.send(request).await.map_err(map_error)?;
        Ok(())
    }

    async fn list_recent(
        &self,
        limit: u32,
    ) -> Result<Vec<GuestbookEntry>, GuestbookRepositoryError> {
        let request = self
            .client
            .table(Method::GET, TABLE)
            .map_err(map_error)?
            .query(&[
                ("order", "created_at.desc".to_owned()),
                ("limit", limit.to_string()),
            ]);
        let rows: Vec<GuestbookRow> = self.client.send_json(request).await.map_err(map_error)?;
        Ok(rows.into_iter().map(GuestbookEntry::from).collect())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, GuestbookRepositoryError> {
        let request = self
            .client
            .table(Method::DELETE, TABLE)
            .map_err(map_error)?
            .query(&[("id", eq(id))])
            .header("Prefer", PREFER_REPRESENTATION);
        let removed: Vec<GuestbookRow> = self.client.send_json(request).await.map_err(map_error)?;
        Ok(!removed.is_empty())
    }
}

fn map_error(error: HostedError) -> GuestbookRepositoryError {
    if error.is_unavailable() {
        GuestbookRepositoryError::connection(error.to_string())
    } else {
        GuestbookRepositoryError::query(error.to_string())
    }
}
