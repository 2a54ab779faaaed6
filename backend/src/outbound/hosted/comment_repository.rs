//! `comments` table adapter.

use async_trait::async_trait;
use reqwest::Method;

use super::client::{HostedClient, HostedError};
use super::dto::{CommentRow, StatusPatch, rows_into_domain};
use super::{PREFER_MINIMAL, PREFER_REPRESENTATION, eq};
use crate::domain::ports::{CommentRepository, CommentRepositoryError};
use crate::domain::{Comment, CommentId, CommentStatus, InventoryCode};

const TABLE: &str = "comments";
const OLDEST_FIRST: &str = "created_at.asc";

/// Comment repository over the hosted REST interface.
#[derive(Clone)]
pub struct HostedCommentRepository {
    client: HostedClient,
}

impl HostedCommentRepository {
    /// Create a repository sharing `client`.
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }

    async fn fetch(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        let request = self
            .client
            .table(Method::GET, TABLE)
            .map_err(map_error)?
            .query(filters);
        let rows: Vec<CommentRow> = self.client.send_json(request).await.map_err(map_error)?;
        rows_into_domain(rows, CommentRow::into_domain).map_err(CommentRepositoryError::query)
    }
}

#[async_trait]
impl CommentRepository for HostedCommentRepository {
    async fn insert(&self, comment: &Comment) -> Result<(), CommentRepositoryError> {
        let request = self
            .client
            .table(Method::POST, TABLE)
            .map_err(map_error)?
            .header("Prefer", PREFER_MINIMAL)
            .json(&CommentRow::from(comment));
        self.client.send(request).await.map_err(map_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &CommentId) -> Result<Option<Comment>, CommentRepositoryError> {
        let mut found = self
            .fetch(&[("id", eq(id)), ("limit", "1".to_owned())])
            .await?;
        Ok(found.pop())
    }

    async fn list_for_manuscript(
        &self,
        manuscript: &InventoryCode,
        status: CommentStatus,
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        self.fetch(&[
            ("manuscript_code", eq(manuscript)),
            ("status", eq(status.as_str())),
            ("order", OLDEST_FIRST.to_owned()),
        ])
        .await
    }

    async fn list_by_status(
        &self,
        status: CommentStatus,
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        self.fetch(&[
            ("status", eq(status.as_str())),
            ("order", OLDEST_FIRST.to_owned()),
        ])
        .await
    }

    async fn set_status(
        &self,
        id: &CommentId,
        status: CommentStatus,
    ) -> Result<bool, CommentRepositoryError> {
        let request = self
            .client
            .table(Method::PATCH, TABLE)
            .map_err(map_error)?
            .query(&[("id", eq(id))])
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&StatusPatch { status });
        let updated: Vec<CommentRow> = self.client.send_json(request).await.map_err(map_error)?;
        Ok(!updated.is_empty())
    }
}

fn map_error(error: HostedError) -> CommentRepositoryError {
    if error.is_unavailable() {
        CommentRepositoryError::connection(error.to_string())
    } else {
        CommentRepositoryError::query(error.to_string())
    }
}
