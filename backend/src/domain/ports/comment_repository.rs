//! Port for manuscript comment persistence.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{Comment, CommentId, CommentStatus, InventoryCode};

use super::define_port_error;

define_port_error! {
    /// Errors raised by comment repository adapters.
    pub enum CommentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "comment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "comment repository query failed: {message}",
    }
}

/// Comment storage with moderation status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Store a new comment.
    async fn insert(&self, comment: &Comment) -> Result<(), CommentRepositoryError>;

    /// Fetch one comment.
    async fn find_by_id(&self, id: &CommentId) -> Result<Option<Comment>, CommentRepositoryError>;

    /// Comments on one manuscript in `status`, oldest first.
    async fn list_for_manuscript(
        &self,
        manuscript: &InventoryCode,
        status: CommentStatus,
    ) -> Result<Vec<Comment>, CommentRepositoryError>;

    /// Comments across the catalogue in `status`, oldest first.
    async fn list_by_status(
        &self,
        status: CommentStatus,
    ) -> Result<Vec<Comment>, CommentRepositoryError>;

    /// Change a comment's status. Returns `false` when it does not exist.
    async fn set_status(
        &self,
        id: &CommentId,
        status: CommentStatus,
    ) -> Result<bool, CommentRepositoryError>;
}

/// In-memory comment store for tests and offline runs.
#[derive(Debug, Default)]
pub struct FixtureCommentRepository {
    comments: Mutex<Vec<Comment>>,
}

impl FixtureCommentRepository {
    /// Seed the store.
    pub fn with_comments(comments: impl IntoIterator<Item = Comment>) -> Self {
        Self {
            comments: Mutex::new(comments.into_iter().collect()),
        }
    }

    fn with_comments_mut<R>(
        &self,
        f: impl FnOnce(&mut Vec<Comment>) -> R,
    ) -> Result<R, CommentRepositoryError> {
        let mut guard = self
            .comments
            .lock()
            .map_err(|_| CommentRepositoryError::query("fixture comments poisoned"))?;
        Ok(f(&mut guard))
    }

    fn filtered(
        &self,
        keep: impl Fn(&Comment) -> bool,
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        self.with_comments_mut(|comments| {
            let mut matching: Vec<_> = comments.iter().filter(|c| keep(c)).cloned().collect();
            matching.sort_by_key(|comment| comment.created_at);
            matching
        })
    }
}

#[async_trait]
impl CommentRepository for FixtureCommentRepository {
    async fn insert(&self, comment: &Comment) -> Result<(), CommentRepositoryError> {
        self.with_comments_mut(|comments| comments.push(comment.clone()))
    }

    async fn find_by_id(&self, id: &CommentId) -> Result<Option<Comment>, CommentRepositoryError> {
        self.with_comments_mut(|comments| comments.iter().find(|c| c.id == *id).cloned())
    }

    async fn list_for_manuscript(
        &self,
        manuscript: &InventoryCode,
        status: CommentStatus,
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        self.filtered(|c| c.manuscript == *manuscript && c.status == status)
    }

    async fn list_by_status(
        &self,
        status: CommentStatus,
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        self.filtered(|c| c.status == status)
    }

    async fn set_status(
        &self,
        id: &CommentId,
        status: CommentStatus,
    ) -> Result<bool, CommentRepositoryError> {
        self.with_comments_mut(|comments| {
            comments
                .iter_mut()
                .find(|c| c.id == *id)
                .map(|comment| comment.status = status)
                .is_some()
        })
    }
}
