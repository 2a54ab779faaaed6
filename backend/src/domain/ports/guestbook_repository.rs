//! Port for guestbook persistence.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::GuestbookEntry;

use super::define_port_error;

define_port_error! {
    /// Errors raised by guestbook repository adapters.
    pub enum GuestbookRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "guestbook repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "guestbook repository query failed: {message}",
    }
}

/// Guestbook storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuestbookRepository: Send + Sync {
    /// Store a new entry.
    async fn insert(&self, entry: &GuestbookEntry) -> Result<(), GuestbookRepositoryError>;

    /// Newest entries first, at most `limit`.
    async fn list_recent(&self, limit: u32)
    -> Result<Vec<GuestbookEntry>, GuestbookRepositoryError>;

    /// Delete one entry. Returns `false` when it does not exist.
    async fn delete(&self, id: &Uuid) -> Result<bool, GuestbookRepositoryError>;
}

/// In-memory guestbook for tests and offline runs.
#[derive(Debug, Default)]
pub struct FixtureGuestbookRepository {
    entries: Mutex<Vec<GuestbookEntry>>,
}

#[async_trait]
impl GuestbookRepository for FixtureGuestbookRepository {
    async fn insert(&self, entry: &GuestbookEntry) -> Result<(), GuestbookRepositoryError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| GuestbookRepositoryError::query("fixture guestbook poisoned"))?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        limit: u32,
    ) -> Result<Vec<GuestbookEntry>, GuestbookRepositoryError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| GuestbookRepositoryError::query("fixture guestbook poisoned"))?;
        let mut recent = entries.clone();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(recent)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, GuestbookRepositoryError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| GuestbookRepositoryError::query("fixture guestbook poisoned"))?;
        let before = entries.len();
        entries.retain(|entry| entry.id != *id);
        Ok(entries.len() != before)
    }
}
