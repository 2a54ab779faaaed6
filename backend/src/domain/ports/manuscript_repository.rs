//! Port for manuscript catalogue persistence.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{InventoryCode, Manuscript, ManuscriptQuery};

use super::define_port_error;

define_port_error! {
    /// Errors raised by manuscript repository adapters.
    pub enum ManuscriptRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "manuscript repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "manuscript repository query failed: {message}",
    }
}

/// Catalogue storage keyed by inventory code.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManuscriptRepository: Send + Sync {
    /// Search the catalogue, ordered by inventory code.
    async fn search(
        &self,
        query: &ManuscriptQuery,
    ) -> Result<Vec<Manuscript>, ManuscriptRepositoryError>;

    /// Fetch one manuscript.
    async fn find_by_code(
        &self,
        code: &InventoryCode,
    ) -> Result<Option<Manuscript>, ManuscriptRepositoryError>;

    /// Insert or replace records by inventory code in one request.
    ///
    /// Returns the number of records written.
    async fn upsert_many(
        &self,
        manuscripts: &[Manuscript],
    ) -> Result<usize, ManuscriptRepositoryError>;

    /// Delete one manuscript. Returns `false` when it did not exist.
    async fn delete(&self, code: &InventoryCode) -> Result<bool, ManuscriptRepositoryError>;

    /// Every record in the catalogue, ordered by inventory code.
    async fn list_all(&self) -> Result<Vec<Manuscript>, ManuscriptRepositoryError>;
}

/// In-memory catalogue for tests and offline runs.
#[derive(Debug, Default)]
pub struct FixtureManuscriptRepository {
    records: Mutex<BTreeMap<InventoryCode, Manuscript>>,
}

impl FixtureManuscriptRepository {
    /// Seed the catalogue.
    pub fn with_manuscripts(manuscripts: impl IntoIterator<Item = Manuscript>) -> Self {
        let records = manuscripts
            .into_iter()
            .map(|manuscript| (manuscript.inventory_code.clone(), manuscript))
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }

    fn with_records<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<InventoryCode, Manuscript>) -> R,
    ) -> Result<R, ManuscriptRepositoryError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| ManuscriptRepositoryError::query("fixture catalogue poisoned"))?;
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl ManuscriptRepository for FixtureManuscriptRepository {
    async fn search(
        &self,
        query: &ManuscriptQuery,
    ) -> Result<Vec<Manuscript>, ManuscriptRepositoryError> {
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit()).unwrap_or(usize::MAX);
        self.with_records(|records| {
            records
                .values()
                .filter(|manuscript| query.matches(manuscript))
                .skip(offset)
                .take(limit)
                .cloned()
                .collect()
        })
    }

    async fn find_by_code(
        &self,
        code: &InventoryCode,
    ) -> Result<Option<Manuscript>, ManuscriptRepositoryError> {
        self.with_records(|records| records.get(code).cloned())
    }

    async fn upsert_many(
        &self,
        manuscripts: &[Manuscript],
    ) -> Result<usize, ManuscriptRepositoryError> {
        self.with_records(|records| {
            for manuscript in manuscripts {
                records.insert(manuscript.inventory_code.clone(), manuscript.clone());
            }
            manuscripts.len()
        })
    }

    async fn delete(&self, code: &InventoryCode) -> Result<bool, ManuscriptRepositoryError> {
        self.with_records(|records| records.remove(code).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Manuscript>, ManuscriptRepositoryError> {
        self.with_records(|records| records.values().cloned().collect())
    }
}
