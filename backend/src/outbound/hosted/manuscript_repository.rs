//! `manuscripts` table adapter.

use async_trait::async_trait;
use reqwest::Method;

use super::client::{HostedClient, HostedError};
use super::dto::{ManuscriptRow, rows_into_domain};
use super::{PREFER_REPRESENTATION, PREFER_UPSERT, eq, ilike_any};
use crate::domain::ports::{ManuscriptRepository, ManuscriptRepositoryError};
use crate::domain::{InventoryCode, Manuscript, ManuscriptQuery};

const TABLE: &str = "manuscripts";
const SEARCH_COLUMNS: [&str; 4] = ["inventory_code", "title", "author", "summary"];
const ORDER_BY_CODE: &str = "inventory_code.asc";
/// Rows fetched per request when listing the whole catalogue.
const LIST_PAGE: usize = 1_000;

/// Manuscript repository over the hosted REST interface.
#[derive(Clone)]
pub struct HostedManuscriptRepository {
    client: HostedClient,
}

impl HostedManuscriptRepository {
    /// Create a repository sharing `client`.
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }

    async fn fetch(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Vec<Manuscript>, ManuscriptRepositoryError> {
        let request = self
            .client
            .table(Method::GET, TABLE)
            .map_err(map_error)?
            .query(filters);
        let rows: Vec<ManuscriptRow> = self.client.send_json(request).await.map_err(map_error)?;
        rows_into_domain(rows, ManuscriptRow::into_domain).map_err(ManuscriptRepositoryError::query)
    }
}

/// PostgREST filters for a catalogue search.
fn search_filters(query: &ManuscriptQuery) -> Vec<(&'static str, String)> {
    let mut filters = vec![
        ("order", ORDER_BY_CODE.to_owned()),
        ("limit", query.limit().to_string()),
        ("offset", query.offset().to_string()),
    ];
    if let Some(term) = query.term() {
        filters.push(("or", ilike_any(&SEARCH_COLUMNS, term)));
    }
    filters
}

#[async_trait]
impl ManuscriptRepository for HostedManuscriptRepository {
    async fn search(
        &self,
        query: &ManuscriptQuery,
    ) -> Result<Vec<Manuscript>, ManuscriptRepositoryError> {
        self.fetch(&search_filters(query)).await
    }

    async fn find_by_code(
        &self,
        code: &InventoryCode,
    ) -> Result<Option<Manuscript>, ManuscriptRepositoryError> {
        let mut found = self
            .fetch(&[("inventory_code", eq(code)), ("limit", "1".to_owned())])
            .await?;
        Ok(found.pop())
    }

    async fn upsert_many(
        &self,
        manuscripts: &[Manuscript],
    ) -> Result<usize, ManuscriptRepositoryError> {
        if manuscripts.is_empty() {
            return Ok(0);
        }
        let rows: Vec<ManuscriptRow> = manuscripts.iter().map(ManuscriptRow::from).collect();
        let request = self
            .client
            .table(Method::POST, TABLE)
            .map_err(map_error)?
            .query(&[("on_conflict", "inventory_code")])
            .header("Prefer", PREFER_UPSERT)
            .json(&rows);
        self.client.send(request).await.map_err(map_error)?;
        Ok(rows.len())
    }

    async fn delete(&self, code: &InventoryCode) -> Result<bool, ManuscriptRepositoryError> {
        let request = self
            .client
            .table(Method::DELETE, TABLE)
            .map_err(map_error)?
            .query(&[("inventory_code", eq(code))])
            .header("Prefer", PREFER_REPRESENTATION);
        let removed: Vec<ManuscriptRow> = self.client.send_json(request).await.map_err(map_error)?;
        Ok(!removed.is_empty())
    }

    async fn list_all(&self) -> Result<Vec<Manuscript>, ManuscriptRepositoryError> {
        let mut all = Vec::new();
        loop {
            let page = self
                .fetch(&[
                    ("order", ORDER_BY_CODE.to_owned()),
                    ("limit", LIST_PAGE.to_string()),
                    ("offset", all.len().to_string()),
                ])
                .await?;
            let complete = page.len() < LIST_PAGE;
            all.extend(page);
            if complete {
                return Ok(all);
            }
        }
    }
}

fn map_error(error: HostedError) -> ManuscriptRepositoryError {
    if error.is_unavailable() {
        ManuscriptRepositoryError::connection(error.to_string())
    } else {
        ManuscriptRepositoryError::query(error.to_string())
    }
}
