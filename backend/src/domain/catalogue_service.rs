//! Manuscript catalogue use-cases: public browsing and admin maintenance.

use std::sync::Arc;

use tracing::info;

use crate::domain::manuscript_sheet::{decode_rows, encode_row, validate_header};
use crate::domain::port_errors::map_manuscript_error;
use crate::domain::ports::ManuscriptRepository;
use crate::domain::{
    Area, Error, ImportReport, InventoryCode, Manuscript, ManuscriptQuery, Role, SheetRow,
    require_area,
};

/// Catalogue service over a manuscript repository.
#[derive(Clone)]
pub struct CatalogueService<R> {
    manuscripts: Arc<R>,
}

impl<R> CatalogueService<R> {
    /// Create a new service with the given repository.
    pub fn new(manuscripts: Arc<R>) -> Self {
        Self { manuscripts }
    }
}

impl<R> CatalogueService<R>
where
    R: ManuscriptRepository,
{
    /// Public search.
    pub async fn search(&self, query: &ManuscriptQuery) -> Result<Vec<Manuscript>, Error> {
        self.manuscripts
            .search(query)
            .await
            .map_err(map_manuscript_error)
    }

    /// Public lookup by inventory code.
    pub async fn get(&self, code: &InventoryCode) -> Result<Manuscript, Error> {
        self.manuscripts
            .find_by_code(code)
            .await
            .map_err(map_manuscript_error)?
            .ok_or_else(|| Error::not_found(format!("manuscript {code} not found")))
    }

    /// Create or replace one record.
    pub async fn save(&self, role: Role, manuscript: Manuscript) -> Result<Manuscript, Error> {
        require_area(role, Area::Admin)?;
        manuscript
            .validate()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        self.manuscripts
            .upsert_many(std::slice::from_ref(&manuscript))
            .await
            .map_err(map_manuscript_error)?;
        info!(code = %manuscript.inventory_code, "manuscript saved");
        Ok(manuscript)
    }

    /// Remove one record.
    pub async fn delete(&self, role: Role, code: &InventoryCode) -> Result<(), Error> {
        require_area(role, Area::Admin)?;
        let removed = self
            .manuscripts
            .delete(code)
            .await
            .map_err(map_manuscript_error)?;
        if !removed {
            return Err(Error::not_found(format!("manuscript {code} not found")));
        }
        info!(%code, "manuscript deleted");
        Ok(())
    }

    /// Bulk upsert from spreadsheet rows.
    ///
    /// Header problems reject the whole file. Invalid rows are reported and
    /// skipped; the remaining records are written in a single call, with the
    /// last row winning for duplicate codes.
    pub async fn import_rows(&self, role: Role, rows: &[SheetRow]) -> Result<ImportReport, Error> {
        require_area(role, Area::Admin)?;
        if rows.is_empty() {
            return Ok(ImportReport::default());
        }
        validate_header(rows)?;

        let decoded = decode_rows(rows);
        let upserted = if decoded.records.is_empty() {
            0
        } else {
            self.manuscripts
                .upsert_many(&decoded.records)
                .await
                .map_err(map_manuscript_error)?
        };
        info!(
            rows = rows.len(),
            upserted,
            rejected = decoded.rejected.len(),
            "catalogue import finished"
        );
        Ok(ImportReport {
            upserted,
            rejected: decoded.rejected,
        })
    }

    /// Every record as a spreadsheet row, sorted by inventory code.
    pub async fn export_rows(&self, role: Role) -> Result<Vec<SheetRow>, Error> {
        require_area(role, Area::Admin)?;
        let mut manuscripts = self
            .manuscripts
            .list_all()
            .await
            .map_err(map_manuscript_error)?;
        manuscripts.sort_by(|a, b| a.inventory_code.cmp(&b.inventory_code));
        Ok(manuscripts.iter().map(encode_row).collect())
    }
}
