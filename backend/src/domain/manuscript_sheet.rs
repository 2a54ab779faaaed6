//! Spreadsheet row codec for bulk catalogue import and export.
//!
//! Rows arrive as JSON objects keyed by the spreadsheet header, the shape
//! spreadsheet readers emit. Row numbers in reports are 1-based with the
//! header on row 1, so the first data row is row 2.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::domain::{Error, InventoryCode, Manuscript};

/// Column names in export order.
pub const SHEET_COLUMNS: [&str; 11] = [
    "inventory_code",
    "title",
    "author",
    "language",
    "script",
    "material",
    "page_count",
    "date_text",
    "collection",
    "summary",
    "image_url",
];

const REQUIRED_COLUMNS: [&str; 2] = ["inventory_code", "title"];
const FIRST_DATA_ROW: usize = 2;

/// One spreadsheet row keyed by column name.
pub type SheetRow = Map<String, Value>;

/// Data row skipped during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// Spreadsheet row number (header is row 1).
    pub row: usize,
    /// Why the row was skipped.
    pub reason: String,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Records written (after collapsing duplicate codes).
    pub upserted: usize,
    /// Rows skipped with their reasons.
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Default)]
pub(crate) struct DecodedSheet {
    pub(crate) records: Vec<Manuscript>,
    pub(crate) rejected: Vec<RejectedRow>,
}

/// Check that every column is known and the key columns are present.
///
/// The header is the union of keys across rows; readers omit empty cells
/// from individual rows.
pub(crate) fn validate_header(rows: &[SheetRow]) -> Result<(), Error> {
    let header: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let unknown: Vec<&str> = header
        .iter()
        .copied()
        .filter(|column| !SHEET_COLUMNS.contains(column))
        .collect();
    if !unknown.is_empty() {
        return Err(Error::invalid_request(format!(
            "unknown spreadsheet columns: {}",
            unknown.join(", ")
        ))
        .with_details(json!({ "unknown_columns": unknown })));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|column| !header.contains(column))
        .collect();
    if !missing.is_empty() {
        return Err(Error::invalid_request(format!(
            "spreadsheet is missing required columns: {}",
            missing.join(", ")
        ))
        .with_details(json!({ "missing_columns": missing })));
    }
    Ok(())
}

/// Decode data rows, collapsing duplicate codes so the last row wins.
pub(crate) fn decode_rows(rows: &[SheetRow]) -> DecodedSheet {
    let mut decoded = DecodedSheet::default();
    let mut positions: HashMap<InventoryCode, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + FIRST_DATA_ROW;
        match decode_row(row) {
            Ok(manuscript) => match positions.get(&manuscript.inventory_code) {
                Some(&position) => decoded.records[position] = manuscript,
                None => {
                    positions.insert(manuscript.inventory_code.clone(), decoded.records.len());
                    decoded.records.push(manuscript);
                }
            },
            Err(reason) => decoded.rejected.push(RejectedRow {
                row: row_number,
                reason,
            }),
        }
    }
    decoded
}

fn decode_row(row: &SheetRow) -> Result<Manuscript, String> {
    let code = text_cell(row, "inventory_code")?.unwrap_or_default();
    let code = InventoryCode::new(code).map_err(|err| err.to_string())?;
    let title = text_cell(row, "title")?.unwrap_or_default();
    let mut manuscript = Manuscript::new(code, title).map_err(|err| err.to_string())?;

    manuscript.author = text_cell(row, "author")?;
    manuscript.language = text_cell(row, "language")?;
    manuscript.script = text_cell(row, "script")?;
    manuscript.material = text_cell(row, "material")?;
    manuscript.page_count = page_count_cell(row)?;
    manuscript.date_text = text_cell(row, "date_text")?;
    manuscript.collection = text_cell(row, "collection")?;
    manuscript.summary = text_cell(row, "summary")?;
    manuscript.image_url = text_cell(row, "image_url")?;
    manuscript.validate().map_err(|err| err.to_string())?;
    Ok(manuscript)
}

fn text_cell(row: &SheetRow, column: &str) -> Result<Option<String>, String> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(Value::Array(_) | Value::Object(_)) => {
            Err(format!("{column} must be a text or number cell"))
        }
    }
}

fn page_count_cell(row: &SheetRow) -> Result<Option<u32>, String> {
    let invalid = || "page_count must be a positive whole number".to_owned();
    let count = match row.get("page_count") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_u64().ok_or_else(invalid)?,
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
        Some(Value::String(text)) => text.trim().parse::<u64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };
    match u32::try_from(count) {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(count) => Ok(Some(count)),
    }
}

/// Render a manuscript as a row with every column in export order.
pub(crate) fn encode_row(manuscript: &Manuscript) -> SheetRow {
    let text = |value: &Option<String>| Value::String(value.clone().unwrap_or_default());
    let mut row = SheetRow::new();
    row.insert(
        "inventory_code".to_owned(),
        Value::String(manuscript.inventory_code.to_string()),
    );
    row.insert("title".to_owned(), Value::String(manuscript.title.clone()));
    row.insert("author".to_owned(), text(&manuscript.author));
    row.insert("language".to_owned(), text(&manuscript.language));
    row.insert("script".to_owned(), text(&manuscript.script));
    row.insert("material".to_owned(), text(&manuscript.material));
    row.insert(
        "page_count".to_owned(),
        manuscript
            .page_count
            .map_or_else(|| Value::String(String::new()), Value::from),
    );
    row.insert("date_text".to_owned(), text(&manuscript.date_text));
    row.insert("collection".to_owned(), text(&manuscript.collection));
    row.insert("summary".to_owned(), text(&manuscript.summary));
    row.insert("image_url".to_owned(), text(&manuscript.image_url));
    row
}
