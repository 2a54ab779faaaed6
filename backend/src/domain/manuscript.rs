//! Manuscript catalogue records keyed by inventory code.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of search results returned per page.
pub const SEARCH_LIMIT_DEFAULT: u32 = 20;
/// Upper bound on search results per page.
pub const SEARCH_LIMIT_MAX: u32 = 100;

/// Validation errors raised while building manuscript records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManuscriptValidationError {
    /// Inventory code was blank once trimmed.
    EmptyInventoryCode,
    /// Title was blank once trimmed.
    EmptyTitle,
    /// Page count was zero.
    ZeroPageCount,
}

impl fmt::Display for ManuscriptValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInventoryCode => write!(f, "inventory code must not be empty"),
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::ZeroPageCount => write!(f, "page count must be positive"),
        }
    }
}

impl std::error::Error for ManuscriptValidationError {}

/// Unique archive inventory code identifying a manuscript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InventoryCode(String);

impl InventoryCode {
    /// Validate and construct a code, trimming surrounding whitespace.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ManuscriptValidationError> {
        let trimmed = code.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ManuscriptValidationError::EmptyInventoryCode);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for InventoryCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for InventoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<InventoryCode> for String {
    fn from(value: InventoryCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for InventoryCode {
    type Error = ManuscriptValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Catalogue record describing one manuscript.
///
/// ## Invariants
/// - `title` is trimmed and non-empty.
/// - `page_count`, when present, is positive.
/// - Optional text fields are `None` rather than blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manuscript {
    /// Unique inventory code.
    pub inventory_code: InventoryCode,
    /// Catalogue title.
    pub title: String,
    /// Author or scribe.
    pub author: Option<String>,
    /// Language of the text.
    pub language: Option<String>,
    /// Script the text is written in.
    pub script: Option<String>,
    /// Writing support (palm leaf, European paper, daluang, ...).
    pub material: Option<String>,
    /// Number of pages or leaves.
    pub page_count: Option<u32>,
    /// Free-form dating (year, era, or range).
    pub date_text: Option<String>,
    /// Holding collection or shelf location.
    pub collection: Option<String>,
    /// Catalogue summary of the contents.
    pub summary: Option<String>,
    /// Public URL of a representative image.
    pub image_url: Option<String>,
}

impl Manuscript {
    /// Build a record with only the required fields set.
    pub fn new(
        inventory_code: InventoryCode,
        title: impl AsRef<str>,
    ) -> Result<Self, ManuscriptValidationError> {
        let title = title.as_ref().trim();
        if title.is_empty() {
            return Err(ManuscriptValidationError::EmptyTitle);
        }
        Ok(Self {
            inventory_code,
            title: title.to_owned(),
            author: None,
            language: None,
            script: None,
            material: None,
            page_count: None,
            date_text: None,
            collection: None,
            summary: None,
            image_url: None,
        })
    }

    /// Re-check invariants on a record assembled field by field.
    pub fn validate(&self) -> Result<(), ManuscriptValidationError> {
        if self.title.trim().is_empty() {
            return Err(ManuscriptValidationError::EmptyTitle);
        }
        if self.page_count == Some(0) {
            return Err(ManuscriptValidationError::ZeroPageCount);
        }
        Ok(())
    }
}

/// Public catalogue search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManuscriptQuery {
    term: Option<String>,
    limit: u32,
    offset: u32,
}

impl ManuscriptQuery {
    /// Search for `term` (blank terms list everything).
    pub fn new(term: Option<&str>) -> Self {
        Self {
            term: term
                .map(str::trim)
                .filter(|term| !term.is_empty())
                .map(str::to_owned),
            limit: SEARCH_LIMIT_DEFAULT,
            offset: 0,
        }
    }

    /// Set the page window; the limit is clamped to `1..=SEARCH_LIMIT_MAX`.
    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit.clamp(1, SEARCH_LIMIT_MAX);
        self.offset = offset;
        self
    }

    /// Normalised search term.
    pub fn term(&self) -> Option<&str> {
        self.term.as_deref()
    }

    /// Maximum number of results.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of results to skip.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Case-insensitive match over code, title, author, and summary.
    pub fn matches(&self, manuscript: &Manuscript) -> bool {
        let Some(term) = self.term.as_deref() else {
            return true;
        };
        let needle = term.to_lowercase();
        [
            Some(manuscript.inventory_code.as_ref()),
            Some(manuscript.title.as_str()),
            manuscript.author.as_deref(),
            manuscript.summary.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
    }
}
