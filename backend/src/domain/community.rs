//! Reader contributions: manuscript comments and guestbook entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{InventoryCode, UserId};

/// Longest accepted comment body, in characters.
pub const COMMENT_BODY_MAX: usize = 2_000;
/// Longest accepted guestbook signer name, in characters.
pub const GUESTBOOK_NAME_MAX: usize = 80;
/// Longest accepted guestbook origin, in characters.
pub const GUESTBOOK_ORIGIN_MAX: usize = 120;
/// Longest accepted guestbook message, in characters.
pub const GUESTBOOK_MESSAGE_MAX: usize = 1_000;

/// Validation errors for comment and guestbook input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommunityValidationError {
    /// A required text field was blank once trimmed.
    Empty { field: &'static str },
    /// A text field exceeded its character limit.
    TooLong { field: &'static str, max: usize },
}

impl fmt::Display for CommunityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{field} must not be empty"),
            Self::TooLong { field, max } => {
                write!(f, "{field} must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for CommunityValidationError {}

/// Administrator decision on a pending profile or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewDecision {
    /// Accept the submission.
    Approve,
    /// Decline the submission.
    Reject,
}

/// Moderation state of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    /// Awaiting moderation; hidden from readers.
    Pending,
    /// Visible in the manuscript thread.
    Approved,
    /// Hidden permanently.
    Rejected,
}

impl CommentStatus {
    /// Wire representation stored in the `comments` table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl From<ReviewDecision> for CommentStatus {
    fn from(value: ReviewDecision) -> Self {
        match value {
            ReviewDecision::Approve => Self::Approved,
            ReviewDecision::Reject => Self::Rejected,
        }
    }
}

/// Comment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(Uuid);

impl CommentId {
    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reader comment attached to a manuscript, optionally replying to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub manuscript: InventoryCode,
    pub author_id: UserId,
    pub author_name: String,
    pub parent_id: Option<CommentId>,
    pub body: String,
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
}

/// Approved comment with its visible replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
}

/// Validate and normalise a comment body.
pub fn comment_body(raw: &str) -> Result<String, CommunityValidationError> {
    bounded_text("comment", raw, COMMENT_BODY_MAX)
}

/// Guestbook entry left by a visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestbookEntry {
    pub id: Uuid,
    pub name: String,
    pub origin: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Validated guestbook submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestbookDraft {
    name: String,
    origin: Option<String>,
    message: String,
}

impl GuestbookDraft {
    /// Validate raw form input.
    ///
    /// # Examples
    /// ```
    /// use portal::domain::GuestbookDraft;
    ///
    /// let draft = GuestbookDraft::try_new(" Ayu ", Some(" "), "Lovely collection").unwrap();
    /// assert_eq!(draft.name(), "Ayu");
    /// assert_eq!(draft.origin(), None);
    /// ```
    pub fn try_new(
        name: &str,
        origin: Option<&str>,
        message: &str,
    ) -> Result<Self, CommunityValidationError> {
        let name = bounded_text("name", name, GUESTBOOK_NAME_MAX)?;
        let origin = match origin.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Some(bounded_text("origin", value, GUESTBOOK_ORIGIN_MAX)?),
            None => None,
        };
        let message = bounded_text("message", message, GUESTBOOK_MESSAGE_MAX)?;
        Ok(Self {
            name,
            origin,
            message,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stamp the draft with an identifier and creation time.
    pub fn into_entry(self, id: Uuid, created_at: DateTime<Utc>) -> GuestbookEntry {
        GuestbookEntry {
            id,
            name: self.name,
            origin: self.origin,
            message: self.message,
            created_at,
        }
    }
}

fn bounded_text(
    field: &'static str,
    raw: &str,
    max: usize,
) -> Result<String, CommunityValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CommunityValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(CommunityValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("  hello ", Ok("hello".to_owned()))]
    #[case("   ", Err(CommunityValidationError::Empty { field: "comment" }))]
    fn comment_body_is_trimmed(
        #[case] raw: &str,
        #[case] expected: Result<String, CommunityValidationError>,
    ) {
        assert_eq!(comment_body(raw), expected);
    }

    #[test]
    fn comment_body_counts_characters_not_bytes() {
        let accented = "é".repeat(COMMENT_BODY_MAX);
        assert!(comment_body(&accented).is_ok());
        assert_eq!(
            comment_body(&format!("{accented}é")),
            Err(CommunityValidationError::TooLong {
                field: "comment",
                max: COMMENT_BODY_MAX
            })
        );
    }

    #[rstest]
    #[case("", None, "hi", CommunityValidationError::Empty { field: "name" })]
    #[case("Ayu", None, " ", CommunityValidationError::Empty { field: "message" })]
    fn guestbook_requires_name_and_message(
        #[case] name: &str,
        #[case] origin: Option<&str>,
        #[case] message: &str,
        #[case] expected: CommunityValidationError,
    ) {
        assert_eq!(GuestbookDraft::try_new(name, origin, message), Err(expected));
    }

    #[test]
    fn guestbook_origin_is_bounded() {
        let origin = "x".repeat(GUESTBOOK_ORIGIN_MAX + 1);
        assert_eq!(
            GuestbookDraft::try_new("Ayu", Some(&origin), "hi"),
            Err(CommunityValidationError::TooLong {
                field: "origin",
                max: GUESTBOOK_ORIGIN_MAX
            })
        );
    }

    #[rstest]
    #[case(ReviewDecision::Approve, CommentStatus::Approved)]
    #[case(ReviewDecision::Reject, CommentStatus::Rejected)]
    fn decisions_map_to_comment_status(
        #[case] decision: ReviewDecision,
        #[case] expected: CommentStatus,
    ) {
        assert_eq!(CommentStatus::from(decision), expected);
    }
}
