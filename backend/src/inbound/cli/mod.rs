//! Command-line adapter.
//!
//! Parses `portal` subcommands with clap and drives the domain services
//! through [`PortalApp`]. Output is JSON on the given writer, except for
//! `ask`, which streams the answer as plain text. Failures are reported with
//! [`write_error`] as one JSON object. Spreadsheet files for `import` and
//! `export` are JSON arrays of row objects.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{Error, SEARCH_LIMIT_DEFAULT};

mod app;
mod sheet_file;
mod status;

pub use app::{PortalAdapters, PortalApp};
pub use sheet_file::{SheetFileError, read_sheet, write_sheet};
pub use status::StatusView;

/// `portal` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portal",
    about = "Manuscript archive catalogue and community portal",
    version
)]
pub struct Cli {
    /// Action to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Portal subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in and print the synchronised session state.
    Status(SignInArgs),
    /// Create an account with a pending profile.
    Register(RegisterArgs),
    /// Store the profile of a signed-in account that has none.
    CompleteProfile(RegisterArgs),
    /// Search the public catalogue.
    Search {
        /// Text matched against codes, titles, authors, and summaries.
        #[arg(value_name = "term")]
        term: Option<String>,
        /// Results per page.
        #[arg(long, default_value_t = SEARCH_LIMIT_DEFAULT)]
        limit: u32,
        /// Results to skip.
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Print one catalogue record.
    Show {
        /// Inventory code of the manuscript.
        #[arg(value_name = "inventory-code")]
        code: String,
    },
    /// Create or replace a catalogue record.
    Save {
        #[command(flatten)]
        sign_in: SignInArgs,
        #[command(flatten)]
        record: ManuscriptArgs,
    },
    /// Remove a catalogue record.
    Delete {
        #[command(flatten)]
        sign_in: SignInArgs,
        /// Inventory code of the manuscript.
        #[arg(value_name = "inventory-code")]
        code: String,
    },
    /// List members awaiting verification.
    Pending(SignInArgs),
    /// Verify or reject a member.
    Verify {
        #[command(flatten)]
        sign_in: SignInArgs,
        /// Auth user id of the member.
        #[arg(value_name = "user-id")]
        user_id: String,
        /// Reject instead of verifying.
        #[arg(long)]
        reject: bool,
    },
    /// Upsert catalogue records from a spreadsheet file.
    Import {
        #[command(flatten)]
        sign_in: SignInArgs,
        /// JSON spreadsheet export to read.
        #[arg(value_name = "file")]
        file: PathBuf,
    },
    /// Write the whole catalogue to a spreadsheet file.
    Export {
        #[command(flatten)]
        sign_in: SignInArgs,
        /// Destination file; replaced if it exists.
        #[arg(value_name = "file")]
        file: PathBuf,
    },
    /// Ask the assistant a question about one manuscript.
    Ask {
        /// Inventory code of the manuscript.
        #[arg(value_name = "inventory-code")]
        code: String,
        /// Question text.
        #[arg(value_name = "question")]
        question: String,
    },
    /// Print the approved comment thread of a manuscript.
    Thread {
        /// Inventory code of the manuscript.
        #[arg(value_name = "inventory-code")]
        code: String,
    },
    /// Comment on a manuscript, or reply to an approved comment.
    Comment {
        #[command(flatten)]
        sign_in: SignInArgs,
        /// Inventory code of the manuscript.
        #[arg(value_name = "inventory-code")]
        code: String,
        /// Comment text.
        #[arg(value_name = "body")]
        body: String,
        /// Comment being replied to.
        #[arg(long = "reply-to", value_name = "comment-id")]
        reply_to: Option<Uuid>,
    },
    /// List comments awaiting moderation.
    Moderation(SignInArgs),
    /// Approve or reject a comment.
    Moderate {
        #[command(flatten)]
        sign_in: SignInArgs,
        /// Comment to decide on.
        #[arg(value_name = "comment-id")]
        comment_id: Uuid,
        /// Reject instead of approving.
        #[arg(long)]
        reject: bool,
    },
    /// Print the newest guestbook entries.
    Guestbook {
        /// Entries to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Leave a guestbook entry.
    Sign {
        /// Visitor name.
        #[arg(long, value_name = "name")]
        name: String,
        /// Where the visitor is from.
        #[arg(long, value_name = "origin")]
        origin: Option<String>,
        /// Message text.
        #[arg(long, value_name = "message")]
        message: String,
    },
    /// Delete a guestbook entry.
    Unsign {
        #[command(flatten)]
        sign_in: SignInArgs,
        /// Entry to delete.
        #[arg(value_name = "entry-id")]
        entry_id: Uuid,
    },
}

/// Account used for commands that need a signed-in role.
#[derive(Debug, Clone, Args)]
pub struct SignInArgs {
    /// Account email.
    #[arg(long, value_name = "email")]
    pub email: String,
    /// Account password.
    #[arg(long, value_name = "password")]
    pub password: String,
}

/// Account plus profile form, used by `register` and `complete-profile`.
#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub account: SignInArgs,
    /// Full name as it should appear to administrators.
    #[arg(long = "full-name", value_name = "name")]
    pub full_name: String,
    /// City or regency of residence.
    #[arg(long, value_name = "city")]
    pub domicile: String,
    /// School, university, or employer.
    #[arg(long, value_name = "institution")]
    pub institution: String,
    /// Current occupation.
    #[arg(long, value_name = "occupation")]
    pub occupation: String,
    /// Contact number; spaces and dashes are dropped.
    #[arg(long, value_name = "phone")]
    pub phone: String,
    /// Unit or faculty, for alumni.
    #[arg(long = "alumni-unit", value_name = "unit")]
    pub alumni_unit: Option<String>,
    /// Graduation year, for alumni.
    #[arg(long = "alumni-year", value_name = "year", requires = "alumni_unit")]
    pub alumni_year: Option<i32>,
}

/// Catalogue record fields for `save`. Omitted or blank optional fields are
/// cleared.
#[derive(Debug, Clone, Args)]
pub struct ManuscriptArgs {
    /// Inventory code of the manuscript.
    #[arg(value_name = "inventory-code")]
    pub code: String,
    /// Catalogue title.
    #[arg(long, value_name = "title")]
    pub title: String,
    /// Author or scribe.
    #[arg(long, value_name = "author")]
    pub author: Option<String>,
    /// Language of the text.
    #[arg(long, value_name = "language")]
    pub language: Option<String>,
    /// Script the text is written in.
    #[arg(long, value_name = "script")]
    pub script: Option<String>,
    /// Writing support.
    #[arg(long, value_name = "material")]
    pub material: Option<String>,
    /// Number of pages or leaves.
    #[arg(long = "page-count", value_name = "pages")]
    pub page_count: Option<u32>,
    /// Free-form dating.
    #[arg(long = "date", value_name = "date")]
    pub date_text: Option<String>,
    /// Holding collection.
    #[arg(long, value_name = "collection")]
    pub collection: Option<String>,
    /// Catalogue summary.
    #[arg(long, value_name = "summary")]
    pub summary: Option<String>,
    /// Public image URL.
    #[arg(long = "image-url", value_name = "url")]
    pub image_url: Option<String>,
}

/// Failures surfaced by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A domain operation failed.
    #[error(transparent)]
    Domain(#[from] Error),
    /// A spreadsheet file could not be read or written.
    #[error(transparent)]
    Sheet(#[from] SheetFileError),
    /// Output could not be written.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    /// The session never reached a settled state.
    #[error("session did not settle within {seconds}s")]
    Unsettled {
        /// Seconds waited.
        seconds: u64,
    },
}

impl CliError {
    /// The failure as a portal [`Error`], with file or timing context in
    /// `details`.
    pub fn to_report(&self) -> Error {
        match self {
            Self::Domain(error) => error.clone(),
            Self::Sheet(SheetFileError::Format { path, message }) => {
                Error::invalid_request(self.to_string())
                    .with_details(json!({ "file": path, "reason": message }))
            }
            Self::Sheet(SheetFileError::Io { path, .. }) => {
                Error::invalid_request(self.to_string()).with_details(json!({ "file": path }))
            }
            Self::Output(_) => Error::internal(self.to_string()),
            Self::Unsettled { seconds } => Error::service_unavailable(self.to_string())
                .with_details(json!({ "waited_seconds": seconds })),
        }
    }
}

/// Write `error` to `out` as one line of JSON.
///
/// # Errors
///
/// Fails when `out` cannot be written.
pub fn write_error<W: Write>(out: &mut W, error: &CliError) -> io::Result<()> {
    serde_json::to_writer(&mut *out, &error.to_report())?;
    writeln!(out)
}
