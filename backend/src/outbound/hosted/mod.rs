//! Hosted backend adapters.
//!
//! One [`HostedClient`] talks to the project's auth endpoints and its
//! PostgREST data interface. The session source installs the signed-in
//! user's token on the shared client, so repositories built from clones of
//! the same client run as that user.

mod client;
mod comment_repository;
mod dto;
mod guestbook_repository;
mod manuscript_repository;
mod profile_repository;
mod session_source;

use std::fmt::Display;

pub use client::HostedClient;
pub use comment_repository::HostedCommentRepository;
pub use guestbook_repository::HostedGuestbookRepository;
pub use manuscript_repository::HostedManuscriptRepository;
pub use profile_repository::HostedProfileRepository;
pub use session_source::HostedSessionSource;

const PREFER_MINIMAL: &str = "return=minimal";
const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";

/// PostgREST equality filter value.
fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

/// PostgREST `or` filter matching `term` case-insensitively in any column.
///
/// The pattern is double-quoted so commas and parentheses in the term stay
/// literal.
fn ilike_any(columns: &[&str], term: &str) -> String {
    let escaped = term.replace('\\', r"\\").replace('"', "\\\"");
    let clauses = columns
        .iter()
        .map(|column| format!("{column}.ilike.\"*{escaped}*\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("({clauses})")
}
