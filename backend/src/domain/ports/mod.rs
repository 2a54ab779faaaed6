//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod comment_repository;
mod guestbook_repository;
mod manuscript_repository;
mod profile_repository;
mod session_source;
mod text_completion_source;

#[cfg(test)]
pub use comment_repository::MockCommentRepository;
pub use comment_repository::{
    CommentRepository, CommentRepositoryError, FixtureCommentRepository,
};
#[cfg(test)]
pub use guestbook_repository::MockGuestbookRepository;
pub use guestbook_repository::{
    FixtureGuestbookRepository, GuestbookRepository, GuestbookRepositoryError,
};
#[cfg(test)]
pub use manuscript_repository::MockManuscriptRepository;
pub use manuscript_repository::{
    FixtureManuscriptRepository, ManuscriptRepository, ManuscriptRepositoryError,
};
#[cfg(test)]
pub use profile_repository::MockProfileRepository;
pub use profile_repository::{
    FixtureProfileRepository, ProfileRepository, ProfileRepositoryError,
};
#[cfg(test)]
pub use session_source::MockSessionSource;
pub use session_source::{
    AUTH_CHANGE_CAPACITY, FixtureSessionSource, SessionSource, SessionSourceError,
};
#[cfg(test)]
pub use text_completion_source::MockTextCompletionSource;
pub use text_completion_source::{
    CompletionPrompt, CompletionStream, FixtureTextCompletionSource, TextCompletionError,
    TextCompletionSource,
};
