//! Translate port errors into domain [`Error`] values.
//!
//! Connection failures become `service_unavailable`, credential rejections
//! become `unauthorized`, and everything else is `internal_error`.

use crate::domain::Error;
use crate::domain::ports::{
    CommentRepositoryError, GuestbookRepositoryError, ManuscriptRepositoryError,
    ProfileRepositoryError, SessionSourceError,
};

pub(crate) fn map_session_error(error: SessionSourceError) -> Error {
    match error {
        SessionSourceError::Connection { message } => {
            Error::service_unavailable(format!("auth service unavailable: {message}"))
        }
        SessionSourceError::Rejected { message } => Error::unauthorized(message),
        SessionSourceError::Protocol { message } => {
            Error::internal(format!("auth service error: {message}"))
        }
    }
}

pub(crate) fn map_profile_error(error: ProfileRepositoryError) -> Error {
    match error {
        ProfileRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("profile repository unavailable: {message}"))
        }
        ProfileRepositoryError::Query { message } => {
            Error::internal(format!("profile repository error: {message}"))
        }
        ProfileRepositoryError::Duplicate { user_id } => {
            Error::conflict(format!("profile already exists for user {user_id}"))
        }
    }
}

pub(crate) fn map_manuscript_error(error: ManuscriptRepositoryError) -> Error {
    match error {
        ManuscriptRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("manuscript repository unavailable: {message}"))
        }
        ManuscriptRepositoryError::Query { message } => {
            Error::internal(format!("manuscript repository error: {message}"))
        }
    }
}

pub(crate) fn map_comment_error(error: CommentRepositoryError) -> Error {
    match error {
        CommentRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("comment repository unavailable: {message}"))
        }
        CommentRepositoryError::Query { message } => {
            Error::internal(format!("comment repository error: {message}"))
        }
    }
}

pub(crate) fn map_guestbook_error(error: GuestbookRepositoryError) -> Error {
    match error {
        GuestbookRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("guestbook repository unavailable: {message}"))
        }
        GuestbookRepositoryError::Query { message } => {
            Error::internal(format!("guestbook repository error: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(SessionSourceError::connection("timeout"), ErrorCode::ServiceUnavailable)]
    #[case(SessionSourceError::rejected("bad password"), ErrorCode::Unauthorized)]
    #[case(SessionSourceError::protocol("garbled"), ErrorCode::InternalError)]
    fn session_errors_map_by_kind(#[case] error: SessionSourceError, #[case] code: ErrorCode) {
        assert_eq!(map_session_error(error).code(), code);
    }

    #[test]
    fn rejected_credentials_keep_the_service_message() {
        let err = map_session_error(SessionSourceError::rejected("Invalid login credentials"));
        assert_eq!(err.message(), "Invalid login credentials");
    }

    #[rstest]
    #[case(ProfileRepositoryError::connection("down"), ErrorCode::ServiceUnavailable)]
    #[case(ProfileRepositoryError::query("bad"), ErrorCode::InternalError)]
    #[case(ProfileRepositoryError::duplicate("u"), ErrorCode::Conflict)]
    fn profile_errors_map_by_kind(#[case] error: ProfileRepositoryError, #[case] code: ErrorCode) {
        assert_eq!(map_profile_error(error).code(), code);
    }
}
