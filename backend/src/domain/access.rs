//! Area guards keyed off the derived [`Role`].

use std::fmt;

use crate::domain::{Error, Role};

/// Portal area a caller is trying to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Catalogue browsing, search, and the guestbook.
    Public,
    /// The caller's own account and profile forms.
    Account,
    /// Commenting and other contributor features.
    Contributor,
    /// Back-office CRUD, imports, verification, and moderation.
    Admin,
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Public => "public",
            Self::Account => "account",
            Self::Contributor => "contributor",
            Self::Admin => "admin",
        };
        f.write_str(name)
    }
}

impl Role {
    /// Whether this role may enter `area`.
    pub const fn may_enter(self, area: Area) -> bool {
        match area {
            Area::Public => true,
            Area::Account => !matches!(self, Self::Guest),
            Area::Contributor => matches!(self, Self::VerifiedUser | Self::Admin),
            Area::Admin => matches!(self, Self::Admin),
        }
    }
}

/// Reject callers whose role may not enter `area`.
///
/// Guests are told to sign in; everyone else is forbidden.
pub fn require_area(role: Role, area: Area) -> Result<(), Error> {
    if role.may_enter(area) {
        return Ok(());
    }
    match role {
        Role::Guest => Err(Error::unauthorized(format!(
            "sign in to access the {area} area"
        ))),
        _ => Err(Error::forbidden(format!(
            "role {role} may not access the {area} area"
        ))),
    }
}

#[cfg(test)]
mod tests {
    //! Access matrix coverage.
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(Role::Guest, [true, false, false, false])]
    #[case(Role::Pending, [true, true, false, false])]
    #[case(Role::VerifiedUser, [true, true, true, false])]
    #[case(Role::Admin, [true, true, true, true])]
    fn access_matrix(#[case] role: Role, #[case] expected: [bool; 4]) {
        let areas = [Area::Public, Area::Account, Area::Contributor, Area::Admin];
        for (area, allowed) in areas.into_iter().zip(expected) {
            assert_eq!(role.may_enter(area), allowed, "{role} -> {area}");
            assert_eq!(require_area(role, area).is_ok(), allowed, "{role} -> {area}");
        }
    }

    #[rstest]
    #[case(Role::Guest, ErrorCode::Unauthorized)]
    #[case(Role::Pending, ErrorCode::Forbidden)]
    #[case(Role::VerifiedUser, ErrorCode::Forbidden)]
    fn denial_codes_depend_on_sign_in(#[case] role: Role, #[case] expected: ErrorCode) {
        let err = require_area(role, Area::Admin).expect_err("non-admins are denied");
        assert_eq!(err.code(), expected);
    }
}
