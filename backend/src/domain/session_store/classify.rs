//! Decide whether a session change warrants a visible loading transition.

use std::time::Duration;

use crate::domain::{AuthEventKind, UserId};

/// Loading decision for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) show: bool,
    pub(crate) floor: Duration,
}

impl Transition {
    const QUIET: Self = Self {
        show: false,
        floor: Duration::ZERO,
    };

    fn visible(floor: Duration) -> Self {
        Self { show: true, floor }
    }
}

/// Classify `kind` given the previously seen and the incoming user.
///
/// Only identity changes are visible. Token refreshes, account updates,
/// and repeat sign-ins of the same user stay quiet with a zero floor.
pub(crate) fn classify(
    kind: AuthEventKind,
    previous: Option<&UserId>,
    incoming: Option<&UserId>,
    standard_floor: Duration,
) -> Transition {
    match kind {
        AuthEventKind::InitialSession if incoming.is_some() => {
            Transition::visible(standard_floor)
        }
        AuthEventKind::SignedIn if incoming.is_some() && incoming != previous => {
            Transition::visible(standard_floor)
        }
        AuthEventKind::SignedOut | AuthEventKind::UserDeleted => {
            Transition::visible(standard_floor)
        }
        _ => Transition::QUIET,
    }
}
