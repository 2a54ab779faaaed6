//! Manuscript archive portal.
//!
//! The [`domain`] holds the session and role synchroniser and the catalogue,
//! community, and assistant services. [`outbound`] adapters talk to the hosted
//! backend and the completion endpoint; [`inbound::cli`] drives everything
//! from the `portal` binary.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod settings;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
