//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **hosted**: auth and PostgREST tables of the hosted backend
//! - **completion**: streamed answers from the text-completion service
//!
//! Adapters are thin translators between domain types and wire
//! representations. They contain no business logic.

pub mod completion;
pub mod hosted;
