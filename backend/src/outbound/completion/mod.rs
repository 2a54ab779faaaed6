//! Text-completion outbound adapter.
//!
//! Implements the `TextCompletionSource` port against a chat-completions
//! endpoint that streams server-sent events.

mod dto;
mod http_source;

pub use http_source::HttpCompletionSource;
