//! Port for the generative text-completion service.
//!
//! Answers arrive as a stream of text chunks so callers can render them as
//! they are produced. Errors may surface when opening the stream or between
//! chunks.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use super::define_port_error;

define_port_error! {
    /// Errors raised by text-completion adapters.
    pub enum TextCompletionError {
        /// The completion endpoint could not be reached.
        Transport { message: String } =>
            "completion transport failed: {message}",
        /// The endpoint answered with a non-success status.
        Status { status: u16, body: String } =>
            "completion service returned status {status}: {body}",
        /// A streamed event could not be decoded.
        Decode { message: String } =>
            "completion stream could not be decoded: {message}",
    }
}

/// Stream of answer chunks.
pub type CompletionStream = BoxStream<'static, Result<String, TextCompletionError>>;

/// Two-part prompt sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPrompt {
    /// Instructions and grounding context.
    pub system: String,
    /// The reader's question.
    pub user: String,
}

/// Streaming text-completion service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextCompletionSource: Send + Sync {
    /// Open a streamed answer to `prompt`.
    async fn stream_answer(
        &self,
        prompt: &CompletionPrompt,
    ) -> Result<CompletionStream, TextCompletionError>;
}

/// Source replaying a fixed list of chunks for every prompt.
#[derive(Debug, Clone, Default)]
pub struct FixtureTextCompletionSource {
    chunks: Vec<String>,
}

impl FixtureTextCompletionSource {
    /// Replay `chunks` in order.
    pub fn new(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl TextCompletionSource for FixtureTextCompletionSource {
    async fn stream_answer(
        &self,
        _prompt: &CompletionPrompt,
    ) -> Result<CompletionStream, TextCompletionError> {
        Ok(stream::iter(self.chunks.clone().into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn fixture_replays_chunks_in_order() {
        let source = FixtureTextCompletionSource::new(["Ser", "at"]);
        let prompt = CompletionPrompt {
            system: String::new(),
            user: "?".to_owned(),
        };
        let chunks: Vec<String> = source
            .stream_answer(&prompt)
            .await
            .expect("stream opens")
            .try_collect()
            .await
            .expect("chunks");
        assert_eq!(chunks, ["Ser", "at"]);
    }

    #[test]
    fn status_error_formats_body() {
        let err = TextCompletionError::status(429_u16, "slow down");
        assert_eq!(
            err.to_string(),
            "completion service returned status 429: slow down"
        );
    }
}
