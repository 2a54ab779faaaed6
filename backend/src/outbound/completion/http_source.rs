//! Reqwest-backed chat-completion adapter.
//!
//! Posts one streaming request and turns the server-sent-event body into a
//! stream of text chunks. Only `data:` lines are read; `data: [DONE]` ends the
//! stream.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Url};
use zeroize::Zeroizing;

use super::dto::{ChatChunkDto, ChatRequestDto};
use crate::domain::ports::{
    CompletionPrompt, CompletionStream, TextCompletionError, TextCompletionSource,
};

const DONE_MARKER: &str = "[DONE]";

/// Completion source posting to one chat-completions endpoint.
pub struct HttpCompletionSource {
    client: Client,
    endpoint: Url,
    api_key: Zeroizing<String>,
    model: String,
}

impl HttpCompletionSource {
    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: Zeroizing::new(api_key.into()),
            model: model.into(),
        })
    }
}

#[async_trait]
impl TextCompletionSource for HttpCompletionSource {
    async fn stream_answer(
        &self,
        prompt: &CompletionPrompt,
    ) -> Result<CompletionStream, TextCompletionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.as_str())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&ChatRequestDto::streaming(&self.model, prompt))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.map_err(map_transport_error)?;
            return Err(TextCompletionError::status(
                status.as_u16(),
                body_preview(body.as_ref()),
            ));
        }
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(answer_chunks(bytes))
    }
}

type ByteStream = BoxStream<'static, Result<Vec<u8>, reqwest::Error>>;

struct ChunkState {
    bytes: ByteStream,
    decoder: SseDecoder,
    ready: VecDeque<Result<String, TextCompletionError>>,
    finished: bool,
}

impl ChunkState {
    /// Queue the text of each decoded event. Returns `true` once the stream
    /// has ended or failed.
    fn absorb(&mut self, events: Vec<SseEvent>) -> bool {
        for event in events {
            match event {
                SseEvent::Done => return true,
                SseEvent::Data(payload) => match decode_delta(&payload) {
                    Ok(Some(text)) => self.ready.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(error) => {
                        self.ready.push_back(Err(error));
                        return true;
                    }
                },
            }
        }
        false
    }
}

fn answer_chunks(bytes: ByteStream) -> CompletionStream {
    let state = ChunkState {
        bytes,
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.finished = state.absorb(events);
                }
                Some(Err(error)) => {
                    state.finished = true;
                    state.ready.push_back(Err(map_transport_error(error)));
                }
                None => {
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

fn decode_delta(payload: &str) -> Result<Option<String>, TextCompletionError> {
    serde_json::from_str::<ChatChunkDto>(payload)
        .map(ChatChunkDto::into_text)
        .map_err(|error| TextCompletionError::decode(format!("invalid completion event: {error}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into `data:` payloads, tolerating chunk boundaries
/// anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            events.extend(parse_line(&line));
        }
        events
    }

    fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.pending);
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(line);
    let payload = text.trim_end_matches(['\r', '\n']).strip_prefix("data:")?;
    let payload = payload.trim();
    if payload == DONE_MARKER {
        Some(SseEvent::Done)
    } else if payload.is_empty() {
        None
    } else {
        Some(SseEvent::Data(payload.to_owned()))
    }
}

fn map_transport_error(error: reqwest::Error) -> TextCompletionError {
    TextCompletionError::transport(error.to_string())
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    compact.chars().take(PREVIEW_CHAR_LIMIT).collect()
}
