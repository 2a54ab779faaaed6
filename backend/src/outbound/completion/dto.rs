//! Chat-completion request and streamed-delta shapes.

use serde::{Deserialize, Serialize};

use crate::domain::ports::CompletionPrompt;

#[derive(Debug, Serialize)]
pub(super) struct ChatRequestDto<'a> {
    pub(super) model: &'a str,
    pub(super) stream: bool,
    pub(super) messages: [ChatMessageDto<'a>; 2],
}

#[derive(Debug, Serialize)]
pub(super) struct ChatMessageDto<'a> {
    pub(super) role: &'static str,
    pub(super) content: &'a str,
}

impl<'a> ChatRequestDto<'a> {
    pub(super) fn streaming(model: &'a str, prompt: &'a CompletionPrompt) -> Self {
        Self {
            model,
            stream: true,
            messages: [
                ChatMessageDto {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessageDto {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChunkDto {
    #[serde(default)]
    choices: Vec<ChoiceDto>,
}

#[derive(Debug, Deserialize)]
struct ChoiceDto {
    #[serde(default)]
    delta: DeltaDto,
}

#[derive(Debug, Default, Deserialize)]
struct DeltaDto {
    #[serde(default)]
    content: Option<String>,
}

impl ChatChunkDto {
    /// Text carried by the first choice, if any.
    pub(super) fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
    }
}
