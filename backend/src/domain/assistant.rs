//! Reader questions about a manuscript, answered by a completion service.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::warn;

use crate::domain::ports::{CompletionPrompt, TextCompletionSource};
use crate::domain::{Error, Manuscript};

/// Longest accepted question, in characters.
pub const QUESTION_MAX: usize = 1_000;

/// Answer shown when the completion service fails or says nothing.
pub const DEFAULT_APOLOGY: &str =
    "Sorry, the assistant cannot answer right now. Please try again later.";

const SYSTEM_PREAMBLE: &str = "You are a librarian at a manuscript archive. Answer the \
reader's question using the catalogue record below. If the record does not contain the \
answer, say so briefly instead of guessing.";

/// Build the prompt for `question` about `manuscript`.
///
/// Only the descriptive fields are shared with the service: inventory code,
/// title, author, language, script, dating, and summary.
pub fn build_prompt(question: &str, manuscript: &Manuscript) -> CompletionPrompt {
    let mut system = String::from(SYSTEM_PREAMBLE);
    system.push_str("\n\n");
    let fields = [
        ("Inventory code", Some(manuscript.inventory_code.as_ref())),
        ("Title", Some(manuscript.title.as_str())),
        ("Author", manuscript.author.as_deref()),
        ("Language", manuscript.language.as_deref()),
        ("Script", manuscript.script.as_deref()),
        ("Date", manuscript.date_text.as_deref()),
        ("Summary", manuscript.summary.as_deref()),
    ];
    for (label, value) in fields {
        system.push_str(&format!("{label}: {}\n", value.unwrap_or("unknown")));
    }
    CompletionPrompt {
        system,
        user: question.to_owned(),
    }
}

/// Streams answers to reader questions.
#[derive(Clone)]
pub struct ManuscriptAssistant<T> {
    source: Arc<T>,
    apology: String,
}

impl<T> ManuscriptAssistant<T> {
    /// Create an assistant that answers with `apology` when the service fails.
    pub fn new(source: Arc<T>, apology: impl Into<String>) -> Self {
        Self {
            source,
            apology: apology.into(),
        }
    }
}

impl<T> ManuscriptAssistant<T>
where
    T: TextCompletionSource,
{
    /// Ask `question` about `manuscript`, forwarding each chunk to `on_chunk`.
    ///
    /// Returns the full answer. Service failures are logged and answered with
    /// the apology, which is forwarded to `on_chunk` as well. Only an invalid
    /// question is an error.
    pub async fn ask(
        &self,
        question: &str,
        manuscript: &Manuscript,
        mut on_chunk: impl FnMut(&str) + Send,
    ) -> Result<String, Error> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::invalid_request("question must not be empty"));
        }
        if question.chars().count() > QUESTION_MAX {
            return Err(Error::invalid_request(format!(
                "question must be at most {QUESTION_MAX} characters"
            )));
        }

        let prompt = build_prompt(question, manuscript);
        let mut stream = match self.source.stream_answer(&prompt).await {
            Ok(stream) => stream,
            Err(error) => {
                warn!(%error, code = %manuscript.inventory_code, "completion request failed");
                return Ok(self.apologise(&mut on_chunk));
            }
        };

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => {
                    on_chunk(&text);
                    answer.push_str(&text);
                }
                Err(error) => {
                    warn!(%error, code = %manuscript.inventory_code, "completion stream failed");
                    return Ok(self.apologise(&mut on_chunk));
                }
            }
        }

        if answer.trim().is_empty() {
            warn!(code = %manuscript.inventory_code, "completion returned an empty answer");
            return Ok(self.apologise(&mut on_chunk));
        }
        Ok(answer)
    }

    fn apologise(&self, on_chunk: &mut impl FnMut(&str)) -> String {
        on_chunk(&self.apology);
        self.apology.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::InventoryCode;
    use crate::domain::ports::{
        FixtureTextCompletionSource, MockTextCompletionSource, TextCompletionError,
    };
    use futures_util::stream;
    use rstest::{fixture, rstest};

    #[fixture]
    fn manuscript() -> Manuscript {
        let mut manuscript = Manuscript::new(
            InventoryCode::new("PB-042").expect("code"),
            "Serat Centhini",
        )
        .expect("manuscript");
        manuscript.language = Some("Javanese".to_owned());
        manuscript.collection = Some("Shelf 4".to_owned());
        manuscript
    }

    #[rstest]
    fn prompt_carries_descriptive_fields_only(manuscript: Manuscript) {
        let prompt = build_prompt("Who wrote it?", &manuscript);
        assert!(prompt.system.contains(
            "Inventory code: PB-042\nTitle: Serat Centhini\nAuthor: unknown\nLanguage: Javanese\n"
        ));
        assert!(prompt.system.ends_with("Summary: unknown\n"));
        assert!(!prompt.system.contains("Shelf 4"));
        assert_eq!(prompt.user, "Who wrote it?");
    }

    #[rstest]
    #[tokio::test]
    async fn chunks_are_forwarded_and_joined(manuscript: Manuscript) {
        let assistant = ManuscriptAssistant::new(
            Arc::new(FixtureTextCompletionSource::new(["It is ", "Javanese."])),
            DEFAULT_APOLOGY,
        );
        let mut seen = Vec::new();

        let answer = assistant
            .ask("  Which language? ", &manuscript, |chunk| seen.push(chunk.to_owned()))
            .await
            .expect("answer");

        assert_eq!(answer, "It is Javanese.");
        assert_eq!(seen, ["It is ", "Javanese."]);
    }

    #[rstest]
    #[case::open_failure(Err(TextCompletionError::transport("refused")))]
    #[case::mid_stream_failure(Ok(vec![Ok("Partial".to_owned()), Err(TextCompletionError::decode("bad json"))]))]
    #[case::empty_answer(Ok(vec![Ok("  ".to_owned())]))]
    #[tokio::test]
    async fn failures_become_the_apology(
        manuscript: Manuscript,
        #[case] scripted: Result<Vec<Result<String, TextCompletionError>>, TextCompletionError>,
    ) {
        let mut source = MockTextCompletionSource::new();
        source.expect_stream_answer().return_once(move |_| {
            scripted.map(|chunks| stream::iter(chunks).boxed())
        });
        let assistant = ManuscriptAssistant::new(Arc::new(source), "Sorry!");
        let mut seen = Vec::new();

        let answer = assistant
            .ask("Why?", &manuscript, |chunk| seen.push(chunk.to_owned()))
            .await
            .expect("apology is not an error");

        assert_eq!(answer, "Sorry!");
        assert_eq!(seen.last().map(String::as_str), Some("Sorry!"));
    }

    #[rstest]
    #[case("   ".to_owned())]
    #[case("?".repeat(QUESTION_MAX + 1))]
    #[tokio::test]
    async fn invalid_questions_are_rejected(manuscript: Manuscript, #[case] question: String) {
        let mut source = MockTextCompletionSource::new();
        source.expect_stream_answer().never();
        let assistant = ManuscriptAssistant::new(Arc::new(source), DEFAULT_APOLOGY);

        let err = assistant
            .ask(&question, &manuscript, |_| {})
            .await
            .expect_err("invalid question");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}
