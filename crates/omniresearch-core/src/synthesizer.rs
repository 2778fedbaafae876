//! Report synthesis via the LLM collaborator.

use std::sync::Arc;
use tracing::debug;

use crate::error::ResearchError;
use crate::extract::truncate_chars;
use crate::llm::LlmClient;
use crate::prompts;

/// Advisory confidence attached to every synthesized report. Not computed
/// from evidence quality.
pub const PLACEHOLDER_CONFIDENCE: f64 = 0.7;

/// Per-note character bound inside the synthesis prompt.
const NOTE_CHAR_LIMIT: usize = 1000;

pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Joins the validated evidence into two bullet blocks and asks the model
    /// for the report. An empty note list is legal input; the model is still
    /// asked to attempt synthesis, and an empty report is judged one layer up.
    pub async fn synthesize(
        &self,
        topic: &str,
        notes: &[String],
        sources: &[String],
    ) -> Result<(String, f64), ResearchError> {
        let messages =
            prompts::synthesis_messages(topic, &note_block(notes), &source_block(sources));
        let report = self
            .llm
            .complete(&messages, false)
            .await
            .map_err(|err| ResearchError::synthesis(format!("provider call failed: {err}")))?;

        debug!(
            notes = notes.len(),
            sources = sources.len(),
            report_chars = report.chars().count(),
            "synthesizer produced report"
        );
        Ok((report, PLACEHOLDER_CONFIDENCE))
    }
}

fn note_block(notes: &[String]) -> String {
    notes
        .iter()
        .map(|note| format!("- {}", truncate_chars(note, NOTE_CHAR_LIMIT)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn source_block(sources: &[String]) -> String {
    sources
        .iter()
        .map(|src| format!("- {src}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::llm::ChatMessage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingLlm {
        report: String,
        last_prompt: Mutex<String>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _json_response: bool,
        ) -> Result<String, ProviderError> {
            *self.last_prompt.lock().unwrap() = messages[1].content.clone();
            Ok(self.report.clone())
        }
    }

    #[test]
    fn notes_are_bulleted_and_bounded() {
        let long = "x".repeat(1500);
        let block = note_block(&[long, "short".to_string()]);
        let bullets: Vec<&str> = block.split("\n\n").collect();
        assert_eq!(bullets.len(), 2);
        assert!(bullets[0].starts_with("- "));
        assert_eq!(bullets[0].chars().count(), 2 + 1000);
        assert_eq!(bullets[1], "- short");
    }

    #[test]
    fn sources_are_bulleted_per_line() {
        let block = source_block(&["http://a".to_string(), "http://b".to_string()]);
        assert_eq!(block, "- http://a\n- http://b");
    }

    #[tokio::test]
    async fn empty_note_set_is_legal_input() {
        let llm = Arc::new(RecordingLlm {
            report: "A report built from nothing.".to_string(),
            last_prompt: Mutex::new(String::new()),
        });
        let synthesizer = Synthesizer::new(llm.clone());
        let (report, confidence) = synthesizer.synthesize("topic", &[], &[]).await.unwrap();
        assert_eq!(report, "A report built from nothing.");
        assert_eq!(confidence, PLACEHOLDER_CONFIDENCE);
        assert!(llm.last_prompt.lock().unwrap().contains("Validated Notes:"));
    }
}
