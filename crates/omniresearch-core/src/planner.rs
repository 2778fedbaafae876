//! Topic planning via the LLM collaborator.

use std::sync::Arc;
use tracing::debug;

use crate::error::ResearchError;
use crate::llm::LlmClient;
use crate::prompts;
use crate::state::{Mode, ResearchPlan};

/// Maps `(topic, mode)` to a structured research plan through the injected
/// LLM client. Any provider failure or uncoercible completion is a planning
/// error; retry behavior is the client's own affair.
pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn plan(&self, topic: &str, mode: Mode) -> Result<ResearchPlan, ResearchError> {
        let messages = prompts::planning_messages(topic, mode);
        let raw = self
            .llm
            .complete(&messages, true)
            .await
            .map_err(|err| ResearchError::planning(format!("provider call failed: {err}")))?;

        let plan: ResearchPlan = serde_json::from_str(raw.trim()).map_err(|err| {
            ResearchError::planning(format!("plan did not match the expected shape: {err}"))
        })?;

        debug!(
            subtopics = plan.subtopics.len(),
            depth_required = plan.depth_required,
            "planner produced research plan"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::llm::ChatMessage;
    use async_trait::async_trait;

    struct CannedLlm {
        completion: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _json_response: bool,
        ) -> Result<String, ProviderError> {
            match self.completion {
                Ok(text) => Ok(text.to_string()),
                Err(reason) => Err(ProviderError::Transport(reason.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn coerces_well_formed_plans() {
        let planner = Planner::new(Arc::new(CannedLlm {
            completion: Ok(
                r#"{"subtopics":["history","applications"],"depth_required":2,"requires_math":false,"requires_sources":true}"#,
            ),
        }));
        let plan = planner.plan("Neural Networks", Mode::Shallow).await.unwrap();
        assert_eq!(plan.subtopics, vec!["history", "applications"]);
        assert_eq!(plan.depth_required, 2);
    }

    #[tokio::test]
    async fn uncoercible_completion_is_a_planning_error() {
        let planner = Planner::new(Arc::new(CannedLlm {
            completion: Ok("not json at all"),
        }));
        let err = planner.plan("topic", Mode::Shallow).await.unwrap_err();
        assert_eq!(err.code(), "planning_error");
    }

    #[tokio::test]
    async fn provider_failure_is_a_planning_error() {
        let planner = Planner::new(Arc::new(CannedLlm {
            completion: Err("connection reset"),
        }));
        let err = planner.plan("topic", Mode::Deep).await.unwrap_err();
        assert_eq!(err.code(), "planning_error");
    }
}
