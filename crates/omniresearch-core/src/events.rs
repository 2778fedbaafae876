//! Incremental-progress event contract.
//!
//! Every pipeline node emits one event as it completes; a run ends with a
//! single `final_result` or `error` event. Events flow over an unbounded
//! channel so the producer never blocks on a slow consumer.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::ResearchError;
use crate::state::ResearchState;

/// Fixed per-claim support score; claim scoring is a placeholder heuristic,
/// not derived from evidence quality.
pub const CLAIM_SUPPORT_SCORE: f64 = 0.5;

/// Progress record describing one completed pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StepEvent {
    /// Emitted once at run start.
    Log { message: String },
    /// Emitted after every node.
    AgentStep {
        agent: String,
        status: String,
        duration_ms: u64,
        payload: serde_json::Value,
    },
    /// Emitted once, after synthesis produced a non-empty report.
    FinalResult { state: FinalResultState },
    /// Emitted in place of further events when the run aborts.
    Error {
        code: String,
        message: String,
        detail: String,
    },
}

/// Claim derived from the synthesized report. The extraction is a deliberate
/// rough heuristic: one claim per leading non-blank report line, with fixed
/// support scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub statement: String,
    pub source: String,
    pub support_score: f64,
    pub has_contradiction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub score: f64,
    pub reasoning_summary: String,
    pub evidence_summary: String,
}

/// Payload of the terminal `final_result` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResultState {
    pub claims: Vec<Claim>,
    pub confidence: ConfidenceReport,
    pub final_report: String,
}

impl FinalResultState {
    pub fn from_state(state: &ResearchState) -> Self {
        let claims = state
            .final_report
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(3)
            .enumerate()
            .map(|(idx, line)| Claim {
                id: format!("CL-{idx}"),
                statement: line.to_string(),
                source: state.validated_sources.get(idx).cloned().unwrap_or_default(),
                support_score: CLAIM_SUPPORT_SCORE,
                has_contradiction: false,
            })
            .collect();

        Self {
            claims,
            confidence: ConfidenceReport {
                score: state.confidence_score,
                reasoning_summary:
                    "Report synthesized from deduplicated page excerpts; score is a fixed heuristic"
                        .to_string(),
                evidence_summary: format!(
                    "{} validated sources informed this report",
                    state.validated_sources.len()
                ),
            },
            final_report: state.final_report.clone(),
        }
    }
}

/// Cloneable event emitter handed to every pipeline node.
#[derive(Clone)]
pub struct EventCollector {
    sender: mpsc::UnboundedSender<StepEvent>,
}

impl EventCollector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StepEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: StepEvent) {
        if let Err(err) = self.sender.send(event) {
            tracing::warn!(error = %err, "failed to emit step event");
        }
    }

    pub fn emit_log(&self, message: impl Into<String>) {
        self.emit(StepEvent::Log {
            message: message.into(),
        });
    }

    pub fn emit_step(&self, agent: &str, duration: Duration, payload: serde_json::Value) {
        self.emit(StepEvent::AgentStep {
            agent: agent.to_string(),
            status: "completed".to_string(),
            duration_ms: duration.as_millis() as u64,
            payload,
        });
    }

    pub fn emit_final(&self, state: FinalResultState) {
        self.emit(StepEvent::FinalResult { state });
    }

    pub fn emit_error(&self, error: &ResearchError) {
        self.emit(StepEvent::Error {
            code: error.code().to_string(),
            message: error.to_string(),
            detail: error.remediation().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mode;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (collector, mut receiver) = EventCollector::new();
        collector.emit_log("starting");
        collector.emit_step("plan", Duration::from_millis(12), serde_json::json!({}));
        drop(collector);

        match receiver.recv().await.unwrap() {
            StepEvent::Log { message } => assert_eq!(message, "starting"),
            other => panic!("expected log event, got {other:?}"),
        }
        match receiver.recv().await.unwrap() {
            StepEvent::AgentStep { agent, status, .. } => {
                assert_eq!(agent, "plan");
                assert_eq!(status, "completed");
            }
            other => panic!("expected agent_step event, got {other:?}"),
        }
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn serde_uses_snake_case_event_tags() {
        let event = StepEvent::AgentStep {
            agent: "validate".to_string(),
            status: "completed".to_string(),
            duration_ms: 3,
            payload: serde_json::json!({}),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "agent_step");
        assert_eq!(json["agent"], "validate");

        let error = StepEvent::Error {
            code: "planning_error".to_string(),
            message: "m".to_string(),
            detail: "d".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["event_type"], "error");
    }

    #[test]
    fn claims_take_first_three_non_blank_lines() {
        let mut state = ResearchState::new("Neural Networks", Mode::Shallow);
        state.final_report = "\nFirst finding.\n\nSecond finding.\nThird finding.\nFourth.".into();
        state.validated_sources = vec!["http://a".into(), "http://b".into()];
        state.confidence_score = 0.7;

        let result = FinalResultState::from_state(&state);
        assert_eq!(result.claims.len(), 3);
        assert_eq!(result.claims[0].id, "CL-0");
        assert_eq!(result.claims[0].statement, "First finding.");
        assert_eq!(result.claims[0].source, "http://a");
        assert_eq!(result.claims[2].id, "CL-2");
        assert_eq!(result.claims[2].source, "");
        assert!(result.claims.iter().all(|c| !c.has_contradiction));
        assert_eq!(result.confidence.score, 0.7);
        assert!(result.confidence.evidence_summary.contains("2 validated"));
    }
}
