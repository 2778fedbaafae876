//! Research run state threaded through the pipeline graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ResearchError;

/// Depth mode requested by the caller. Informs how aggressively the planner
/// budgets search cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Shallow,
    Deep,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Shallow => "shallow",
            Mode::Deep => "deep",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ResearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "shallow" => Ok(Mode::Shallow),
            "deep" => Ok(Mode::Deep),
            other => Err(ResearchError::malformed_request(format!(
                "mode must be \"shallow\" or \"deep\", got \"{other}\""
            ))),
        }
    }
}

/// The single mutable record owned by the orchestrator for the lifetime of one
/// research run. `topic` and `mode` are fixed at creation; everything else is
/// written by exactly one pipeline node at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    pub topic: String,
    pub mode: Mode,

    /// Full subtopic list, set once by the plan node.
    #[serde(default)]
    pub plan: Vec<String>,
    /// Work queue; each search step pops the front element.
    #[serde(default)]
    pub remaining_subtopics: Vec<String>,

    /// Raw `(source_url, text)` pairs, possibly duplicated, append-only.
    #[serde(default)]
    pub extracted_notes: Vec<(String, String)>,
    /// Deduplicated note texts, append-only.
    #[serde(default)]
    pub validated_notes: Vec<String>,
    /// Source URL for the note at the same index in `validated_notes`.
    #[serde(default)]
    pub validated_sources: Vec<String>,

    /// Completed search steps.
    #[serde(default)]
    pub depth: u32,
    /// Depth budget, set once by the plan node from the plan's `depth_required`.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default)]
    pub final_report: String,
    #[serde(default)]
    pub confidence_score: f64,
}

fn default_max_depth() -> u32 {
    1
}

impl ResearchState {
    pub fn new(topic: impl Into<String>, mode: Mode) -> Self {
        Self {
            topic: topic.into(),
            mode,
            plan: Vec::new(),
            remaining_subtopics: Vec::new(),
            extracted_notes: Vec::new(),
            validated_notes: Vec::new(),
            validated_sources: Vec::new(),
            depth: 0,
            max_depth: default_max_depth(),
            final_report: String::new(),
            confidence_score: 0.0,
        }
    }

    /// Loop guard over the two independent exit conditions: the depth budget
    /// and the subtopic queue. Running out of either ends the loop, so a plan
    /// may legitimately leave subtopics unconsumed.
    pub fn should_continue(&self) -> bool {
        self.depth < self.max_depth && !self.remaining_subtopics.is_empty()
    }
}

/// Structured planner output. Consumed once to seed `plan`,
/// `remaining_subtopics` and `max_depth`; not retained afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub subtopics: Vec<String>,
    pub depth_required: u32,
    pub requires_math: bool,
    pub requires_sources: bool,
}

/// Run request consumed by the core. Validation of the topic is the caller
/// boundary's responsibility; the core accepts any non-empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub topic: String,
    pub mode: Mode,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>, mode: Mode) -> Self {
        Self {
            topic: topic.into(),
            mode,
        }
    }

    /// Boundary-level request validation. The pipeline itself never calls
    /// this; front doors do, before handing the request to the core.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.topic.trim().is_empty() {
            return Err(ResearchError::malformed_request("topic must be non-empty"));
        }
        Ok(())
    }
}

/// One-shot invocation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub topic: String,
    pub plan: Vec<String>,
    pub validated_notes: Vec<String>,
    pub validated_sources: Vec<String>,
    pub final_report: String,
    pub confidence_score: f64,
}

impl ResearchOutcome {
    pub fn from_state(state: ResearchState) -> Self {
        Self {
            topic: state.topic,
            plan: state.plan,
            validated_notes: state.validated_notes,
            validated_sources: state.validated_sources,
            final_report: state.final_report,
            confidence_score: state.confidence_score,
        }
    }
}
