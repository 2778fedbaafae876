//! OmniResearch core abstractions built directly on top of `graph_flow`.
//!
//! This crate provides the iterative research pipeline: a plan → search →
//! validate → synthesize state machine with a depth-bounded back-edge,
//! concurrent search and page-fetch fan-outs with per-branch failure
//! isolation, and a streaming step-event contract for progress reporting.

mod config;
mod error;
mod events;
mod extract;
mod fetch;
mod llm;
mod planner;
mod prompts;
mod search;
mod state;
mod synthesizer;
mod tasks;
mod tools;
mod validator;
mod workflow;

pub use config::{Config, ConfigLoader, LlmConfig, LoggingConfig, SearchConfig, require_env};
pub use error::{ErrorRecord, ProviderError, ResearchError};
pub use events::{
    CLAIM_SUPPORT_SCORE, Claim, ConfidenceReport, EventCollector, FinalResultState, StepEvent,
};
pub use extract::extract;
pub use fetch::{
    DEFAULT_FETCH_TIMEOUT, FetchFailure, FetchFanout, HttpPageFetcher, PageFetchError,
    PageFetcher, PageResponse,
};
pub use llm::{ChatMessage, GroqClient, GroqSettings, LlmClient};
pub use planner::Planner;
pub use search::{SearchFanout, SearchHits, SearchTool, SearchToolError, ToolFailure};
pub use state::{Mode, ResearchOutcome, ResearchPlan, ResearchState, RunRequest};
pub use synthesizer::{PLACEHOLDER_CONFIDENCE, Synthesizer};
pub use tools::{ArxivSearch, DuckDuckGoSearch, TavilySearch, WikipediaSearch};
pub use validator::validate;
pub use workflow::{
    ResearchEngine, run_research_session, run_research_session_with_events,
    stream_research_session,
};
