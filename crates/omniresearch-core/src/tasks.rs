//! Pipeline nodes executed by the research graph.
//!
//! Each node loads the research state from the session context, applies its
//! step, writes the state back and emits one progress event. A node-level
//! failure records an error in the context and ends the graph; per-branch
//! fan-out failures never reach this layer.

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::error::{ErrorRecord, ResearchError};
use crate::events::{EventCollector, FinalResultState};
use crate::fetch::FetchFanout;
use crate::planner::Planner;
use crate::search::SearchFanout;
use crate::state::ResearchState;
use crate::synthesizer::Synthesizer;
use crate::validator;

/// Session context keys shared by the nodes and the run entry points.
pub(crate) const STATE_KEY: &str = "research.state";
pub(crate) const CONTINUE_KEY: &str = "research.continue";
pub(crate) const ERROR_KEY: &str = "research.error";

async fn abort(context: &Context, failure: ResearchError) -> graph_flow::Result<TaskResult> {
    error!(error = %failure, "pipeline node failed, ending the run");
    context
        .set(ERROR_KEY, ErrorRecord::from_error(&failure))
        .await;
    Ok(TaskResult::new(None, NextAction::End))
}

async fn load_state(context: &Context) -> Result<ResearchState, ResearchError> {
    context
        .get::<ResearchState>(STATE_KEY)
        .await
        .ok_or_else(|| ResearchError::internal("research state missing from session context"))
}

/// Seeds `plan`, `remaining_subtopics` and `max_depth` from the planner.
pub struct PlanTask {
    planner: Planner,
    events: EventCollector,
}

impl PlanTask {
    pub fn new(planner: Planner, events: EventCollector) -> Self {
        Self { planner, events }
    }
}

#[async_trait]
impl Task for PlanTask {
    fn id(&self) -> &str {
        "plan"
    }

    #[instrument(name = "task.plan", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let started = Instant::now();
        let mut state = match load_state(&context).await {
            Ok(state) => state,
            Err(failure) => return abort(&context, failure).await,
        };

        match self.planner.plan(&state.topic, state.mode).await {
            Ok(plan) => {
                state.plan = plan.subtopics.clone();
                state.remaining_subtopics = plan.subtopics;
                state.max_depth = plan.depth_required.max(1);

                info!(
                    subtopics = state.plan.len(),
                    max_depth = state.max_depth,
                    "plan node seeded research state"
                );

                let payload = json!({ "subtopics": state.plan });
                context.set(STATE_KEY, &state).await;
                self.events.emit_step("plan", started.elapsed(), payload);

                Ok(TaskResult::new(
                    Some(format!("planned {} subtopics", state.plan.len())),
                    NextAction::ContinueAndExecute,
                ))
            }
            Err(failure) => abort(&context, failure).await,
        }
    }
}

/// Pops the next subtopic, fans out searches, fetches the discovered pages
/// and appends the extracted notes. A no-op when the queue is empty.
pub struct SearchTask {
    search: SearchFanout,
    fetch: FetchFanout,
    events: EventCollector,
}

impl SearchTask {
    pub fn new(search: SearchFanout, fetch: FetchFanout, events: EventCollector) -> Self {
        Self {
            search,
            fetch,
            events,
        }
    }
}

#[async_trait]
impl Task for SearchTask {
    fn id(&self) -> &str {
        "search"
    }

    #[instrument(name = "task.search", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let started = Instant::now();
        let mut state = match load_state(&context).await {
            Ok(state) => state,
            Err(failure) => return abort(&context, failure).await,
        };

        if state.remaining_subtopics.is_empty() {
            debug!("no subtopics remain; search step is a no-op");
            self.events.emit_step("search", started.elapsed(), json!({}));
            return Ok(TaskResult::new(None, NextAction::ContinueAndExecute));
        }

        state.depth += 1;
        let subtopic = state.remaining_subtopics.remove(0);
        info!(%subtopic, depth = state.depth, "searching subtopic");

        // Tool snippets are deliberately unused; the evidence set is built
        // from live page fetches of the discovered URLs.
        let (_texts, urls) = self.search.call_search_tools(&subtopic).await;
        let notes = self.fetch.fetch_all(&urls).await;
        debug!(
            candidate_urls = urls.len(),
            notes = notes.len(),
            "search step extracted notes"
        );

        state.extracted_notes.extend(notes);
        context.set(STATE_KEY, &state).await;
        self.events.emit_step("search", started.elapsed(), json!({}));

        Ok(TaskResult::new(
            Some(format!("searched \"{subtopic}\"")),
            NextAction::ContinueAndExecute,
        ))
    }
}

/// Deduplicates the note history and re-evaluates the loop guard.
pub struct ValidateTask {
    events: EventCollector,
}

impl ValidateTask {
    pub fn new(events: EventCollector) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Task for ValidateTask {
    fn id(&self) -> &str {
        "validate"
    }

    #[instrument(name = "task.validate", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let started = Instant::now();
        let mut state = match load_state(&context).await {
            Ok(state) => state,
            Err(failure) => return abort(&context, failure).await,
        };

        validator::validate(&mut state);
        let proceed = state.should_continue();

        debug!(
            validated = state.validated_notes.len(),
            depth = state.depth,
            max_depth = state.max_depth,
            remaining = state.remaining_subtopics.len(),
            proceed,
            "validate step complete"
        );

        context.set(STATE_KEY, &state).await;
        context.set_sync(CONTINUE_KEY, proceed);
        self.events.emit_step("validate", started.elapsed(), json!({}));

        Ok(TaskResult::new(None, NextAction::ContinueAndExecute))
    }
}

/// Synthesizes the final report from the validated evidence and ends the run.
pub struct SynthesizeTask {
    synthesizer: Synthesizer,
    events: EventCollector,
}

impl SynthesizeTask {
    pub fn new(synthesizer: Synthesizer, events: EventCollector) -> Self {
        Self {
            synthesizer,
            events,
        }
    }
}

#[async_trait]
impl Task for SynthesizeTask {
    fn id(&self) -> &str {
        "synthesize"
    }

    #[instrument(name = "task.synthesize", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let started = Instant::now();
        let mut state = match load_state(&context).await {
            Ok(state) => state,
            Err(failure) => return abort(&context, failure).await,
        };

        match self
            .synthesizer
            .synthesize(&state.topic, &state.validated_notes, &state.validated_sources)
            .await
        {
            Ok((report, confidence)) => {
                state.final_report = report;
                state.confidence_score = confidence;
                context.set(STATE_KEY, &state).await;

                self.events
                    .emit_step("synthesize", started.elapsed(), json!({}));
                if !state.final_report.trim().is_empty() {
                    self.events.emit_final(FinalResultState::from_state(&state));
                }

                info!(
                    report_chars = state.final_report.chars().count(),
                    "synthesis complete"
                );
                Ok(TaskResult::new(
                    Some("research complete".to_string()),
                    NextAction::End,
                ))
            }
            Err(failure) => abort(&context, failure).await,
        }
    }
}
