//! Graph wiring and run entry points.
//!
//! The pipeline is a fixed graph: plan → search → validate, a conditional
//! back-edge from validate to search while the depth budget and subtopic
//! queue both hold out, then synthesize → end. Each invocation builds fresh
//! tasks around the engine's injected adapters, so no state crosses runs.

use graph_flow::{
    ExecutionStatus, FlowRunner, Graph, GraphBuilder, InMemorySessionStorage, Session,
    SessionStorage, Task,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ErrorRecord, ResearchError};
use crate::events::{EventCollector, StepEvent};
use crate::fetch::{DEFAULT_FETCH_TIMEOUT, FetchFanout, HttpPageFetcher, PageFetcher};
use crate::llm::{GroqClient, GroqSettings, LlmClient};
use crate::planner::Planner;
use crate::search::{SearchFanout, SearchTool};
use crate::state::{ResearchOutcome, ResearchState, RunRequest};
use crate::synthesizer::Synthesizer;
use crate::tasks::{
    CONTINUE_KEY, ERROR_KEY, PlanTask, STATE_KEY, SearchTask, SynthesizeTask, ValidateTask,
};
use crate::tools::{ArxivSearch, DuckDuckGoSearch, TavilySearch, WikipediaSearch};

/// Research pipeline with explicitly injected collaborators. Owns nothing
/// mutable; every run gets its own state, graph and event channel.
pub struct ResearchEngine {
    llm: Arc<dyn LlmClient>,
    tools: Vec<Arc<dyn SearchTool>>,
    fetcher: Arc<dyn PageFetcher>,
    fetch_timeout: Duration,
}

struct PipelineTasks {
    plan: Arc<PlanTask>,
    search: Arc<SearchTask>,
    validate: Arc<ValidateTask>,
    synthesize: Arc<SynthesizeTask>,
}

impl ResearchEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Vec<Arc<dyn SearchTool>>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            llm,
            tools,
            fetcher,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Production wiring: Groq chat completions plus the configured search
    /// tools, registered in the order their results should merge.
    pub fn from_config(config: &Config) -> Result<Self, ResearchError> {
        let mut settings = GroqSettings::new(config.llm_api_key()?);
        settings.model = config.llm.model.clone();
        settings.temperature = config.llm.temperature;
        settings.max_tokens = config.llm.max_tokens;
        settings.max_attempts = config.llm.max_attempts;
        let llm: Arc<dyn LlmClient> = Arc::new(GroqClient::new(settings)?);

        let mut tools: Vec<Arc<dyn SearchTool>> = Vec::new();
        if let Some(key) = config.tavily_api_key() {
            tools.push(Arc::new(TavilySearch::new(key)?));
        }
        if config.search.duckduckgo {
            tools.push(Arc::new(DuckDuckGoSearch::new()?));
        }
        if config.search.wikipedia {
            tools.push(Arc::new(WikipediaSearch::new()?));
        }
        if config.search.arxiv {
            tools.push(Arc::new(ArxivSearch::new()?));
        }

        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new()?);
        Ok(Self::new(llm, tools, fetcher)
            .with_fetch_timeout(Duration::from_secs(config.search.fetch_timeout_secs)))
    }

    fn build_graph(&self, events: &EventCollector) -> (Arc<Graph>, PipelineTasks) {
        let tasks = PipelineTasks {
            plan: Arc::new(PlanTask::new(
                Planner::new(self.llm.clone()),
                events.clone(),
            )),
            search: Arc::new(SearchTask::new(
                SearchFanout::new(self.tools.clone()),
                FetchFanout::new(self.fetcher.clone()).with_timeout(self.fetch_timeout),
                events.clone(),
            )),
            validate: Arc::new(ValidateTask::new(events.clone())),
            synthesize: Arc::new(SynthesizeTask::new(
                Synthesizer::new(self.llm.clone()),
                events.clone(),
            )),
        };

        let builder = GraphBuilder::new("research_pipeline")
            .add_task(tasks.plan.clone())
            .add_task(tasks.search.clone())
            .add_task(tasks.validate.clone())
            .add_task(tasks.synthesize.clone())
            .add_edge(tasks.plan.id(), tasks.search.id())
            .add_edge(tasks.search.id(), tasks.validate.id())
            .add_conditional_edge(
                tasks.validate.id(),
                |ctx| ctx.get_sync::<bool>(CONTINUE_KEY).unwrap_or(false),
                tasks.search.id(),
                tasks.synthesize.id(),
            )
            .set_start_task(tasks.plan.id());

        (Arc::new(builder.build()), tasks)
    }

    async fn execute(
        &self,
        request: &RunRequest,
        events: &EventCollector,
    ) -> Result<ResearchOutcome, ResearchError> {
        events.emit_log(format!(
            "starting research run for \"{}\" in {} mode",
            request.topic, request.mode
        ));

        let (graph, tasks) = self.build_graph(events);
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let session_id = format!("run-{}", Uuid::new_v4());
        let session = Session::new_from_task(session_id.clone(), tasks.plan.id());
        session
            .context
            .set(STATE_KEY, ResearchState::new(&request.topic, request.mode))
            .await;
        storage
            .save(session)
            .await
            .map_err(|err| ResearchError::internal(format!("failed to persist session: {err}")))?;

        loop {
            let result = runner
                .run(&session_id)
                .await
                .map_err(|err| ResearchError::internal(format!("graph execution failure: {err}")))?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::WaitingForInput => continue,
                ExecutionStatus::Error(message) => return Err(ResearchError::internal(message)),
            }
        }

        let session = storage
            .get(&session_id)
            .await
            .map_err(|err| ResearchError::internal(format!("failed to reload session: {err}")))?
            .ok_or_else(|| ResearchError::internal("session missing after execution"))?;

        if let Some(record) = session.context.get::<ErrorRecord>(ERROR_KEY).await {
            return Err(record.into_error());
        }

        let state: ResearchState = session
            .context
            .get(STATE_KEY)
            .await
            .ok_or_else(|| ResearchError::internal("research state missing after execution"))?;

        // Postcondition: a run that completed its loop but produced nothing
        // readable is a synthesis failure, even though no node raised.
        if state.final_report.trim().is_empty() {
            return Err(ResearchError::synthesis(
                "synthesizer produced an empty report",
            ));
        }

        info!(
            topic = %state.topic,
            sources = state.validated_sources.len(),
            "research run complete"
        );
        Ok(ResearchOutcome::from_state(state))
    }
}

/// One-shot invocation: runs the pipeline to completion and returns the
/// synchronous result. Aborts are raised to the caller.
pub async fn run_research_session(
    engine: &ResearchEngine,
    request: RunRequest,
) -> Result<ResearchOutcome, ResearchError> {
    let (events, _receiver) = EventCollector::new();
    engine.execute(&request, &events).await
}

/// One-shot invocation that also returns the step events the run emitted, in
/// order.
pub async fn run_research_session_with_events(
    engine: &ResearchEngine,
    request: RunRequest,
) -> Result<(ResearchOutcome, Vec<StepEvent>), ResearchError> {
    let (events, mut receiver) = EventCollector::new();
    let result = engine.execute(&request, &events).await;
    drop(events);

    let mut collected = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        collected.push(event);
    }
    result.map(|outcome| (outcome, collected))
}

/// Streaming invocation: events arrive as the state machine advances. The
/// sequence is finite, ending with `final_result` or a terminal `error`
/// event; each call is a fresh, non-restartable run.
pub fn stream_research_session(
    engine: Arc<ResearchEngine>,
    request: RunRequest,
) -> mpsc::UnboundedReceiver<StepEvent> {
    let (events, receiver) = EventCollector::new();
    tokio::spawn(async move {
        if let Err(failure) = engine.execute(&request, &events).await {
            events.emit_error(&failure);
        }
    });
    receiver
}
