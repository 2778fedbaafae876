//! HTTP front door for the research pipeline.
//!
//! Validates run requests before the core is invoked, maps run failures to
//! status codes with remediation hints, and bounds concurrent sessions.

use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use omniresearch_core::{
    ConfigLoader, Mode, ResearchEngine, ResearchError, RunRequest, StepEvent,
    run_research_session_with_events,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    net::TcpListener,
    signal,
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    engine: Arc<ResearchEngine>,
    session_permits: Arc<Semaphore>,
    max_sessions: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,omniresearch_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = ConfigLoader::load_or_default(None)?;
    let engine = Arc::new(ResearchEngine::from_config(&config)?);

    let addr: SocketAddr = std::env::var("OMNIRESEARCH_API_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;

    let session_limit = std::env::var("OMNIRESEARCH_MAX_CONCURRENT_SESSIONS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(5);

    let state = AppState {
        engine,
        session_permits: Arc::new(Semaphore::new(session_limit)),
        max_sessions: session_limit,
    };

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/research", post(handle_research))
        .with_state(state);

    info!("OmniResearch API listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    hint: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    hint: String,
}

impl AppError {
    fn new(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }
}

impl From<ResearchError> for AppError {
    fn from(err: ResearchError) -> Self {
        let status = match &err {
            ResearchError::MalformedRequest { .. } => StatusCode::BAD_REQUEST,
            ResearchError::Planning { .. }
            | ResearchError::Provider(_)
            | ResearchError::Synthesis { .. } => StatusCode::BAD_GATEWAY,
            ResearchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(
            status,
            err.code(),
            err.to_string(),
            err.remediation(),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                hint: self.hint,
            },
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, AppError>;

fn acquire_session_permit(permits: &Arc<Semaphore>) -> ApiResult<OwnedSemaphorePermit> {
    match permits.clone().try_acquire_owned() {
        Ok(permit) => Ok(permit),
        Err(TryAcquireError::NoPermits) => Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "capacity_exhausted",
            "session capacity reached",
            "retry once a slot frees up",
        )),
        Err(TryAcquireError::Closed) => Err(AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "internal_fault",
            "session executor unavailable",
            "inspect server logs for the failing component",
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ResearchRequest {
    topic: String,
    mode: String,
    #[serde(default)]
    include_events: bool,
}

#[derive(Debug, Serialize)]
struct ResearchPayload {
    topic: String,
    plan: Vec<String>,
    validated_notes: Vec<String>,
    validated_sources: Vec<String>,
    final_report: String,
    confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<StepEvent>>,
}

#[derive(Debug, Serialize)]
struct CapacityReport {
    max_sessions: usize,
    available_sessions: usize,
    active_sessions: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    capacity: CapacityReport,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let available = state.session_permits.available_permits();
    Json(HealthResponse {
        status: "ok",
        capacity: CapacityReport {
            max_sessions: state.max_sessions,
            available_sessions: available,
            active_sessions: state.max_sessions.saturating_sub(available),
        },
    })
}

/// Reject malformed requests before the core is ever invoked.
fn validate_request(request: &ResearchRequest) -> ApiResult<RunRequest> {
    let mode: Mode = request.mode.parse().map_err(AppError::from)?;
    let run = RunRequest::new(&request.topic, mode);
    run.validate().map_err(AppError::from)?;
    Ok(run)
}

async fn handle_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> ApiResult<Json<ResearchPayload>> {
    let run = validate_request(&request)?;
    let _permit = acquire_session_permit(&state.session_permits)?;

    info!(topic = %run.topic, mode = %run.mode, "research request accepted");

    let (outcome, events) = run_research_session_with_events(&state.engine, run)
        .await
        .map_err(AppError::from)?;

    Ok(Json(ResearchPayload {
        topic: outcome.topic,
        plan: outcome.plan,
        validated_notes: outcome.validated_notes,
        validated_sources: outcome.validated_sources,
        final_report: outcome.final_report,
        confidence_score: outcome.confidence_score,
        events: request.include_events.then_some(events),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_limit_returns_429() {
        let permits = Arc::new(Semaphore::new(1));

        let held = acquire_session_permit(&permits).expect("first permit should succeed");
        let err = acquire_session_permit(&permits).expect_err("second permit should fail");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        drop(held);

        assert!(acquire_session_permit(&permits).is_ok());
    }

    #[test]
    fn blank_topic_is_rejected_before_the_core_runs() {
        let request = ResearchRequest {
            topic: "   ".to_string(),
            mode: "shallow".to_string(),
            include_events: false,
        };
        let err = validate_request(&request).expect_err("blank topic must be rejected");
        assert_eq!(err.code, "malformed_request");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_mode_is_rejected_before_the_core_runs() {
        let request = ResearchRequest {
            topic: "String Theory".to_string(),
            mode: "exhaustive".to_string(),
            include_events: false,
        };
        let err = validate_request(&request).expect_err("unknown mode must be rejected");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
