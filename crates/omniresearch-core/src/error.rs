use thiserror::Error;

/// Failure of an LLM collaborator call (network, auth, quota, shape).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider transport failure: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response carried no completion text")]
    MalformedResponse,
}

impl ProviderError {
    /// Whether the client may retry this failure internally.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::MalformedResponse => false,
        }
    }
}

/// Core error type for a research run.
///
/// Per-branch fan-out failures (search tools, page fetches) never reach this
/// type; they are recovered inside their component and only degrade the
/// evidence set. Anything surfacing here aborts the run.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("planning failed: {reason}")]
    Planning { reason: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("synthesis failed: {reason}")]
    Synthesis { reason: String },
    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },
    #[error("internal fault: {0}")]
    Internal(String),
}

impl ResearchError {
    pub fn planning(reason: impl Into<String>) -> Self {
        Self::Planning {
            reason: reason.into(),
        }
    }

    pub fn synthesis(reason: impl Into<String>) -> Self {
        Self::Synthesis {
            reason: reason.into(),
        }
    }

    pub fn malformed_request(reason: impl Into<String>) -> Self {
        Self::MalformedRequest {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Stable machine-readable code, used by the streaming `error` event and
    /// by boundary responses.
    pub fn code(&self) -> &'static str {
        match self {
            ResearchError::Planning { .. } => "planning_error",
            ResearchError::Provider(_) => "provider_error",
            ResearchError::Synthesis { .. } => "synthesis_error",
            ResearchError::MalformedRequest { .. } => "malformed_request",
            ResearchError::Internal(_) => "internal_fault",
        }
    }

    /// Remediation hint surfaced to callers by the request boundary.
    pub fn remediation(&self) -> &'static str {
        match self {
            ResearchError::Planning { .. } | ResearchError::Provider(_) => {
                "verify provider credentials and model availability"
            }
            ResearchError::Synthesis { .. } => {
                "retry the run; a broader topic or deep mode may yield more evidence"
            }
            ResearchError::MalformedRequest { .. } => {
                "supply a non-empty topic and a mode of \"shallow\" or \"deep\""
            }
            ResearchError::Internal(_) => "inspect server logs for the failing component",
        }
    }
}

/// Serializable form of a run-aborting error, carried through the session
/// context so the run entry points can reconstruct the failure after the
/// graph stops.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
    pub detail: String,
}

impl ErrorRecord {
    pub fn from_error(error: &ResearchError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            detail: error.remediation().to_string(),
        }
    }

    pub fn into_error(self) -> ResearchError {
        match self.code.as_str() {
            "planning_error" => ResearchError::Planning {
                reason: self.message,
            },
            "synthesis_error" => ResearchError::Synthesis {
                reason: self.message,
            },
            "provider_error" => ResearchError::Provider(ProviderError::Transport(self.message)),
            "malformed_request" => ResearchError::MalformedRequest {
                reason: self.message,
            },
            _ => ResearchError::Internal(self.message),
        }
    }
}
