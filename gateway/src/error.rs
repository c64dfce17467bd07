//! Gateway error types
//!
//! Provides structured error handling for all gateway operations.
//! Fatal conditions are `GatewayError`s; degradations that must not abort a
//! run are recorded as `GatewayWarning`s instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::format_dollars;
use crate::store::StoreError;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

// ============================================================================
// Structured Error Response (Caller-Friendly)
// ============================================================================

/// Structured error returned across the transport boundary.
///
/// Tells the caller what went wrong and what to do about it.
///
/// # Example Response
/// ```json
/// {
///   "code": "INCOMPLETE_APPROVALS",
///   "message": "2 pending project(s) lack a human decision: PRJ-001, PRJ-004",
///   "recovery_action": "Submit a human decision for every listed project, then finalize again",
///   "context": { "run_id": "9c1e..." },
///   "retryable": true
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code (e.g., "INCOMPLETE_APPROVALS")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Actionable recovery instruction for the caller
    pub recovery_action: String,

    /// Relevant context for debugging and recovery
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Whether the same call can succeed once the caller fixes its input
    #[serde(default)]
    pub retryable: bool,
}

impl StructuredError {
    /// Create a new structured error
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        recovery_action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_action: recovery_action.into(),
            context: HashMap::new(),
            retryable: false,
        }
    }

    /// Add context key-value pair
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Mark as retryable
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Add run context (common pattern)
    pub fn with_run(self, run_id: &str, phase: impl std::fmt::Display) -> Self {
        self.with_context("run_id", run_id.to_string())
            .with_context("phase", phase.to_string())
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StructuredError {}

/// Errors that can occur during gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Reasoning collaborator could not produce a decision for a project
    #[error("Policy decision unavailable for {project_id} after {attempts} attempt(s): {message}")]
    DecisionUnavailable {
        project_id: String,
        attempts: u32,
        message: String,
    },

    /// Scheduling requested while escalated projects still lack a human decision
    #[error(
        "{} pending project(s) lack a human decision: {}",
        .missing.len(),
        .missing.join(", ")
    )]
    IncompleteApprovals { missing: Vec<String> },

    /// Pipeline operation invoked out of order
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Project fails validation
    #[error("Invalid project {project_id}: {message}")]
    InvalidProject { project_id: String, message: String },

    /// Same project id submitted twice in one run
    #[error("Duplicate project id: {project_id}")]
    DuplicateProject { project_id: String },

    /// Reasoning collaborator returned a decision that violates its contract
    #[error("Invalid policy decision for {project_id}: {message}")]
    InvalidPolicyDecision { project_id: String, message: String },

    /// Human decision for a project that is not awaiting one
    #[error("Project {project_id} is not awaiting a human decision")]
    UnknownPendingProject { project_id: String },

    /// Second human decision for the same project
    #[error("Project {project_id} already has a human decision")]
    DuplicateHumanDecision { project_id: String },

    /// Results requested before the run reached COMPLETE
    #[error("Results not ready: run is in phase {phase}")]
    ResultsNotReady { phase: String },

    /// No persisted snapshot for the requested run
    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Persistence collaborator failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Create an invalid transition error
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create an invalid project error
    pub fn invalid_project(project_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProject {
            project_id: project_id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid policy decision error
    pub fn invalid_decision(project_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPolicyDecision {
            project_id: project_id.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::DecisionUnavailable { .. } => "DECISION_UNAVAILABLE",
            Self::IncompleteApprovals { .. } => "INCOMPLETE_APPROVALS",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidProject { .. } => "INVALID_PROJECT",
            Self::DuplicateProject { .. } => "DUPLICATE_PROJECT",
            Self::InvalidPolicyDecision { .. } => "INVALID_POLICY_DECISION",
            Self::UnknownPendingProject { .. } => "UNKNOWN_PENDING_PROJECT",
            Self::DuplicateHumanDecision { .. } => "DUPLICATE_HUMAN_DECISION",
            Self::ResultsNotReady { .. } => "RESULTS_NOT_READY",
            Self::RunNotFound { .. } => "RUN_NOT_FOUND",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// Whether the caller can retry after correcting its input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IncompleteApprovals { .. }
                | Self::InvalidProject { .. }
                | Self::DuplicateProject { .. }
                | Self::UnknownPendingProject { .. }
                | Self::ResultsNotReady { .. }
                | Self::Store(_)
                | Self::Io(_)
        )
    }

    fn recovery_action(&self) -> String {
        match self {
            Self::DecisionUnavailable { .. } => {
                "The project was excluded from this run; resubmit it in a new run once the reasoning service recovers".to_string()
            }
            Self::IncompleteApprovals { .. } => {
                "Submit a human decision for every listed project, then finalize again".to_string()
            }
            Self::InvalidTransition { from, .. } => {
                format!("Check the run phase ({from}) and call operations in order: submit, apply decisions, finalize, results")
            }
            Self::InvalidProject { .. } | Self::DuplicateProject { .. } => {
                "Fix the project list and submit again".to_string()
            }
            Self::InvalidPolicyDecision { .. } => {
                "Governance was rolled back; start a new run after fixing the reasoning service".to_string()
            }
            Self::UnknownPendingProject { .. } => {
                "Only projects listed as pending accept human decisions".to_string()
            }
            Self::DuplicateHumanDecision { .. } => {
                "Each escalated project takes exactly one human decision; drop the duplicate".to_string()
            }
            Self::ResultsNotReady { phase } => {
                format!("Run is in {phase}; resolve pending reviews and finalize before reading results")
            }
            Self::RunNotFound { .. } => "Submit projects to start a new run".to_string(),
            Self::Config { .. } => "Fix the configuration file and restart".to_string(),
            Self::Store(_) | Self::Io(_) | Self::Json(_) => {
                "Check the state directory is writable, then retry".to_string()
            }
        }
    }

    /// Convert to the caller-facing structured form
    pub fn to_structured(&self) -> StructuredError {
        let mut structured = StructuredError::new(self.code(), self.to_string(), self.recovery_action());
        match self {
            Self::IncompleteApprovals { missing } => {
                structured = structured.with_context("missing", missing.clone());
            }
            Self::DecisionUnavailable { project_id, .. }
            | Self::InvalidProject { project_id, .. }
            | Self::DuplicateProject { project_id }
            | Self::InvalidPolicyDecision { project_id, .. }
            | Self::UnknownPendingProject { project_id }
            | Self::DuplicateHumanDecision { project_id } => {
                structured = structured.with_context("project_id", project_id.clone());
            }
            _ => {}
        }
        if self.is_retryable() {
            structured = structured.retryable();
        }
        structured
    }
}

// ============================================================================
// Non-fatal degradations
// ============================================================================

/// Conditions that degrade a single project instead of failing the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayWarning {
    /// Auto-approval did not fit the remaining budget; project sent to review
    BudgetExceeded {
        project_id: String,
        estimated_cost: u64,
        remaining: u64,
    },
    /// Human approval did not fit the remaining budget; finalized as REJECT
    BudgetInsufficientAtFinalization {
        project_id: String,
        estimated_cost: u64,
        remaining: u64,
    },
    /// A reviewer rejected a project carrying a legal mandate
    MandatedProjectRejected { project_id: String },
}

impl GatewayWarning {
    /// Project the warning applies to
    pub fn project_id(&self) -> &str {
        match self {
            Self::BudgetExceeded { project_id, .. }
            | Self::BudgetInsufficientAtFinalization { project_id, .. }
            | Self::MandatedProjectRejected { project_id } => project_id,
        }
    }
}

impl std::fmt::Display for GatewayWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetExceeded {
                project_id,
                estimated_cost,
                remaining,
            } => write!(
                f,
                "{}: auto-approval of {} exceeds remaining {}, escalated",
                project_id,
                format_dollars(*estimated_cost),
                format_dollars(*remaining)
            ),
            Self::BudgetInsufficientAtFinalization {
                project_id,
                estimated_cost,
                remaining,
            } => write!(
                f,
                "{}: human approval of {} exceeds remaining {}, finalized as REJECT",
                project_id,
                format_dollars(*estimated_cost),
                format_dollars(*remaining)
            ),
            Self::MandatedProjectRejected { project_id } => {
                write!(f, "{}: legally mandated project rejected by reviewer", project_id)
            }
        }
    }
}
