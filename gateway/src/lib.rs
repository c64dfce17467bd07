//! Human-in-the-loop decision gateway for municipal capital planning
//!
//! This library provides:
//! - An escalation rule engine deciding whether a policy decision may be
//!   applied automatically or must wait for a human
//! - A governance step that obtains policy decisions and enforces the budget
//! - A pipeline state machine that suspends at human review and resumes from
//!   a persisted snapshot
//! - Formation (issues → projects) and scheduling (approvals → calendar)
//!
//! # Pipeline
//!
//! ```text
//! issues ─▶ formation ─▶ projects ─▶ governance ─┬─▶ auto-approved ─┐
//!                                                ├─▶ auto-rejected  │
//!                                                ├─▶ pending ──human──▶ final decisions ─▶ scheduling
//!                                                └─▶ excluded
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use hitl_gateway::{GatewayConfig, HeuristicReasoner, HitlPipeline, InMemoryStore, Project};
//!
//! # async fn run() -> hitl_gateway::GatewayResult<()> {
//! let mut pipeline = HitlPipeline::new(
//!     &GatewayConfig::default(),
//!     Arc::new(HeuristicReasoner::new()),
//!     Arc::new(InMemoryStore::new()),
//! );
//! let outcome = pipeline
//!     .submit(vec![Project::new("PRJ-1", "Water main", "water_infrastructure")], 5_000_000)
//!     .await?;
//! println!("{} pending review", outcome.pending.len());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod escalation;
pub mod formation;
pub mod governance;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod scheduling;
pub mod store;
pub mod transport;

pub use audit::{AuditBus, AuditEvent, AuditKind, SharedAuditBus};
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult, GatewayWarning, StructuredError};
pub use escalation::{EscalationEngine, EscalationOutcome, EscalationRule, EscalationThresholds};
pub use formation::{FormationStep, Issue};
pub use governance::{
    propose_with_retry, GovernanceConfig, GovernanceReport, GovernanceStep, HeuristicReasoner,
    PolicyReasoner, ReasonerError,
};
pub use ledger::{Ledger, LedgerEntry};
pub use model::{
    format_dollars, Authorization, Budget, Decision, DecisionSource, FinalDecision,
    HumanDecision, PolicyDecision, Project, ProjectStatus, ReasonCode,
};
pub use pipeline::{
    DecisionAck, HitlPipeline, PendingReview, PipelinePhase, PipelineResults, PipelineSnapshot,
    PipelineSummary, ScheduleOutcome, SubmitOutcome,
};
pub use scheduling::{CalendarConfig, Placement, Schedule, ScheduleTask, Scheduler};
pub use store::{DecisionStore, InMemoryStore, JsonFileStore, SharedDecisionStore, StoreError};
pub use transport::SharedPipeline;
