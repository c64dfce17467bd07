//! HITL Pipeline State Machine
//!
//! ```text
//! INPUT ──submit──▶ GOVERNANCE_RUNNING ──pending?──▶ AWAITING_HUMAN
//!                          │                              │ apply_human_decisions
//!                          │ none pending                 │ finalize_and_schedule
//!                          ▼                              ▼
//!                  SCHEDULING_RUNNING ◀───────────────────┘
//!                          │ finalize_and_schedule
//!                          ▼
//!                      COMPLETE
//!
//! any non-terminal phase ──fatal error──▶ FAILED
//! ```
//!
//! The suspend at `AWAITING_HUMAN` is a checkpoint, not an in-memory wait:
//! the snapshot is persisted and any process can resume the run later.

pub mod reports;
pub mod runner;
pub mod snapshot;
pub mod state;

pub use reports::{
    DecisionAck, ExcludedProject, PendingReview, PipelineResults, PipelineSummary,
    ScheduleOutcome, SubmitOutcome,
};
pub use runner::HitlPipeline;
pub use snapshot::PipelineSnapshot;
pub use state::{PhaseMachine, PipelinePhase, TransitionRecord};
