//! Data model for a single pipeline run
//!
//! Projects are produced by formation and never mutated afterwards; policy
//! decisions, human decisions and final decisions attach to them by id.

pub mod budget;
pub mod decision;
pub mod project;
pub mod reason;

pub use budget::{format_dollars, Budget, BudgetShortfall};
pub use decision::{
    Authorization, Decision, DecisionSource, FinalDecision, HumanDecision, PolicyDecision,
    ProjectStatus,
};
pub use project::{validate_projects, Project, MAX_RISK_SCORE};
pub use reason::ReasonCode;
