//! Governance Step
//!
//! Obtains one policy decision per project from the reasoning collaborator,
//! authorizes it through the escalation engine and classifies the project as
//! auto-approved, auto-rejected, pending or excluded while tracking budget.

pub mod reasoner;
pub mod step;

pub use reasoner::{propose_with_retry, HeuristicReasoner, PolicyReasoner, ReasonerError};
pub use step::{GovernanceConfig, GovernanceReport, GovernanceStep};
