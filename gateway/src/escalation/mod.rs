//! Escalation Rule Engine — who may apply a policy decision
//!
//! Separates "what should happen" (a [`PolicyDecision`](crate::model::PolicyDecision))
//! from "who is authorized to apply it". Every rule is evaluated on every call;
//! any match forces the decision into the human review queue.
//!
//! # Rule Set
//!
//! ```text
//! COST_THRESHOLD        estimated_cost > $10,000,000
//! MANDATE_REJECT_BLOCK  legal_mandate && recommended REJECT
//! LOW_CONFIDENCE        confidence < 65
//! HIGH_RISK_POPULATION  risk_score >= 6 && population_affected >= 200,000
//!
//! no rule   → AUTO_APPLY
//! any rule  → REQUIRES_HUMAN
//! ```
//!
//! This module is pure: no I/O, no clocks, no reasoning calls.

pub mod engine;
pub mod rules;

pub use engine::{EscalationEngine, EscalationOutcome, TriggeredRule};
pub use rules::{EscalationRule, EscalationThresholds};
