//! Run ledger — one entry per submitted project
//!
//! Every input project ends in exactly one status; nothing is dropped. Entries
//! keep input order, which is also the budget-deduction order.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::escalation::EscalationOutcome;
use crate::model::{
    Decision, FinalDecision, HumanDecision, PolicyDecision, Project, ProjectStatus, ReasonCode,
};

/// Everything known about one project within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerEntry {
    pub project: Project,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_decision: Option<PolicyDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationOutcome>,
    /// Gateway reason codes: fired rules plus budget enforcement
    #[serde(default)]
    pub reason_codes: Vec<ReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_decision: Option<HumanDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<FinalDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion_reason: Option<String>,
}

impl LedgerEntry {
    pub fn new(project: Project, status: ProjectStatus) -> Self {
        Self {
            project,
            status,
            policy_decision: None,
            escalation: None,
            reason_codes: Vec::new(),
            human_decision: None,
            final_decision: None,
            exclusion_reason: None,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project.id
    }

    /// Recommendation from the policy step, if one was produced
    pub fn recommended_decision(&self) -> Option<Decision> {
        self.policy_decision.as_ref().map(|d| d.recommended_decision)
    }

    pub fn is_awaiting_human(&self) -> bool {
        self.status == ProjectStatus::Pending && self.human_decision.is_none()
    }
}

/// Ordered collection of ledger entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, project_id: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.project.id == project_id)
    }

    pub fn get_mut(&mut self, project_id: &str) -> Option<&mut LedgerEntry> {
        self.entries.iter_mut().find(|e| e.project.id == project_id)
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut LedgerEntry> {
        self.entries.iter_mut()
    }

    pub fn with_status(&self, status: ProjectStatus) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    pub fn count(&self, status: ProjectStatus) -> usize {
        self.with_status(status).count()
    }

    /// Ids of every escalated project still in the pending set
    pub fn pending_ids(&self) -> Vec<String> {
        self.with_status(ProjectStatus::Pending)
            .map(|e| e.project.id.clone())
            .collect()
    }

    /// Ids of pending projects that have no human decision yet
    pub fn awaiting_decision(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.is_awaiting_human())
            .map(|e| e.project.id.clone())
            .collect()
    }

    /// Final decisions in input order
    pub fn final_decisions(&self) -> Vec<FinalDecision> {
        self.entries
            .iter()
            .filter_map(|e| e.final_decision.clone())
            .collect()
    }

    /// Projects whose final decision is APPROVE, in input order
    pub fn approved_projects(&self) -> Vec<&Project> {
        self.entries
            .iter()
            .filter(|e| {
                e.final_decision
                    .as_ref()
                    .is_some_and(|d| d.final_decision == Decision::Approve)
            })
            .map(|e| &e.project)
            .collect()
    }

    pub fn human_overrides(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.final_decision.as_ref().is_some_and(|d| d.human_override))
            .count()
    }

    /// Sum of costs of every final APPROVE
    pub fn approved_cost(&self) -> u64 {
        self.approved_projects()
            .iter()
            .map(|p| p.estimated_cost)
            .sum()
    }
}
