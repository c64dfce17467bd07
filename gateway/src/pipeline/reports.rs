//! Values returned by pipeline operations

use serde::{Deserialize, Serialize};

use crate::error::GatewayWarning;
use crate::escalation::TriggeredRule;
use crate::ledger::{Ledger, LedgerEntry};
use crate::model::{Budget, Decision, FinalDecision, ProjectStatus, ReasonCode};
use crate::pipeline::state::PipelinePhase;
use crate::scheduling::Schedule;

/// An escalated project as a reviewer sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
    pub project_id: String,
    pub title: String,
    pub category: String,
    pub estimated_cost: u64,
    pub risk_score: f64,
    pub population_affected: u64,
    pub legal_mandate: bool,
    pub recommended_decision: Decision,
    pub confidence: u8,
    pub rationale: String,
    pub triggered_rules: Vec<TriggeredRule>,
    /// Rule codes plus budget enforcement codes
    pub reason_codes: Vec<ReasonCode>,
    /// Decision already supplied for this project, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_decision: Option<Decision>,
}

impl PendingReview {
    /// Build from a pending ledger entry; `None` for anything else
    pub fn from_entry(entry: &LedgerEntry) -> Option<Self> {
        if entry.status != ProjectStatus::Pending {
            return None;
        }
        let decision = entry.policy_decision.as_ref()?;
        Some(Self {
            project_id: entry.project.id.clone(),
            title: entry.project.title.clone(),
            category: entry.project.category.clone(),
            estimated_cost: entry.project.estimated_cost,
            risk_score: entry.project.risk_score,
            population_affected: entry.project.population_affected,
            legal_mandate: entry.project.legal_mandate,
            recommended_decision: decision.recommended_decision,
            confidence: decision.confidence,
            rationale: decision.rationale.clone(),
            triggered_rules: entry
                .escalation
                .as_ref()
                .map(|o| o.triggered_rules.clone())
                .unwrap_or_default(),
            reason_codes: entry.reason_codes.clone(),
            human_decision: entry.human_decision.as_ref().map(|h| h.final_decision),
        })
    }
}

/// A project left out because no policy decision could be obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedProject {
    pub project_id: String,
    pub reason: String,
}

impl ExcludedProject {
    pub fn collect(ledger: &Ledger) -> Vec<Self> {
        ledger
            .with_status(ProjectStatus::Excluded)
            .map(|e| Self {
                project_id: e.project.id.clone(),
                reason: e.exclusion_reason.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// Response to `submit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub run_id: String,
    pub phase: PipelinePhase,
    pub auto_approved: Vec<String>,
    pub auto_rejected: Vec<String>,
    pub pending: Vec<PendingReview>,
    pub excluded: Vec<ExcludedProject>,
    pub budget_remaining: u64,
    pub warnings: Vec<GatewayWarning>,
}

/// Response to `apply_human_decisions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionAck {
    pub run_id: String,
    pub accepted: Vec<String>,
    /// Pending projects still without a decision
    pub awaiting: Vec<String>,
    pub ready_to_finalize: bool,
}

/// Response to `finalize_and_schedule`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub run_id: String,
    pub schedule: Schedule,
    pub summary: PipelineSummary,
}

/// Response to `get_results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResults {
    pub run_id: String,
    pub schedule: Schedule,
    pub decisions: Vec<FinalDecision>,
    pub excluded: Vec<ExcludedProject>,
    pub warnings: Vec<GatewayWarning>,
    pub summary: PipelineSummary,
}

/// Counts and budget figures for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub phase: PipelinePhase,
    pub projects_submitted: usize,
    pub auto_approved: usize,
    pub auto_rejected: usize,
    pub pending: usize,
    pub human_approved: usize,
    pub human_rejected: usize,
    pub excluded: usize,
    pub human_overrides: usize,
    pub scheduled: usize,
    pub blocked: usize,
    pub budget_total: u64,
    pub budget_allocated: u64,
    pub budget_remaining: u64,
    pub warnings: usize,
}

impl PipelineSummary {
    pub fn build(
        phase: PipelinePhase,
        ledger: &Ledger,
        budget: &Budget,
        schedule: Option<&Schedule>,
        warnings: usize,
    ) -> Self {
        Self {
            phase,
            projects_submitted: ledger.len(),
            auto_approved: ledger.count(ProjectStatus::AutoApproved),
            auto_rejected: ledger.count(ProjectStatus::AutoRejected),
            pending: ledger.count(ProjectStatus::Pending),
            human_approved: ledger.count(ProjectStatus::HumanApproved),
            human_rejected: ledger.count(ProjectStatus::HumanRejected),
            excluded: ledger.count(ProjectStatus::Excluded),
            human_overrides: ledger.human_overrides(),
            scheduled: schedule.map(|s| s.scheduled().count()).unwrap_or(0),
            blocked: schedule.map(|s| s.blocked().count()).unwrap_or(0),
            budget_total: budget.total(),
            budget_allocated: budget.allocated(),
            budget_remaining: budget.remaining(),
            warnings,
        }
    }
}
