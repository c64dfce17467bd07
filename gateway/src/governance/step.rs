//! One governance pass over a project list

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult, GatewayWarning};
use crate::escalation::EscalationEngine;
use crate::governance::reasoner::{propose_with_retry, PolicyReasoner};
use crate::ledger::LedgerEntry;
use crate::model::{
    Authorization, Budget, Decision, DecisionSource, FinalDecision, Project, ProjectStatus,
    ReasonCode,
};

/// Governance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Reasoner calls per project: one call plus one retry
    pub max_attempts: u32,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// Result of a governance pass
#[derive(Debug, Clone)]
pub struct GovernanceReport {
    /// One entry per input project, in input order
    pub entries: Vec<LedgerEntry>,
    pub warnings: Vec<GatewayWarning>,
    pub budget_remaining: u64,
}

impl GovernanceReport {
    pub fn ids_with_status(&self, status: ProjectStatus) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.status == status)
            .map(|e| e.project.id.clone())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.status == ProjectStatus::Pending)
    }
}

/// Runs the reasoning collaborator and the escalation engine over a project list
pub struct GovernanceStep {
    reasoner: Arc<dyn PolicyReasoner>,
    engine: EscalationEngine,
    config: GovernanceConfig,
}

impl GovernanceStep {
    pub fn new(reasoner: Arc<dyn PolicyReasoner>, engine: EscalationEngine) -> Self {
        Self {
            reasoner,
            engine,
            config: GovernanceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GovernanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluate `projects` against `budget`.
    ///
    /// Proposals are requested concurrently; classification and budget
    /// deduction happen in input order. The budget is only written back when
    /// the whole pass succeeds, so a fatal error leaves it untouched.
    pub async fn run(
        &self,
        projects: &[Project],
        budget: &mut Budget,
    ) -> GatewayResult<GovernanceReport> {
        let reasoner = self.reasoner.as_ref();
        let proposals = join_all(
            projects
                .iter()
                .map(|project| propose_with_retry(reasoner, project, self.config.max_attempts)),
        )
        .await;

        let mut working = budget.clone();
        let mut entries = Vec::with_capacity(projects.len());
        let mut warnings = Vec::new();

        for (project, proposal) in projects.iter().zip(proposals) {
            let decision = match proposal {
                Ok(decision) => decision,
                Err(GatewayError::DecisionUnavailable {
                    attempts, message, ..
                }) => {
                    warn!(
                        project_id = %project.id,
                        attempts,
                        error = %message,
                        "Excluding project: no policy decision"
                    );
                    let mut entry = LedgerEntry::new(project.clone(), ProjectStatus::Excluded);
                    entry.exclusion_reason = Some(format!(
                        "decision unavailable after {attempts} attempt(s): {message}"
                    ));
                    entries.push(entry);
                    continue;
                }
                Err(e) => return Err(e),
            };

            decision.validate_for(project)?;

            let mut outcome = self.engine.evaluate(project, &decision);
            let mut entry = LedgerEntry::new(project.clone(), ProjectStatus::Pending);
            entry.reason_codes = outcome.reason_codes();

            match (outcome.authorization, decision.recommended_decision) {
                (Authorization::AutoApply, Decision::Approve) => {
                    match working.allocate(project.estimated_cost) {
                        Ok(_) => {
                            entry.status = ProjectStatus::AutoApproved;
                            entry.final_decision =
                                Some(policy_final(project, Decision::Approve));
                        }
                        Err(shortfall) => {
                            warn!(
                                project_id = %project.id,
                                %shortfall,
                                "Auto-approval exceeds budget, escalating"
                            );
                            outcome.authorization = Authorization::RequiresHuman;
                            ReasonCode::push_unique(
                                &mut entry.reason_codes,
                                ReasonCode::BudgetExceeded,
                            );
                            warnings.push(GatewayWarning::BudgetExceeded {
                                project_id: project.id.clone(),
                                estimated_cost: shortfall.requested,
                                remaining: shortfall.remaining,
                            });
                        }
                    }
                }
                (Authorization::AutoApply, Decision::Reject) => {
                    entry.status = ProjectStatus::AutoRejected;
                    entry.final_decision = Some(policy_final(project, Decision::Reject));
                }
                (Authorization::RequiresHuman, _) => {}
            }

            entry.policy_decision = Some(decision);
            entry.escalation = Some(outcome);
            entries.push(entry);
        }

        *budget = working;

        let report = GovernanceReport {
            entries,
            warnings,
            budget_remaining: budget.remaining(),
        };
        info!(
            reasoner = reasoner.name(),
            auto_approved = report.ids_with_status(ProjectStatus::AutoApproved).len(),
            auto_rejected = report.ids_with_status(ProjectStatus::AutoRejected).len(),
            pending = report.ids_with_status(ProjectStatus::Pending).len(),
            excluded = report.ids_with_status(ProjectStatus::Excluded).len(),
            budget_remaining = report.budget_remaining,
            "Governance pass complete"
        );
        Ok(report)
    }
}

fn policy_final(project: &Project, decision: Decision) -> FinalDecision {
    FinalDecision {
        project_id: project.id.clone(),
        final_decision: decision,
        estimated_cost: project.estimated_cost,
        human_override: false,
        decided_by: DecisionSource::Policy,
        reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::reasoner::HeuristicReasoner;

    fn step() -> GovernanceStep {
        GovernanceStep::new(Arc::new(HeuristicReasoner::new()), EscalationEngine::new())
    }

    #[tokio::test]
    async fn test_classifies_each_project_once() {
        let projects = vec![
            Project::new("PRJ-1", "Bridge", "bridge_repair")
                .with_cost(1_000_000)
                .with_risk(5.5)
                .with_population(500),
            Project::new("PRJ-2", "Bench", "parks")
                .with_cost(50_000)
                .with_risk(1.0),
            Project::new("PRJ-3", "Sidewalk", "road_maintenance")
                .with_cost(300_000)
                .with_risk(4.0),
        ];
        let mut budget = Budget::new(5_000_000);
        let report = step().run(&projects, &mut budget).await.unwrap();

        assert_eq!(report.ids_with_status(ProjectStatus::AutoApproved), vec!["PRJ-1"]);
        assert_eq!(report.ids_with_status(ProjectStatus::AutoRejected), vec!["PRJ-2"]);
        assert_eq!(report.ids_with_status(ProjectStatus::Pending), vec!["PRJ-3"]);
        assert_eq!(budget.remaining(), 4_000_000);
        assert_eq!(report.budget_remaining, 4_000_000);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_forces_pending_in_input_order() {
        let projects = vec![
            Project::new("PRJ-A", "a", "c").with_cost(600_000).with_risk(5.0),
            Project::new("PRJ-B", "b", "c").with_cost(600_000).with_risk(5.0),
        ];
        let mut budget = Budget::new(1_000_000);
        let report = step().run(&projects, &mut budget).await.unwrap();

        assert_eq!(report.entries[0].status, ProjectStatus::AutoApproved);
        assert_eq!(report.entries[1].status, ProjectStatus::Pending);
        assert!(report.entries[1].reason_codes.contains(&ReasonCode::BudgetExceeded));
        let escalation = report.entries[1].escalation.as_ref().unwrap();
        assert_eq!(escalation.authorization, Authorization::RequiresHuman);
        assert!(escalation.triggered_rules.is_empty());
        assert_eq!(
            report.entries[0].escalation.as_ref().unwrap().authorization,
            Authorization::AutoApply
        );
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(budget.remaining(), 400_000);
    }

    #[tokio::test]
    async fn test_empty_project_list() {
        let mut budget = Budget::new(1_000);
        let report = step().run(&[], &mut budget).await.unwrap();
        assert!(report.entries.is_empty());
        assert!(!report.has_pending());
        assert_eq!(budget.remaining(), 1_000);
    }
}
