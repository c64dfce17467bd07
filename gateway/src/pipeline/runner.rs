//! HITL pipeline — sequences governance, human review and scheduling
//!
//! All run state lives in a [`PipelineSnapshot`] that is checkpointed to the
//! persistence collaborator after every mutation, so a run suspended at
//! `AWAITING_HUMAN` can be resumed by another process at any later time.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::audit::{AuditBus, AuditEvent, AuditKind, SharedAuditBus};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult, GatewayWarning};
use crate::escalation::EscalationEngine;
use crate::governance::{GovernanceReport, GovernanceStep, PolicyReasoner};
use crate::ledger::{Ledger, LedgerEntry};
use crate::model::{
    validate_projects, Authorization, Budget, Decision, DecisionSource, FinalDecision,
    HumanDecision, Project, ProjectStatus, ReasonCode,
};
use crate::pipeline::reports::{
    DecisionAck, ExcludedProject, PendingReview, PipelineResults, PipelineSummary,
    ScheduleOutcome, SubmitOutcome,
};
use crate::pipeline::snapshot::PipelineSnapshot;
use crate::pipeline::state::PipelinePhase;
use crate::scheduling::{Placement, Scheduler};
use crate::store::SharedDecisionStore;

pub struct HitlPipeline {
    snapshot: PipelineSnapshot,
    governance: GovernanceStep,
    scheduler: Scheduler,
    store: SharedDecisionStore,
    bus: SharedAuditBus,
}

impl HitlPipeline {
    /// Start a fresh run in `INPUT`
    pub fn new(
        config: &GatewayConfig,
        reasoner: Arc<dyn PolicyReasoner>,
        store: SharedDecisionStore,
    ) -> Self {
        Self::resume(PipelineSnapshot::new(Budget::new(0)), config, reasoner, store)
    }

    /// Rebuild a pipeline around a persisted snapshot
    pub fn resume(
        snapshot: PipelineSnapshot,
        config: &GatewayConfig,
        reasoner: Arc<dyn PolicyReasoner>,
        store: SharedDecisionStore,
    ) -> Self {
        let engine = EscalationEngine::with_thresholds(config.escalation.clone());
        Self {
            snapshot,
            governance: GovernanceStep::new(reasoner, engine)
                .with_config(config.governance.clone()),
            scheduler: Scheduler::new(config.calendar.clone()),
            store,
            bus: AuditBus::new().shared(),
        }
    }

    /// Load `run_id` from the store and resume it
    pub fn resume_run(
        run_id: &str,
        config: &GatewayConfig,
        reasoner: Arc<dyn PolicyReasoner>,
        store: SharedDecisionStore,
    ) -> GatewayResult<Self> {
        let snapshot = store
            .load_snapshot(run_id)?
            .ok_or_else(|| GatewayError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
        info!(run_id, phase = %snapshot.phase(), "Resuming pipeline run");
        Ok(Self::resume(snapshot, config, reasoner, store))
    }

    /// Publish audit events on a shared bus instead of a private one
    pub fn with_bus(mut self, bus: SharedAuditBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.snapshot.run_id
    }

    pub fn phase(&self) -> PipelinePhase {
        self.snapshot.phase()
    }

    pub fn snapshot(&self) -> &PipelineSnapshot {
        &self.snapshot
    }

    pub fn ledger(&self) -> &Ledger {
        &self.snapshot.ledger
    }

    pub fn budget(&self) -> &Budget {
        &self.snapshot.budget
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.bus.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Run governance over `projects` with a fresh budget of `budget_total`.
    ///
    /// Invalid input is rejected while still in `INPUT`. A fatal governance
    /// or store error moves the run to `FAILED` with the budget untouched.
    pub async fn submit(
        &mut self,
        projects: Vec<Project>,
        budget_total: u64,
    ) -> GatewayResult<SubmitOutcome> {
        self.snapshot
            .machine
            .require(PipelinePhase::Input, PipelinePhase::GovernanceRunning)?;
        validate_projects(&projects)?;

        self.snapshot.budget = Budget::new(budget_total);
        self.transition(
            PipelinePhase::GovernanceRunning,
            Some(format!("{} project(s), budget {}", projects.len(), budget_total)),
        )?;

        let mut budget = self.snapshot.budget;
        let report = match self.govern(&projects, &mut budget).await {
            Ok(report) => report,
            Err(e) => return Err(self.abort(e)),
        };

        // Every record is persisted; commit the run state
        self.snapshot.budget = budget;
        for entry in &report.entries {
            self.audit_governance_entry(entry);
        }
        for warning in &report.warnings {
            self.push_warning(warning.clone());
        }
        self.snapshot.ledger = Ledger::from_entries(report.entries);

        if report_has_pending(&self.snapshot.ledger) {
            let pending = self.snapshot.ledger.pending_ids().len();
            self.transition(
                PipelinePhase::AwaitingHuman,
                Some(format!("{pending} project(s) need review")),
            )?;
        } else {
            self.transition(
                PipelinePhase::SchedulingRunning,
                Some("no escalations".to_string()),
            )?;
        }
        self.checkpoint()?;

        let ledger = &self.snapshot.ledger;
        Ok(SubmitOutcome {
            run_id: self.snapshot.run_id.clone(),
            phase: self.phase(),
            auto_approved: ids(ledger, ProjectStatus::AutoApproved),
            auto_rejected: ids(ledger, ProjectStatus::AutoRejected),
            pending: self.pending_reviews(),
            excluded: ExcludedProject::collect(ledger),
            budget_remaining: self.snapshot.budget.remaining(),
            warnings: self.snapshot.warnings.clone(),
        })
    }

    /// Escalated projects, in input order, with any decision already supplied
    pub fn pending_reviews(&self) -> Vec<PendingReview> {
        self.snapshot
            .ledger
            .entries()
            .iter()
            .filter_map(PendingReview::from_entry)
            .collect()
    }

    /// Record human decisions for escalated projects.
    ///
    /// The batch is validated and persisted as a whole before the ledger
    /// changes; a rejected or unpersisted batch leaves the run untouched.
    pub fn apply_human_decisions(
        &mut self,
        decisions: Vec<HumanDecision>,
    ) -> GatewayResult<DecisionAck> {
        self.snapshot
            .machine
            .require(PipelinePhase::AwaitingHuman, PipelinePhase::AwaitingHuman)?;

        let mut seen = HashSet::new();
        for decision in &decisions {
            let entry = self
                .snapshot
                .ledger
                .get(&decision.project_id)
                .filter(|e| e.status == ProjectStatus::Pending)
                .ok_or_else(|| GatewayError::UnknownPendingProject {
                    project_id: decision.project_id.clone(),
                })?;
            if entry.human_decision.is_some() || !seen.insert(decision.project_id.as_str()) {
                return Err(GatewayError::DuplicateHumanDecision {
                    project_id: decision.project_id.clone(),
                });
            }
        }

        for decision in &decisions {
            self.store.put_human_decision(decision)?;
        }

        let mut accepted = Vec::with_capacity(decisions.len());
        for decision in decisions {
            let Some(entry) = self.snapshot.ledger.get_mut(&decision.project_id) else {
                continue;
            };
            let human_override = entry.recommended_decision() != Some(decision.final_decision);
            let mandated_reject =
                entry.project.legal_mandate && decision.final_decision == Decision::Reject;
            entry.human_decision = Some(decision.clone());

            info!(
                project_id = %decision.project_id,
                decision = %decision.final_decision,
                human_override,
                "Human decision recorded"
            );
            self.emit(AuditKind::HumanDecision {
                project_id: decision.project_id.clone(),
                decision: decision.final_decision,
                human_override,
            });
            if mandated_reject {
                warn!(project_id = %decision.project_id, "Reviewer rejected a legally mandated project");
                self.push_warning(GatewayWarning::MandatedProjectRejected {
                    project_id: decision.project_id.clone(),
                });
            }
            accepted.push(decision.project_id);
        }

        self.checkpoint()?;

        let awaiting = self.snapshot.ledger.awaiting_decision();
        Ok(DecisionAck {
            run_id: self.snapshot.run_id.clone(),
            accepted,
            ready_to_finalize: awaiting.is_empty(),
            awaiting,
        })
    }

    /// Merge human decisions, then schedule every final approval.
    ///
    /// Fails with `IncompleteApprovals` while any escalated project lacks a
    /// decision; nothing is mutated in that case.
    pub fn finalize_and_schedule(&mut self) -> GatewayResult<ScheduleOutcome> {
        match self.phase() {
            PipelinePhase::AwaitingHuman => {
                let missing = self.snapshot.ledger.awaiting_decision();
                if !missing.is_empty() {
                    return Err(GatewayError::IncompleteApprovals { missing });
                }
                self.merge_human_decisions()?;
                self.transition(
                    PipelinePhase::SchedulingRunning,
                    Some("all reviews complete".to_string()),
                )?;
            }
            PipelinePhase::SchedulingRunning => {}
            other => {
                return Err(GatewayError::invalid_transition(
                    other,
                    PipelinePhase::SchedulingRunning,
                ))
            }
        }

        let schedule = {
            let approved = self.snapshot.ledger.approved_projects();
            self.scheduler.schedule(&approved)
        };
        for task in &schedule.tasks {
            let kind = match &task.placement {
                Placement::Scheduled {
                    start_week,
                    end_week,
                } => AuditKind::ProjectScheduled {
                    project_id: task.project_id.clone(),
                    crew_type: task.crew_type.clone(),
                    start_week: *start_week,
                    end_week: *end_week,
                },
                Placement::Blocked { reason } => {
                    warn!(project_id = %task.project_id, %reason, "Project blocked");
                    AuditKind::ProjectBlocked {
                        project_id: task.project_id.clone(),
                        reason: reason.clone(),
                    }
                }
            };
            self.emit(kind);
        }
        self.snapshot.schedule = Some(schedule.clone());

        self.transition(PipelinePhase::Complete, None)?;
        self.checkpoint()?;

        let summary = self.summary();
        info!(
            run_id = %self.snapshot.run_id,
            scheduled = summary.scheduled,
            blocked = summary.blocked,
            budget_remaining = summary.budget_remaining,
            "Pipeline run complete"
        );
        Ok(ScheduleOutcome {
            run_id: self.snapshot.run_id.clone(),
            schedule,
            summary,
        })
    }

    /// Schedule, decisions and summary of a completed run
    pub fn results(&self) -> GatewayResult<PipelineResults> {
        let schedule = match (&self.snapshot.schedule, self.phase()) {
            (Some(schedule), PipelinePhase::Complete) => schedule.clone(),
            (_, phase) => {
                return Err(GatewayError::ResultsNotReady {
                    phase: phase.to_string(),
                })
            }
        };
        Ok(PipelineResults {
            run_id: self.snapshot.run_id.clone(),
            schedule,
            decisions: self.snapshot.ledger.final_decisions(),
            excluded: ExcludedProject::collect(&self.snapshot.ledger),
            warnings: self.snapshot.warnings.clone(),
            summary: self.summary(),
        })
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary::build(
            self.phase(),
            &self.snapshot.ledger,
            &self.snapshot.budget,
            self.snapshot.schedule.as_ref(),
            self.snapshot.warnings.len(),
        )
    }

    /// Persist the current snapshot
    pub fn checkpoint(&mut self) -> GatewayResult<()> {
        self.snapshot.touch();
        self.store.save_snapshot(&self.snapshot)?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply human decisions to pending entries, charging approvals to budget.
    ///
    /// Works on a copy of the ledger and budget that replaces the run state
    /// only once every final decision is persisted.
    fn merge_human_decisions(&mut self) -> GatewayResult<()> {
        let mut ledger = self.snapshot.ledger.clone();
        let mut budget = self.snapshot.budget;
        let mut warnings = Vec::new();
        let mut finals = Vec::new();

        for entry in ledger.entries_mut() {
            if entry.status != ProjectStatus::Pending {
                continue;
            }
            let Some(human) = entry.human_decision.clone() else {
                continue;
            };
            let human_override = entry.recommended_decision() != Some(human.final_decision);

            let mut final_decision = human.final_decision;
            let mut reason = human.reason.clone();
            if final_decision == Decision::Approve {
                if let Err(shortfall) = budget.allocate(entry.project.estimated_cost) {
                    warn!(
                        project_id = %entry.project.id,
                        %shortfall,
                        "Human approval exceeds budget, finalizing as REJECT"
                    );
                    final_decision = Decision::Reject;
                    reason = Some(format!("budget insufficient at finalization: {shortfall}"));
                    ReasonCode::push_unique(
                        &mut entry.reason_codes,
                        ReasonCode::BudgetInsufficientAtFinalization,
                    );
                    warnings.push(GatewayWarning::BudgetInsufficientAtFinalization {
                        project_id: entry.project.id.clone(),
                        estimated_cost: shortfall.requested,
                        remaining: shortfall.remaining,
                    });
                }
            }

            entry.status = match final_decision {
                Decision::Approve => ProjectStatus::HumanApproved,
                Decision::Reject => ProjectStatus::HumanRejected,
            };
            let decision = FinalDecision {
                project_id: entry.project.id.clone(),
                final_decision,
                estimated_cost: entry.project.estimated_cost,
                human_override,
                decided_by: DecisionSource::Human,
                reason,
            };
            entry.final_decision = Some(decision.clone());
            finals.push(decision);
        }

        for decision in &finals {
            self.store.put_final_decision(decision)?;
        }
        self.snapshot.ledger = ledger;
        self.snapshot.budget = budget;
        for warning in warnings {
            self.push_warning(warning);
        }
        Ok(())
    }

    /// Persist the project list and run governance, writing every record
    /// before the caller commits anything to the snapshot
    async fn govern(
        &self,
        projects: &[Project],
        budget: &mut Budget,
    ) -> GatewayResult<GovernanceReport> {
        for project in projects {
            self.store.put_project(project)?;
        }
        let report = self.governance.run(projects, budget).await?;
        for entry in &report.entries {
            if let Some(decision) = &entry.policy_decision {
                self.store.put_policy_decision(decision)?;
            }
            if let Some(final_decision) = &entry.final_decision {
                self.store.put_final_decision(final_decision)?;
            }
        }
        Ok(report)
    }

    /// Move a run that failed mid-governance to `FAILED` and checkpoint it
    fn abort(&mut self, error: GatewayError) -> GatewayError {
        warn!(run_id = %self.snapshot.run_id, error = %error, "Governance failed, run aborted");
        if let Err(e) = self.transition(PipelinePhase::Failed, Some(error.to_string())) {
            warn!(error = %e, "Failed to mark run as failed");
        }
        if let Err(store_err) = self.checkpoint() {
            warn!(error = %store_err, "Failed to checkpoint failed run");
        }
        error
    }

    fn audit_governance_entry(&mut self, entry: &LedgerEntry) {
        if let Some(decision) = &entry.policy_decision {
            let (authorization, triggered_rules) = match &entry.escalation {
                Some(outcome) => (
                    outcome.authorization,
                    outcome.triggered_rules.iter().map(|t| t.rule).collect(),
                ),
                None => (Authorization::AutoApply, Vec::new()),
            };
            self.emit(AuditKind::PolicyDecision {
                project_id: entry.project.id.clone(),
                recommended: decision.recommended_decision,
                confidence: decision.confidence,
                authorization,
                triggered_rules,
            });
        }
        if entry.status == ProjectStatus::Excluded {
            self.emit(AuditKind::ProjectExcluded {
                project_id: entry.project.id.clone(),
                reason: entry.exclusion_reason.clone().unwrap_or_default(),
            });
        }
    }

    fn transition(&mut self, to: PipelinePhase, reason: Option<String>) -> GatewayResult<()> {
        let from = self.snapshot.machine.advance(to, reason.as_deref())?.from;
        self.snapshot.touch();
        self.emit(AuditKind::PhaseTransition { from, to });
        Ok(())
    }

    fn push_warning(&mut self, warning: GatewayWarning) {
        self.emit(AuditKind::Warning {
            warning: warning.clone(),
        });
        self.snapshot.warnings.push(warning);
    }

    fn emit(&mut self, kind: AuditKind) {
        let event = AuditEvent::new(self.snapshot.run_id.clone(), kind);
        self.snapshot.audit.push(event.clone());
        self.bus.publish(event);
    }
}

fn report_has_pending(ledger: &Ledger) -> bool {
    ledger.count(ProjectStatus::Pending) > 0
}

fn ids(ledger: &Ledger, status: ProjectStatus) -> Vec<String> {
    ledger
        .with_status(status)
        .map(|e| e.project.id.clone())
        .collect()
}
