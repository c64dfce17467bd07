//! Reasoning collaborator
//!
//! The policy step that proposes a decision per project. The gateway treats it
//! as a black box returning a [`PolicyDecision`]; implementations are
//! swappable, including the deterministic [`HeuristicReasoner`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::model::{Decision, PolicyDecision, Project, ReasonCode};

/// Errors from a reasoning collaborator
#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reasoner unavailable: {0}")]
    Unavailable(String),
}

/// Proposes a policy decision for one project
#[async_trait]
pub trait PolicyReasoner: Send + Sync {
    /// Short identifier used in logs and audit events
    fn name(&self) -> &'static str;

    /// Evaluate a project and recommend a decision
    async fn propose(&self, project: &Project) -> Result<PolicyDecision, ReasonerError>;
}

/// Call the reasoner at most `max_attempts` times.
///
/// Only collaborator failures are retried. Exhausting the attempts surfaces as
/// `DecisionUnavailable` for this project alone.
pub async fn propose_with_retry(
    reasoner: &dyn PolicyReasoner,
    project: &Project,
    max_attempts: u32,
) -> GatewayResult<PolicyDecision> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match reasoner.propose(project).await {
            Ok(decision) => {
                debug!(
                    project_id = %project.id,
                    reasoner = reasoner.name(),
                    attempt,
                    "Policy decision received"
                );
                return Ok(decision);
            }
            Err(e) => {
                if attempt < max_attempts {
                    warn!(
                        project_id = %project.id,
                        reasoner = reasoner.name(),
                        attempt,
                        error = %e,
                        "Reasoner failed, retrying"
                    );
                }
                last_error = Some(e);
            }
        }
    }

    Err(GatewayError::DecisionUnavailable {
        project_id: project.id.clone(),
        attempts: max_attempts,
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string()),
    })
}

/// Deterministic reasoner following the municipal governance guidelines.
///
/// - legal mandate → APPROVE at 90
/// - risk ≥ 5 → APPROVE at 85
/// - risk < 3 → REJECT at 80
/// - anything else → APPROVE at 60, which lands in human review
#[derive(Debug, Clone, Default)]
pub struct HeuristicReasoner;

impl HeuristicReasoner {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`PolicyReasoner::propose`]
    pub fn decide(&self, project: &Project) -> PolicyDecision {
        let mut decision = if project.legal_mandate {
            PolicyDecision::new(
                &project.id,
                Decision::Approve,
                90,
                format!("{} is required by a legal mandate", project.title),
            )
            .with_reason_code(ReasonCode::LegalMandate)
        } else if project.risk_score >= 5.0 {
            PolicyDecision::new(
                &project.id,
                Decision::Approve,
                85,
                format!(
                    "Risk {:.1}/8 makes {} safety critical",
                    project.risk_score, project.title
                ),
            )
            .with_reason_code(ReasonCode::HighRisk)
            .with_reason_code(ReasonCode::SafetyCritical)
        } else if project.risk_score < 3.0 {
            PolicyDecision::new(
                &project.id,
                Decision::Reject,
                80,
                format!("Risk {:.1}/8 is low priority", project.risk_score),
            )
            .with_reason_code(ReasonCode::LowPriority)
        } else {
            PolicyDecision::new(
                &project.id,
                Decision::Approve,
                60,
                format!(
                    "Moderate risk {:.1}/8; benefits and cost are balanced",
                    project.risk_score
                ),
            )
            .with_reason_code(ReasonCode::ConflictingPriorities)
        };

        if project.population_affected >= 100_000 {
            decision = decision.with_reason_code(ReasonCode::HighPopulationImpact);
        }
        decision
    }
}

#[async_trait]
impl PolicyReasoner for HeuristicReasoner {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn propose(&self, project: &Project) -> Result<PolicyDecision, ReasonerError> {
        Ok(self.decide(project))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyReasoner {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PolicyReasoner for FlakyReasoner {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn propose(&self, project: &Project) -> Result<PolicyDecision, ReasonerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures_before_success {
                Err(ReasonerError::Unavailable(format!("call {call}")))
            } else {
                Ok(PolicyDecision::new(&project.id, Decision::Approve, 90, "ok"))
            }
        }
    }

    #[test]
    fn test_heuristic_mandate_first() {
        let project = Project::new("PRJ-1", "Lead pipe", "water_infrastructure")
            .with_risk(1.0)
            .with_legal_mandate(true);
        let decision = HeuristicReasoner::new().decide(&project);
        assert_eq!(decision.recommended_decision, Decision::Approve);
        assert_eq!(decision.confidence, 90);
        assert_eq!(decision.reason_codes, vec![ReasonCode::LegalMandate]);
    }

    #[test]
    fn test_heuristic_risk_bands() {
        let reasoner = HeuristicReasoner::new();

        let high = reasoner.decide(&Project::new("A", "a", "c").with_risk(5.0));
        assert_eq!(high.recommended_decision, Decision::Approve);
        assert_eq!(high.confidence, 85);

        let low = reasoner.decide(&Project::new("B", "b", "c").with_risk(2.9));
        assert_eq!(low.recommended_decision, Decision::Reject);
        assert_eq!(low.reason_codes, vec![ReasonCode::LowPriority]);

        let mid = reasoner.decide(&Project::new("C", "c", "c").with_risk(4.0));
        assert_eq!(mid.confidence, 60);
        assert!(mid.reason_codes.contains(&ReasonCode::ConflictingPriorities));
    }

    #[test]
    fn test_heuristic_flags_population_impact() {
        let project = Project::new("PRJ-1", "t", "c")
            .with_risk(4.0)
            .with_population(150_000);
        let decision = HeuristicReasoner::new().decide(&project);
        assert!(decision.reason_codes.contains(&ReasonCode::HighPopulationImpact));
    }

    #[tokio::test]
    async fn test_single_retry_recovers() {
        let reasoner = FlakyReasoner {
            failures_before_success: 1,
            calls: AtomicU32::new(0),
        };
        let project = Project::new("PRJ-1", "t", "c");
        let decision = propose_with_retry(&reasoner, &project, 2).await.unwrap();
        assert_eq!(decision.project_id, "PRJ-1");
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_unavailable() {
        let reasoner = FlakyReasoner {
            failures_before_success: 5,
            calls: AtomicU32::new(0),
        };
        let project = Project::new("PRJ-1", "t", "c");
        let err = propose_with_retry(&reasoner, &project, 2).await.unwrap_err();
        match err {
            GatewayError::DecisionUnavailable {
                project_id,
                attempts,
                message,
            } => {
                assert_eq!(project_id, "PRJ-1");
                assert_eq!(attempts, 2);
                assert!(message.contains("call 2"), "message: {message}");
            }
            other => panic!("Expected DecisionUnavailable, got: {other:?}"),
        }
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 2);
    }
}
