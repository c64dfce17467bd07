//! Escalation Engine — deterministic authorization of policy decisions
//!
//! Consumes a Project and its PolicyDecision to produce an EscalationOutcome.
//! All rules are evaluated; the outcome lists every rule that fired.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::escalation::rules::{EscalationRule, EscalationThresholds};
use crate::model::{Authorization, PolicyDecision, Project, ReasonCode};

/// A rule that fired, with its explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TriggeredRule {
    pub rule: EscalationRule,
    pub explanation: String,
}

/// Outcome of evaluating one project. Derived, never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EscalationOutcome {
    pub authorization: Authorization,
    /// Every rule that fired, in rule order
    pub triggered_rules: Vec<TriggeredRule>,
}

impl EscalationOutcome {
    pub fn requires_human(&self) -> bool {
        self.authorization == Authorization::RequiresHuman
    }

    /// Names of the rules that fired, e.g. `["COST_THRESHOLD"]`
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.triggered_rules.iter().map(|t| t.rule.name()).collect()
    }

    pub fn reason_codes(&self) -> Vec<ReasonCode> {
        self.triggered_rules
            .iter()
            .map(|t| t.rule.reason_code())
            .collect()
    }

    pub fn has_rule(&self, rule: EscalationRule) -> bool {
        self.triggered_rules.iter().any(|t| t.rule == rule)
    }
}

/// Pure function over (project, decision)
#[derive(Debug, Clone, Default)]
pub struct EscalationEngine {
    thresholds: EscalationThresholds,
}

impl EscalationEngine {
    /// Create a new engine with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom thresholds
    pub fn with_thresholds(thresholds: EscalationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &EscalationThresholds {
        &self.thresholds
    }

    /// Evaluate every rule and decide who may apply `decision`.
    ///
    /// Escalation is monotonic: one fired rule is enough, and nothing else can
    /// cancel it.
    pub fn evaluate(&self, project: &Project, decision: &PolicyDecision) -> EscalationOutcome {
        let triggered_rules: Vec<TriggeredRule> = EscalationRule::ALL
            .iter()
            .filter(|rule| rule.triggers(&self.thresholds, project, decision))
            .map(|rule| TriggeredRule {
                rule: *rule,
                explanation: rule.explain(&self.thresholds, project, decision),
            })
            .collect();

        let authorization = if triggered_rules.is_empty() {
            Authorization::AutoApply
        } else {
            Authorization::RequiresHuman
        };

        debug!(
            project_id = %project.id,
            recommended = %decision.recommended_decision,
            confidence = decision.confidence,
            authorization = %authorization,
            rules = ?triggered_rules.iter().map(|t| t.rule.name()).collect::<Vec<_>>(),
            "Evaluated escalation rules"
        );

        EscalationOutcome {
            authorization,
            triggered_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Decision;

    fn project(cost: u64, risk: f64, population: u64, mandate: bool) -> Project {
        Project::new("PRJ-T", "Test project", "road_maintenance")
            .with_cost(cost)
            .with_risk(risk)
            .with_population(population)
            .with_legal_mandate(mandate)
    }

    fn decision(rec: Decision, confidence: u8) -> PolicyDecision {
        PolicyDecision::new("PRJ-T", rec, confidence, "test")
    }

    #[test]
    fn test_clean_project_auto_applies() {
        let engine = EscalationEngine::new();
        let outcome = engine.evaluate(
            &project(1_000_000, 1.0, 500, false),
            &decision(Decision::Approve, 90),
        );
        assert_eq!(outcome.authorization, Authorization::AutoApply);
        assert!(outcome.triggered_rules.is_empty());
        assert!(!outcome.requires_human());
    }

    #[test]
    fn test_all_rules_reported_without_short_circuit() {
        let engine = EscalationEngine::new();
        let outcome = engine.evaluate(
            &project(20_000_000, 7.5, 400_000, true),
            &decision(Decision::Reject, 30),
        );
        assert_eq!(
            outcome.rule_names(),
            vec![
                "COST_THRESHOLD",
                "MANDATE_REJECT_BLOCK",
                "LOW_CONFIDENCE",
                "HIGH_RISK_POPULATION"
            ]
        );
        assert!(outcome.requires_human());
        assert_eq!(outcome.reason_codes().len(), 4);
    }

    #[test]
    fn test_mandated_approval_can_auto_apply() {
        let engine = EscalationEngine::new();
        let outcome = engine.evaluate(
            &project(3_000_000, 4.0, 10_000, true),
            &decision(Decision::Approve, 90),
        );
        assert_eq!(outcome.authorization, Authorization::AutoApply);
    }

    #[test]
    fn test_custom_thresholds() {
        let engine = EscalationEngine::with_thresholds(EscalationThresholds {
            cost_threshold: 1_000_000,
            ..Default::default()
        });
        let outcome = engine.evaluate(
            &project(1_500_000, 1.0, 100, false),
            &decision(Decision::Approve, 90),
        );
        assert!(outcome.has_rule(EscalationRule::CostThreshold));
    }

    #[test]
    fn test_outcome_serialization() {
        let engine = EscalationEngine::new();
        let outcome = engine.evaluate(
            &project(2_000_000, 3.0, 1_000, false),
            &decision(Decision::Approve, 40),
        );
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"authorization\":\"REQUIRES_HUMAN\""), "JSON: {json}");
        assert!(json.contains("\"rule\":\"LOW_CONFIDENCE\""), "JSON: {json}");
    }
}
