//! Escalation rules and their thresholds

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{format_dollars, Decision, PolicyDecision, Project, ReasonCode};

/// Thresholds the rules compare against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EscalationThresholds {
    /// Costs strictly above this escalate
    pub cost_threshold: u64,
    /// Confidence strictly below this escalates
    pub confidence_threshold: u8,
    /// Risk at or above this counts as high risk
    pub high_risk_threshold: f64,
    /// Population at or above this counts as broad impact
    pub high_population_threshold: u64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            cost_threshold: 10_000_000,
            confidence_threshold: 65,
            high_risk_threshold: 6.0,
            high_population_threshold: 200_000,
        }
    }
}

/// One escalation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationRule {
    CostThreshold,
    MandateRejectBlock,
    LowConfidence,
    HighRiskPopulation,
}

impl EscalationRule {
    /// Every rule, in reporting order
    pub const ALL: [EscalationRule; 4] = [
        Self::CostThreshold,
        Self::MandateRejectBlock,
        Self::LowConfidence,
        Self::HighRiskPopulation,
    ];

    pub fn name(&self) -> &'static str {
        self.reason_code().as_str()
    }

    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::CostThreshold => ReasonCode::CostThreshold,
            Self::MandateRejectBlock => ReasonCode::MandateRejectBlock,
            Self::LowConfidence => ReasonCode::LowConfidence,
            Self::HighRiskPopulation => ReasonCode::HighRiskPopulation,
        }
    }

    /// Whether the rule fires for this project and decision
    pub fn triggers(
        &self,
        thresholds: &EscalationThresholds,
        project: &Project,
        decision: &PolicyDecision,
    ) -> bool {
        match self {
            Self::CostThreshold => project.estimated_cost > thresholds.cost_threshold,
            Self::MandateRejectBlock => {
                project.legal_mandate && decision.recommended_decision == Decision::Reject
            }
            Self::LowConfidence => decision.confidence < thresholds.confidence_threshold,
            Self::HighRiskPopulation => {
                project.risk_score >= thresholds.high_risk_threshold
                    && project.population_affected >= thresholds.high_population_threshold
            }
        }
    }

    /// Human-readable explanation of why the rule fired
    pub fn explain(
        &self,
        thresholds: &EscalationThresholds,
        project: &Project,
        decision: &PolicyDecision,
    ) -> String {
        match self {
            Self::CostThreshold => format!(
                "cost {} exceeds {} threshold",
                format_dollars(project.estimated_cost),
                format_dollars(thresholds.cost_threshold)
            ),
            Self::MandateRejectBlock => {
                "legally mandated project cannot be auto-rejected".to_string()
            }
            Self::LowConfidence => format!(
                "confidence {}% below {}% threshold",
                decision.confidence, thresholds.confidence_threshold
            ),
            Self::HighRiskPopulation => format!(
                "risk {:.1} with {} residents affected (limits {:.1} / {})",
                project.risk_score,
                project.population_affected,
                thresholds.high_risk_threshold,
                thresholds.high_population_threshold
            ),
        }
    }
}

impl std::fmt::Display for EscalationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(rec: Decision, confidence: u8) -> PolicyDecision {
        PolicyDecision::new("PRJ-1", rec, confidence, "")
    }

    #[test]
    fn test_cost_threshold_is_strict() {
        let t = EscalationThresholds::default();
        let d = decision(Decision::Approve, 90);
        let at = Project::new("PRJ-1", "t", "c").with_cost(10_000_000);
        let above = Project::new("PRJ-1", "t", "c").with_cost(10_000_001);
        assert!(!EscalationRule::CostThreshold.triggers(&t, &at, &d));
        assert!(EscalationRule::CostThreshold.triggers(&t, &above, &d));
    }

    #[test]
    fn test_low_confidence_is_strict() {
        let t = EscalationThresholds::default();
        let p = Project::new("PRJ-1", "t", "c");
        assert!(!EscalationRule::LowConfidence.triggers(&t, &p, &decision(Decision::Approve, 65)));
        assert!(EscalationRule::LowConfidence.triggers(&t, &p, &decision(Decision::Approve, 64)));
    }

    #[test]
    fn test_high_risk_population_bounds_inclusive() {
        let t = EscalationThresholds::default();
        let d = decision(Decision::Approve, 90);
        let edge = Project::new("PRJ-1", "t", "c")
            .with_risk(6.0)
            .with_population(200_000);
        let below = Project::new("PRJ-1", "t", "c")
            .with_risk(5.9)
            .with_population(1_000_000);
        assert!(EscalationRule::HighRiskPopulation.triggers(&t, &edge, &d));
        assert!(!EscalationRule::HighRiskPopulation.triggers(&t, &below, &d));
    }

    #[test]
    fn test_mandate_rule_only_blocks_reject() {
        let t = EscalationThresholds::default();
        let p = Project::new("PRJ-1", "t", "c").with_legal_mandate(true);
        assert!(EscalationRule::MandateRejectBlock.triggers(&t, &p, &decision(Decision::Reject, 99)));
        assert!(!EscalationRule::MandateRejectBlock.triggers(&t, &p, &decision(Decision::Approve, 99)));
    }

    #[test]
    fn test_explain_cost() {
        let t = EscalationThresholds::default();
        let p = Project::new("PRJ-1", "t", "c").with_cost(15_000_000);
        let text = EscalationRule::CostThreshold.explain(&t, &p, &decision(Decision::Approve, 90));
        assert_eq!(text, "cost $15,000,000 exceeds $10,000,000 threshold");
    }

    #[test]
    fn test_rule_names_match_reason_codes() {
        let names: Vec<&str> = EscalationRule::ALL.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec![
                "COST_THRESHOLD",
                "MANDATE_REJECT_BLOCK",
                "LOW_CONFIDENCE",
                "HIGH_RISK_POPULATION"
            ]
        );
    }
}
