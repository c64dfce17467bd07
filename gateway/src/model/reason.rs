//! Reason codes attached to decisions and escalations

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Short machine-readable tag explaining a decision or an escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    // Escalation rules
    CostThreshold,
    MandateRejectBlock,
    LowConfidence,
    HighRiskPopulation,

    // Budget enforcement by the gateway
    BudgetExceeded,
    BudgetInsufficientAtFinalization,

    // Advisory codes a reasoner may attach
    LegalMandate,
    SafetyCritical,
    ConflictingPriorities,
    HighRisk,
    HighPopulationImpact,
    WithinPolicy,
    LowPriority,
    BudgetOptimized,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostThreshold => "COST_THRESHOLD",
            Self::MandateRejectBlock => "MANDATE_REJECT_BLOCK",
            Self::LowConfidence => "LOW_CONFIDENCE",
            Self::HighRiskPopulation => "HIGH_RISK_POPULATION",
            Self::BudgetExceeded => "BUDGET_EXCEEDED",
            Self::BudgetInsufficientAtFinalization => "BUDGET_INSUFFICIENT_AT_FINALIZATION",
            Self::LegalMandate => "LEGAL_MANDATE",
            Self::SafetyCritical => "SAFETY_CRITICAL",
            Self::ConflictingPriorities => "CONFLICTING_PRIORITIES",
            Self::HighRisk => "HIGH_RISK",
            Self::HighPopulationImpact => "HIGH_POPULATION_IMPACT",
            Self::WithinPolicy => "WITHIN_POLICY",
            Self::LowPriority => "LOW_PRIORITY",
            Self::BudgetOptimized => "BUDGET_OPTIMIZED",
        }
    }

    /// Append `code` unless already present (reason codes are an ordered set)
    pub fn push_unique(codes: &mut Vec<ReasonCode>, code: ReasonCode) {
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_matches_display() {
        for code in [
            ReasonCode::CostThreshold,
            ReasonCode::BudgetInsufficientAtFinalization,
            ReasonCode::HighRiskPopulation,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
        }
    }

    #[test]
    fn test_push_unique_keeps_order() {
        let mut codes = vec![ReasonCode::LowConfidence];
        ReasonCode::push_unique(&mut codes, ReasonCode::CostThreshold);
        ReasonCode::push_unique(&mut codes, ReasonCode::LowConfidence);
        assert_eq!(
            codes,
            vec![ReasonCode::LowConfidence, ReasonCode::CostThreshold]
        );
    }
}
