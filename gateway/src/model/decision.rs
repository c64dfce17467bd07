//! Policy, human and final decisions

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::model::{Project, ReasonCode};

/// Binary funding decision. There is no "defer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "APPROVE"),
            Self::Reject => write!(f, "REJECT"),
        }
    }
}

/// Who may apply a policy decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authorization {
    /// The gateway applies the recommendation itself
    AutoApply,
    /// A human must confirm or override before anything takes effect
    RequiresHuman,
}

impl std::fmt::Display for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoApply => write!(f, "AUTO_APPLY"),
            Self::RequiresHuman => write!(f, "REQUIRES_HUMAN"),
        }
    }
}

/// Normalized output of one project evaluation by the reasoning collaborator.
///
/// Authorization never edits these fields; it only decides whether they take
/// effect without a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyDecision {
    /// Project this decision belongs to
    pub project_id: String,
    /// What the policy step recommends
    pub recommended_decision: Decision,
    /// Confidence percentage, 0-100 inclusive
    pub confidence: u8,
    /// Free text, opaque to the gateway
    #[serde(default)]
    pub rationale: String,
    /// Ordered set of codes explaining the recommendation
    #[serde(default)]
    pub reason_codes: Vec<ReasonCode>,
}

impl PolicyDecision {
    pub fn new(
        project_id: impl Into<String>,
        recommended_decision: Decision,
        confidence: u8,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            recommended_decision,
            confidence,
            rationale: rationale.into(),
            reason_codes: Vec::new(),
        }
    }

    pub fn with_reason_code(mut self, code: ReasonCode) -> Self {
        ReasonCode::push_unique(&mut self.reason_codes, code);
        self
    }

    /// Check the decision honours its contract for `project`
    pub fn validate_for(&self, project: &Project) -> GatewayResult<()> {
        if self.project_id != project.id {
            return Err(GatewayError::invalid_decision(
                &project.id,
                format!("decision is addressed to project '{}'", self.project_id),
            ));
        }
        if self.confidence > 100 {
            return Err(GatewayError::invalid_decision(
                &project.id,
                format!("confidence {} is outside 0-100", self.confidence),
            ));
        }
        Ok(())
    }
}

/// A reviewer's answer for an escalated project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HumanDecision {
    pub project_id: String,
    pub final_decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HumanDecision {
    pub fn new(project_id: impl Into<String>, final_decision: Decision) -> Self {
        Self {
            project_id: project_id.into(),
            final_decision,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Which authority applied the final decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Policy,
    Human,
}

/// Decision consumed by scheduling; immutable once scheduling runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FinalDecision {
    pub project_id: String,
    pub final_decision: Decision,
    pub estimated_cost: u64,
    /// True when the reviewer's answer differs from the policy recommendation
    pub human_override: bool,
    pub decided_by: DecisionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Where a project sits in the run ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    AutoApproved,
    AutoRejected,
    /// Escalated, waiting for (or holding an unmerged) human decision
    Pending,
    HumanApproved,
    HumanRejected,
    /// Reasoning collaborator could not produce a decision
    Excluded,
}

impl ProjectStatus {
    /// Whether the status can no longer change within the run
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::AutoApproved | Self::HumanApproved)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::AutoRejected => write!(f, "auto_rejected"),
            Self::Pending => write!(f, "pending"),
            Self::HumanApproved => write!(f, "human_approved"),
            Self::HumanRejected => write!(f, "human_rejected"),
            Self::Excluded => write!(f, "excluded"),
        }
    }
}
