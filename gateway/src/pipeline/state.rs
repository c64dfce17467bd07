//! Pipeline state machine — explicit phases and legal transition guards.
//!
//! Every transition is validated against the phase graph and recorded with a
//! timestamp, so a persisted machine can be replayed or resumed later.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// The phases of one pipeline run.
///
/// Every run starts at `Input` and ends at either `Complete` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelinePhase {
    /// Awaiting projects and budget.
    Input,
    /// Policy decisions are being produced and authorized.
    GovernanceRunning,
    /// Suspended until every escalated project has a human decision.
    AwaitingHuman,
    /// Decisions are final; approved projects are being placed.
    SchedulingRunning,
    /// Schedule and summary produced. Terminal.
    Complete,
    /// Governance failed atomically. Terminal.
    Failed,
}

impl PipelinePhase {
    /// Whether this is a terminal phase (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "INPUT"),
            Self::GovernanceRunning => write!(f, "GOVERNANCE_RUNNING"),
            Self::AwaitingHuman => write!(f, "AWAITING_HUMAN"),
            Self::SchedulingRunning => write!(f, "SCHEDULING_RUNNING"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Legal transitions between phases.
///
/// ```text
/// Input → GovernanceRunning | Failed
/// GovernanceRunning → AwaitingHuman | SchedulingRunning | Failed
/// AwaitingHuman → SchedulingRunning | Failed
/// SchedulingRunning → Complete | Failed
/// ```
fn is_legal_transition(from: PipelinePhase, to: PipelinePhase) -> bool {
    use PipelinePhase::*;

    // Any non-terminal phase can transition to Failed.
    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Input, GovernanceRunning)
            // Pending set non-empty → pause; empty → straight to scheduling
            | (GovernanceRunning, AwaitingHuman)
            | (GovernanceRunning, SchedulingRunning)
            | (AwaitingHuman, SchedulingRunning)
            | (SchedulingRunning, Complete)
    )
}

/// A single recorded phase transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PipelinePhase,
    pub to: PipelinePhase,
    pub at: DateTime<Utc>,
    /// Optional context about why this transition happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The pipeline phase machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMachine {
    current: PipelinePhase,
    transitions: Vec<TransitionRecord>,
}

impl PhaseMachine {
    /// Create a new machine starting at `Input`.
    pub fn new() -> Self {
        Self {
            current: PipelinePhase::Input,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelinePhase {
        self.current
    }

    /// Attempt to advance to the next phase.
    pub fn advance(
        &mut self,
        to: PipelinePhase,
        reason: Option<&str>,
    ) -> Result<&TransitionRecord, GatewayError> {
        if !is_legal_transition(self.current, to) {
            return Err(GatewayError::invalid_transition(self.current, to));
        }

        tracing::info!(from = %self.current, to = %to, "Pipeline phase transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            at: Utc::now(),
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(&self.transitions[self.transitions.len() - 1])
    }

    /// Transition to `Failed` from any non-terminal phase.
    pub fn fail(&mut self, reason: &str) -> Result<&TransitionRecord, GatewayError> {
        self.advance(PipelinePhase::Failed, Some(reason))
    }

    /// Fail unless the machine is in `expected`; used to guard operations.
    pub fn require(&self, expected: PipelinePhase, next: PipelinePhase) -> Result<(), GatewayError> {
        if self.current == expected {
            Ok(())
        } else {
            Err(GatewayError::invalid_transition(self.current, next))
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Get the full transition log.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Whether the machine ever entered `phase`
    pub fn visited(&self, phase: PipelinePhase) -> bool {
        self.transitions.iter().any(|t| t.to == phase)
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase() {
        let sm = PhaseMachine::new();
        assert_eq!(sm.current(), PipelinePhase::Input);
        assert!(!sm.is_terminal());
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_path_with_human_review() {
        let mut sm = PhaseMachine::new();
        sm.advance(PipelinePhase::GovernanceRunning, None).unwrap();
        sm.advance(PipelinePhase::AwaitingHuman, Some("2 pending")).unwrap();
        sm.advance(PipelinePhase::SchedulingRunning, None).unwrap();
        sm.advance(PipelinePhase::Complete, None).unwrap();

        assert!(sm.is_terminal());
        assert!(sm.visited(PipelinePhase::AwaitingHuman));
        assert_eq!(sm.transitions().len(), 4);
    }

    #[test]
    fn test_path_skipping_human_review() {
        let mut sm = PhaseMachine::new();
        sm.advance(PipelinePhase::GovernanceRunning, None).unwrap();
        sm.advance(PipelinePhase::SchedulingRunning, Some("no pending"))
            .unwrap();
        sm.advance(PipelinePhase::Complete, None).unwrap();
        assert!(!sm.visited(PipelinePhase::AwaitingHuman));
    }

    #[test]
    fn test_governance_not_reentrant() {
        let mut sm = PhaseMachine::new();
        sm.advance(PipelinePhase::GovernanceRunning, None).unwrap();
        sm.advance(PipelinePhase::AwaitingHuman, None).unwrap();
        let err = sm.advance(PipelinePhase::GovernanceRunning, None).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidTransition { .. }));
        assert_eq!(sm.current(), PipelinePhase::AwaitingHuman);
    }

    #[test]
    fn test_cannot_skip_governance() {
        let mut sm = PhaseMachine::new();
        assert!(sm.advance(PipelinePhase::SchedulingRunning, None).is_err());
        assert!(sm.advance(PipelinePhase::AwaitingHuman, None).is_err());
    }

    #[test]
    fn test_failure_from_non_terminal() {
        let mut sm = PhaseMachine::new();
        sm.advance(PipelinePhase::GovernanceRunning, None).unwrap();
        sm.fail("invalid policy decision").unwrap();
        assert_eq!(sm.current(), PipelinePhase::Failed);
        assert!(sm.fail("again").is_err());
    }

    #[test]
    fn test_nothing_leaves_complete() {
        let mut sm = PhaseMachine::new();
        sm.advance(PipelinePhase::GovernanceRunning, None).unwrap();
        sm.advance(PipelinePhase::SchedulingRunning, None).unwrap();
        sm.advance(PipelinePhase::Complete, None).unwrap();
        for to in [
            PipelinePhase::Input,
            PipelinePhase::GovernanceRunning,
            PipelinePhase::AwaitingHuman,
            PipelinePhase::SchedulingRunning,
            PipelinePhase::Failed,
        ] {
            assert!(sm.advance(to, None).is_err(), "left COMPLETE for {to}");
        }
    }

    #[test]
    fn test_machine_serializes_with_log() {
        let mut sm = PhaseMachine::new();
        sm.advance(PipelinePhase::GovernanceRunning, None).unwrap();
        let json = serde_json::to_string(&sm).unwrap();
        assert!(json.contains("\"current\":\"GOVERNANCE_RUNNING\""), "JSON: {json}");
        let back: PhaseMachine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sm);
    }
}
