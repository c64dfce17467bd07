//! Audit trail and live event bus
//!
//! Every decision, exclusion, phase change, warning and placement is an
//! [`AuditEvent`]. Events are appended to the run snapshot and broadcast on an
//! [`AuditBus`] for live subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::GatewayWarning;
use crate::escalation::EscalationRule;
use crate::model::{Authorization, Decision};
use crate::pipeline::PipelinePhase;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditKind {
    PhaseTransition {
        from: PipelinePhase,
        to: PipelinePhase,
    },
    PolicyDecision {
        project_id: String,
        recommended: Decision,
        confidence: u8,
        authorization: Authorization,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        triggered_rules: Vec<EscalationRule>,
    },
    ProjectExcluded {
        project_id: String,
        reason: String,
    },
    HumanDecision {
        project_id: String,
        decision: Decision,
        human_override: bool,
    },
    Warning {
        warning: GatewayWarning,
    },
    ProjectScheduled {
        project_id: String,
        crew_type: String,
        start_week: u32,
        end_week: u32,
    },
    ProjectBlocked {
        project_id: String,
        reason: String,
    },
}

impl AuditKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PhaseTransition { .. } => "phase_transition",
            Self::PolicyDecision { .. } => "policy_decision",
            Self::ProjectExcluded { .. } => "project_excluded",
            Self::HumanDecision { .. } => "human_decision",
            Self::Warning { .. } => "warning",
            Self::ProjectScheduled { .. } => "project_scheduled",
            Self::ProjectBlocked { .. } => "project_blocked",
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::PhaseTransition { .. } => None,
            Self::Warning { warning } => Some(warning.project_id()),
            Self::PolicyDecision { project_id, .. }
            | Self::ProjectExcluded { project_id, .. }
            | Self::HumanDecision { project_id, .. }
            | Self::ProjectScheduled { project_id, .. }
            | Self::ProjectBlocked { project_id, .. } => Some(project_id),
        }
    }
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AuditKind,
}

impl AuditEvent {
    pub fn new(run_id: impl Into<String>, kind: AuditKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Shared reference to AuditBus
pub type SharedAuditBus = Arc<AuditBus>;

/// Broadcast bus for audit events
pub struct AuditBus {
    sender: broadcast::Sender<AuditEvent>,
}

impl AuditBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedAuditBus {
        Arc::new(self)
    }

    /// Publish to all subscribers; returns how many received it
    pub fn publish(&self, event: AuditEvent) -> usize {
        let event_type = event.kind.event_type();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "Audit event published");
                count
            }
            // No receivers is OK
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AuditBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = AuditBus::new();
        let mut rx = bus.subscribe();

        let delivered = bus.publish(AuditEvent::new(
            "run-1",
            AuditKind::ProjectExcluded {
                project_id: "PRJ-1".to_string(),
                reason: "timeout".to_string(),
            },
        ));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.run_id, "run-1");
        assert_eq!(event.kind.project_id(), Some("PRJ-1"));
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = AuditBus::new();
        let delivered = bus.publish(AuditEvent::new(
            "run-1",
            AuditKind::PhaseTransition {
                from: PipelinePhase::Input,
                to: PipelinePhase::GovernanceRunning,
            },
        ));
        assert_eq!(delivered, 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serialization_is_flat() {
        let event = AuditEvent::new(
            "run-1",
            AuditKind::HumanDecision {
                project_id: "PRJ-2".to_string(),
                decision: Decision::Reject,
                human_override: true,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"human_decision\""), "JSON: {json}");
        assert!(json.contains("\"human_override\":true"), "JSON: {json}");

        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
