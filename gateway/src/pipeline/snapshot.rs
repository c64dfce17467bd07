//! Durable pipeline state
//!
//! A snapshot holds everything needed to resume a run after an arbitrary
//! delay: phase and transition log, budget, ledger, warnings and audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditEvent;
use crate::error::GatewayWarning;
use crate::ledger::Ledger;
use crate::model::Budget;
use crate::pipeline::state::{PhaseMachine, PipelinePhase};
use crate::scheduling::Schedule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub machine: PhaseMachine,
    pub budget: Budget,
    pub ledger: Ledger,
    #[serde(default)]
    pub warnings: Vec<GatewayWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub audit: Vec<AuditEvent>,
}

impl PipelineSnapshot {
    /// Fresh run in `INPUT` with a new run id
    pub fn new(budget: Budget) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            machine: PhaseMachine::new(),
            budget,
            ledger: Ledger::new(),
            warnings: Vec::new(),
            schedule: None,
            audit: Vec::new(),
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.machine.current()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
