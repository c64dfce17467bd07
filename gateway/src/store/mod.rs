//! Persistence collaborator
//!
//! A consistent key-value store for per-project records plus whole-run
//! snapshots. No transactional coupling across projects.

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{FinalDecision, HumanDecision, PolicyDecision, Project};
use crate::pipeline::PipelineSnapshot;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a DecisionStore
pub type SharedDecisionStore = Arc<dyn DecisionStore>;

/// Everything stored for one project id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_decision: Option<PolicyDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_decision: Option<HumanDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<FinalDecision>,
}

/// Storage for projects, decisions and run snapshots
pub trait DecisionStore: Send + Sync {
    fn put_project(&self, project: &Project) -> StoreResult<()>;

    fn put_policy_decision(&self, decision: &PolicyDecision) -> StoreResult<()>;

    fn put_human_decision(&self, decision: &HumanDecision) -> StoreResult<()>;

    fn put_final_decision(&self, decision: &FinalDecision) -> StoreResult<()>;

    /// Everything stored under `project_id`
    fn record(&self, project_id: &str) -> StoreResult<Option<ProjectRecord>>;

    /// Persist a run snapshot, replacing any earlier one for the same run
    fn save_snapshot(&self, snapshot: &PipelineSnapshot) -> StoreResult<()>;

    fn load_snapshot(&self, run_id: &str) -> StoreResult<Option<PipelineSnapshot>>;

    /// Ids of every stored run, sorted
    fn list_runs(&self) -> StoreResult<Vec<String>>;
}

/// Run ids end up in file names; keep them to a safe alphabet
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("5f1c2a9e-0b7d-4c1e-9f4a-2d6b8e0c1a3f").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("run 1").is_err());
    }
}
