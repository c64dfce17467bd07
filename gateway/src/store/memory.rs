//! In-memory store, for tests and single-process runs

use std::collections::HashMap;
use std::sync::RwLock;

use super::{validate_key, DecisionStore, ProjectRecord, StoreError, StoreResult};
use crate::model::{FinalDecision, HumanDecision, PolicyDecision, Project};
use crate::pipeline::PipelineSnapshot;

#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, ProjectRecord>>,
    snapshots: RwLock<HashMap<String, PipelineSnapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, project_id: &str, f: impl FnOnce(&mut ProjectRecord)) -> StoreResult<()> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        f(records.entry(project_id.to_string()).or_default());
        Ok(())
    }
}

impl DecisionStore for InMemoryStore {
    fn put_project(&self, project: &Project) -> StoreResult<()> {
        self.update(&project.id, |r| r.project = Some(project.clone()))
    }

    fn put_policy_decision(&self, decision: &PolicyDecision) -> StoreResult<()> {
        self.update(&decision.project_id, |r| {
            r.policy_decision = Some(decision.clone())
        })
    }

    fn put_human_decision(&self, decision: &HumanDecision) -> StoreResult<()> {
        self.update(&decision.project_id, |r| {
            r.human_decision = Some(decision.clone())
        })
    }

    fn put_final_decision(&self, decision: &FinalDecision) -> StoreResult<()> {
        self.update(&decision.project_id, |r| {
            r.final_decision = Some(decision.clone())
        })
    }

    fn record(&self, project_id: &str) -> StoreResult<Option<ProjectRecord>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(project_id).cloned())
    }

    fn save_snapshot(&self, snapshot: &PipelineSnapshot) -> StoreResult<()> {
        validate_key(&snapshot.run_id)?;
        let mut snapshots = self.snapshots.write().map_err(|_| StoreError::LockPoisoned)?;
        snapshots.insert(snapshot.run_id.clone(), snapshot.clone());
        Ok(())
    }

    fn load_snapshot(&self, run_id: &str) -> StoreResult<Option<PipelineSnapshot>> {
        let snapshots = self.snapshots.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(snapshots.get(run_id).cloned())
    }

    fn list_runs(&self) -> StoreResult<Vec<String>> {
        let snapshots = self.snapshots.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut runs: Vec<String> = snapshots.keys().cloned().collect();
        runs.sort();
        Ok(runs)
    }
}
