//! JSON-file store
//!
//! Layout under the root directory:
//!
//! ```text
//! records.json          project id → ProjectRecord
//! runs/<run_id>.json    one PipelineSnapshot per run
//! ```
//!
//! Files are written to a temporary sibling and renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use tracing::debug;

use super::{validate_key, DecisionStore, ProjectRecord, StoreError, StoreResult};
use crate::model::{FinalDecision, HumanDecision, PolicyDecision, Project};
use crate::pipeline::PipelineSnapshot;

const RECORDS_FILE: &str = "records.json";
const RUNS_DIR: &str = "runs";

pub struct JsonFileStore {
    root: PathBuf,
    records: RwLock<BTreeMap<String, ProjectRecord>>,
}

impl JsonFileStore {
    /// Open or create a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(RUNS_DIR))?;

        let records_path = root.join(RECORDS_FILE);
        let records = if records_path.exists() {
            let text = fs::read_to_string(&records_path)?;
            serde_json::from_str(&text).map_err(|e| StoreError::Deserialization(e.to_string()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            root,
            records: RwLock::new(records),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, run_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(format!("{run_id}.json"))
    }

    fn update(&self, project_id: &str, f: impl FnOnce(&mut ProjectRecord)) -> StoreResult<()> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        f(records.entry(project_id.to_string()).or_default());
        write_json(&self.root.join(RECORDS_FILE), &*records)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "Wrote store file");
    Ok(())
}

impl DecisionStore for JsonFileStore {
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
        write_json(&self.snapshot_path(&snapshot.run_id), snapshot)
    }

    fn load_snapshot(&self, run_id: &str) -> StoreResult<Option<PipelineSnapshot>> {
        validate_key(run_id)?;
        let path = self.snapshot_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let snapshot =
            serde_json::from_str(&text).map_err(|e| StoreError::Deserialization(e.to_string()))?;
        Ok(Some(snapshot))
    }

    fn list_runs(&self) -> StoreResult<Vec<String>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(self.root.join(RUNS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    runs.push(stem.to_string());
                }
            }
        }
        runs.sort();
        Ok(runs)
    }
}
