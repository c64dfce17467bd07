//! Transport boundary
//!
//! The four logical operations callers use, plus a reviewer listing:
//! - submit: run governance over a project list with a budget
//! - apply_human_decisions: record reviewer decisions for escalated projects
//! - finalize_and_schedule: merge decisions and schedule approvals
//! - get_results: schedule, decisions and summary of a completed run
//! - pending_reviews: escalated projects awaiting (or holding) a decision
//!
//! Failures are returned as [`StructuredError`] so callers know what to do next.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{GatewayError, StructuredError};
use crate::model::{HumanDecision, Project};
use crate::pipeline::{
    DecisionAck, HitlPipeline, PendingReview, PipelinePhase, PipelineResults, ScheduleOutcome,
    SubmitOutcome,
};

/// Thread-safe pipeline wrapper
pub type SharedPipeline = Arc<Mutex<HitlPipeline>>;

/// Wrap a pipeline for shared use
pub fn create_shared_pipeline(pipeline: HitlPipeline) -> SharedPipeline {
    Arc::new(Mutex::new(pipeline))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request for submit
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SubmitRequest {
    #[schemars(description = "Proposed projects, evaluated and charged in this order")]
    pub projects: Vec<Project>,

    #[schemars(description = "Total budget for the run in whole dollars")]
    pub budget: u64,
}

/// Request for apply_human_decisions
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ApplyHumanDecisionsRequest {
    #[schemars(description = "One decision per escalated project; each project takes exactly one")]
    pub decisions: Vec<HumanDecision>,
}

/// Request for finalize_and_schedule
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FinalizeRequest {
    #[schemars(description = "Print a text Gantt chart alongside the schedule")]
    #[serde(default)]
    pub include_gantt: bool,
}

/// Response for pending_reviews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReviewsResponse {
    pub run_id: String,
    pub phase: PipelinePhase,
    pub pending: Vec<PendingReview>,
}

/// Response for finalize_and_schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResponse {
    #[serde(flatten)]
    pub outcome: ScheduleOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gantt: Option<String>,
}

fn structured(err: GatewayError, pipeline: &HitlPipeline) -> StructuredError {
    err.to_structured()
        .with_run(pipeline.run_id(), pipeline.phase())
}

// ============================================================================
// Operations
// ============================================================================

pub async fn submit(
    state: &SharedPipeline,
    req: SubmitRequest,
) -> Result<SubmitOutcome, StructuredError> {
    let mut pipeline = state.lock().await;
    match pipeline.submit(req.projects, req.budget).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => Err(structured(e, &pipeline)),
    }
}

pub async fn apply_human_decisions(
    state: &SharedPipeline,
    req: ApplyHumanDecisionsRequest,
) -> Result<DecisionAck, StructuredError> {
    let mut pipeline = state.lock().await;
    pipeline
        .apply_human_decisions(req.decisions)
        .map_err(|e| structured(e, &pipeline))
}

pub async fn finalize_and_schedule(
    state: &SharedPipeline,
    req: FinalizeRequest,
) -> Result<FinalizeResponse, StructuredError> {
    let mut pipeline = state.lock().await;
    match pipeline.finalize_and_schedule() {
        Ok(outcome) => {
            let gantt = req.include_gantt.then(|| outcome.schedule.render_gantt());
            Ok(FinalizeResponse { outcome, gantt })
        }
        Err(e) => Err(structured(e, &pipeline)),
    }
}

pub async fn get_results(state: &SharedPipeline) -> Result<PipelineResults, StructuredError> {
    let pipeline = state.lock().await;
    pipeline.results().map_err(|e| structured(e, &pipeline))
}

pub async fn pending_reviews(state: &SharedPipeline) -> PendingReviewsResponse {
    let pipeline = state.lock().await;
    PendingReviewsResponse {
        run_id: pipeline.run_id().to_string(),
        phase: pipeline.phase(),
        pending: pipeline.pending_reviews(),
    }
}

/// JSON schemas of every request type, keyed by operation
pub fn request_schemas() -> BTreeMap<&'static str, serde_json::Value> {
    let mut schemas = BTreeMap::new();
    let entries = [
        ("submit", schemars::schema_for!(SubmitRequest)),
        (
            "apply_human_decisions",
            schemars::schema_for!(ApplyHumanDecisionsRequest),
        ),
        ("finalize_and_schedule", schemars::schema_for!(FinalizeRequest)),
    ];
    for (name, schema) in entries {
        schemas.insert(name, serde_json::to_value(schema).unwrap_or_default());
    }
    schemas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::governance::HeuristicReasoner;
    use crate::store::InMemoryStore;

    fn shared() -> SharedPipeline {
        create_shared_pipeline(HitlPipeline::new(
            &GatewayConfig::default(),
            Arc::new(HeuristicReasoner::new()),
            Arc::new(InMemoryStore::new()),
        ))
    }

    #[tokio::test]
    async fn test_out_of_order_call_is_structured() {
        let state = shared();
        let err = finalize_and_schedule(&state, FinalizeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, "INVALID_TRANSITION");
        assert_eq!(err.context.get("phase"), Some(&serde_json::json!("INPUT")));
        assert!(err.context.contains_key("run_id"));
    }

    #[tokio::test]
    async fn test_results_before_complete() {
        let state = shared();
        let err = get_results(&state).await.unwrap_err();
        assert_eq!(err.code, "RESULTS_NOT_READY");
    }

    #[test]
    fn test_request_schemas_cover_operations() {
        let schemas = request_schemas();
        assert_eq!(schemas.len(), 3);
        let submit = serde_json::to_string(&schemas["submit"]).unwrap();
        assert!(submit.contains("budget"), "{submit}");
        assert!(submit.contains("legal_mandate"), "{submit}");
    }

    #[test]
    fn test_submit_request_parses() {
        let json = r#"{
            "budget": 5000000,
            "projects": [{
                "id": "PRJ-1", "title": "Main", "category": "water_infrastructure",
                "estimated_cost": 100, "risk_score": 2.0, "population_affected": 10
            }]
        }"#;
        let req: SubmitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.projects.len(), 1);
        assert_eq!(req.budget, 5_000_000);
    }
}
