//! Formation Step — turns citizen issues into costed project proposals
//!
//! Deterministic: risk score, cost, duration and crew come from fixed formulas
//! and a category table. Only issues at or above the risk floor become
//! projects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::model::{Project, MAX_RISK_SCORE};

/// Issues scoring below this are not worth a project
pub const MIN_FORMATION_RISK: f64 = 3.0;

/// Population at which the population score saturates (log scale)
const POPULATION_LOG_SPAN: f64 = 6.0;

/// A reported citizen issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Issue {
    pub issue_id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    /// 1 (minor) to 5 (critical)
    pub severity: u8,
    #[serde(default)]
    pub population_affected: u64,
    #[serde(default)]
    pub legal_mandate: bool,
}

/// Cost and crew parameters of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryParams {
    pub crew_type: &'static str,
    pub base_cost: u64,
    pub base_weeks: u32,
    pub crew_size: u32,
}

impl CategoryParams {
    pub fn for_category(category: &str) -> Self {
        let (crew_type, base_cost, base_weeks, crew_size) = match category {
            "water_infrastructure" => ("water_crew", 8_000_000, 12, 8),
            "healthcare_facility" => ("electrical_crew", 6_000_000, 10, 6),
            "flood_control" => ("general_construction", 10_000_000, 16, 12),
            "transportation" => ("road_crew", 5_000_000, 8, 10),
            "public_buildings" => ("electrical_crew", 4_000_000, 8, 5),
            "road_maintenance" => ("road_crew", 2_000_000, 4, 8),
            "parks_recreation" => ("general_construction", 1_500_000, 6, 4),
            "electrical" => ("electrical_crew", 2_500_000, 6, 5),
            "accessibility" => ("road_crew", 3_000_000, 8, 6),
            _ => ("general_construction", 3_000_000, 8, 6),
        };
        Self {
            crew_type,
            base_cost,
            base_weeks,
            crew_size,
        }
    }
}

/// Cost, duration and crew for one issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEstimate {
    pub estimated_cost: u64,
    pub estimated_weeks: u32,
    pub required_crew_type: String,
    pub crew_size: u32,
}

fn severity(issue: &Issue) -> f64 {
    f64::from(issue.severity.clamp(1, 5))
}

/// Risk on the 0-8 scale, rounded to one decimal.
///
/// Severity weighs 40%, population 30% (log scale) and a legal mandate 30%.
pub fn risk_score(issue: &Issue) -> f64 {
    let pop_score = if issue.population_affected > 0 {
        ((issue.population_affected as f64).log10() / POPULATION_LOG_SPAN * 5.0).min(5.0)
    } else {
        0.0
    };
    let mandate = if issue.legal_mandate { 1.0 } else { 0.0 };

    let risk = severity(issue) * 0.64 + pop_score * 0.48 + mandate * 1.44;
    (risk.clamp(0.0, MAX_RISK_SCORE) * 10.0).round() / 10.0
}

/// Estimate cost and schedule from the category table
pub fn estimate(issue: &Issue) -> ProjectEstimate {
    let params = CategoryParams::for_category(&issue.category);
    let severity_multiplier = 0.6 + severity(issue) * 0.2;
    let population_multiplier = 1.0 + issue.population_affected.min(500_000) as f64 / 1_000_000.0;

    let raw_cost = params.base_cost as f64 * severity_multiplier * population_multiplier;
    let estimated_cost = ((raw_cost / 1_000.0).round() * 1_000.0) as u64;
    let estimated_weeks = ((f64::from(params.base_weeks) * severity_multiplier).round() as u32).max(2);

    ProjectEstimate {
        estimated_cost,
        estimated_weeks,
        required_crew_type: params.crew_type.to_string(),
        crew_size: params.crew_size,
    }
}

/// Forms projects from issues, at most once per issue
#[derive(Debug, Clone, Default)]
pub struct FormationStep {
    formed: HashSet<u32>,
}

impl FormationStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_formed(&self, issue_id: u32) -> bool {
        self.formed.contains(&issue_id)
    }

    /// Form a project from one issue.
    ///
    /// Returns `None` when the issue was already formed or scores below
    /// [`MIN_FORMATION_RISK`].
    pub fn form_one(&mut self, issue: &Issue) -> Option<Project> {
        if self.is_formed(issue.issue_id) {
            debug!(issue_id = issue.issue_id, "Issue already formed, skipping");
            return None;
        }
        let risk = risk_score(issue);
        if risk < MIN_FORMATION_RISK {
            debug!(issue_id = issue.issue_id, risk, "Issue below risk floor");
            return None;
        }

        let estimate = estimate(issue);
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let project = Project {
            id: format!("PRJ-{:03}-{}", issue.issue_id, &suffix[..6]),
            title: issue.title.clone(),
            category: issue.category.clone(),
            estimated_cost: estimate.estimated_cost,
            risk_score: risk,
            population_affected: issue.population_affected,
            legal_mandate: issue.legal_mandate,
            scope: issue.description.clone(),
            estimated_weeks: estimate.estimated_weeks,
            required_crew_type: estimate.required_crew_type,
            crew_size: estimate.crew_size,
        };
        self.formed.insert(issue.issue_id);
        Some(project)
    }

    /// Form projects from every eligible issue, in input order
    pub fn form(&mut self, issues: &[Issue]) -> Vec<Project> {
        let projects: Vec<Project> = issues.iter().filter_map(|i| self.form_one(i)).collect();
        info!(
            issues = issues.len(),
            projects = projects.len(),
            "Formation complete"
        );
        projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: u32, category: &str, severity: u8, population: u64, mandate: bool) -> Issue {
        Issue {
            issue_id: id,
            title: format!("Issue {id}"),
            description: "Reported by residents".to_string(),
            category: category.to_string(),
            severity,
            population_affected: population,
            legal_mandate: mandate,
        }
    }

    #[test]
    fn test_risk_score_formula() {
        // 5*0.64 + min(5, 6/6*5)*0.48 + 1.44 = 3.2 + 2.4 + 1.44 = 7.04
        let risk = risk_score(&issue(1, "water_infrastructure", 5, 1_000_000, true));
        assert_eq!(risk, 7.0);

        // 1*0.64 with no population
        assert_eq!(risk_score(&issue(2, "parks_recreation", 1, 0, false)), 0.6);
    }

    #[test]
    fn test_risk_score_clamped() {
        let risk = risk_score(&issue(1, "flood_control", 5, u64::MAX, true));
        assert!(risk <= MAX_RISK_SCORE);
    }

    #[test]
    fn test_estimate_scales_by_severity_and_population() {
        // 2,000,000 * 1.2 * 1.1 = 2,640,000; weeks round(4 * 1.2) = 5
        let e = estimate(&issue(1, "road_maintenance", 3, 100_000, false));
        assert_eq!(e.estimated_cost, 2_640_000);
        assert_eq!(e.estimated_weeks, 5);
        assert_eq!(e.required_crew_type, "road_crew");
        assert_eq!(e.crew_size, 8);
    }

    #[test]
    fn test_estimate_unknown_category_and_min_weeks() {
        let e = estimate(&issue(1, "graffiti", 1, 0, false));
        assert_eq!(e.required_crew_type, "general_construction");
        assert_eq!(e.estimated_cost, 2_400_000);
        assert!(e.estimated_weeks >= 2);
    }

    #[test]
    fn test_form_skips_low_risk_and_duplicates() {
        let mut step = FormationStep::new();
        let issues = vec![
            issue(7, "water_infrastructure", 4, 50_000, false),
            issue(8, "parks_recreation", 1, 10, false),
            issue(7, "water_infrastructure", 4, 50_000, false),
        ];
        let projects = step.form(&issues);
        assert_eq!(projects.len(), 1);
        assert!(projects[0].id.starts_with("PRJ-007-"), "{}", projects[0].id);
        assert_eq!(projects[0].id.len(), "PRJ-007-".len() + 6);
        assert!(step.is_formed(7));
        assert!(!step.is_formed(8));
        assert!(projects[0].validate().is_ok());
    }
}
