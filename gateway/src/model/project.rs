//! Capital project candidates

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{GatewayError, GatewayResult};

/// Upper bound of the ordinal risk scale
pub const MAX_RISK_SCORE: f64 = 8.0;

fn default_estimated_weeks() -> u32 {
    8
}

fn default_crew_type() -> String {
    "general_construction".to_string()
}

fn default_crew_size() -> u32 {
    6
}

/// A costed proposal created by formation.
///
/// Governance attaches decisions to a project by id; it never edits the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    /// Unique project identifier
    pub id: String,
    pub title: String,
    pub category: String,
    /// Estimated cost in whole dollars
    pub estimated_cost: u64,
    /// Risk on a 0-8 scale
    pub risk_score: f64,
    pub population_affected: u64,
    /// A binding obligation requires action regardless of cost
    #[serde(default)]
    pub legal_mandate: bool,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_estimated_weeks")]
    pub estimated_weeks: u32,
    #[serde(default = "default_crew_type")]
    pub required_crew_type: String,
    #[serde(default = "default_crew_size")]
    pub crew_size: u32,
}

impl Project {
    /// Create a project with zero cost and risk and default crew parameters
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: category.into(),
            estimated_cost: 0,
            risk_score: 0.0,
            population_affected: 0,
            legal_mandate: false,
            scope: String::new(),
            estimated_weeks: default_estimated_weeks(),
            required_crew_type: default_crew_type(),
            crew_size: default_crew_size(),
        }
    }

    pub fn with_cost(mut self, estimated_cost: u64) -> Self {
        self.estimated_cost = estimated_cost;
        self
    }

    pub fn with_risk(mut self, risk_score: f64) -> Self {
        self.risk_score = risk_score;
        self
    }

    pub fn with_population(mut self, population_affected: u64) -> Self {
        self.population_affected = population_affected;
        self
    }

    pub fn with_legal_mandate(mut self, legal_mandate: bool) -> Self {
        self.legal_mandate = legal_mandate;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_crew(mut self, crew_type: impl Into<String>, crew_size: u32) -> Self {
        self.required_crew_type = crew_type.into();
        self.crew_size = crew_size;
        self
    }

    pub fn with_weeks(mut self, estimated_weeks: u32) -> Self {
        self.estimated_weeks = estimated_weeks;
        self
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.id.trim().is_empty() {
            return Err(GatewayError::invalid_project("<empty>", "project id is empty"));
        }
        if !self.risk_score.is_finite() || !(0.0..=MAX_RISK_SCORE).contains(&self.risk_score) {
            return Err(GatewayError::invalid_project(
                &self.id,
                format!("risk score {} is outside 0-{}", self.risk_score, MAX_RISK_SCORE),
            ));
        }
        if self.estimated_weeks == 0 {
            return Err(GatewayError::invalid_project(&self.id, "estimated_weeks must be at least 1"));
        }
        if self.crew_size == 0 {
            return Err(GatewayError::invalid_project(&self.id, "crew_size must be at least 1"));
        }
        Ok(())
    }
}

/// Validate every project and reject duplicate ids
pub fn validate_projects(projects: &[Project]) -> GatewayResult<()> {
    let mut seen = HashSet::with_capacity(projects.len());
    for project in projects {
        project.validate()?;
        if !seen.insert(project.id.as_str()) {
            return Err(GatewayError::DuplicateProject {
                project_id: project.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fills_scheduling_defaults() {
        let json = r#"{
            "id": "PRJ-001",
            "title": "Culvert repair",
            "category": "flood_control",
            "estimated_cost": 750000,
            "risk_score": 4.2,
            "population_affected": 12000
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert!(!project.legal_mandate);
        assert_eq!(project.estimated_weeks, 8);
        assert_eq!(project.required_crew_type, "general_construction");
        assert_eq!(project.crew_size, 6);
    }

    #[test]
    fn test_validate_risk_bounds() {
        let project = Project::new("PRJ-1", "t", "c").with_risk(8.0);
        assert!(project.validate().is_ok());

        let project = Project::new("PRJ-1", "t", "c").with_risk(8.5);
        assert!(project.validate().is_err());

        let project = Project::new("PRJ-1", "t", "c").with_risk(f64::NAN);
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_id_and_zero_crew() {
        assert!(Project::new("  ", "t", "c").validate().is_err());
        let project = Project::new("PRJ-1", "t", "c").with_crew("road_crew", 0);
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_validate_projects_detects_duplicates() {
        let projects = vec![
            Project::new("PRJ-1", "a", "c"),
            Project::new("PRJ-2", "b", "c"),
            Project::new("PRJ-1", "c", "c"),
        ];
        let err = validate_projects(&projects).unwrap_err();
        assert!(
            matches!(err, GatewayError::DuplicateProject { ref project_id } if project_id == "PRJ-1")
        );
    }
}
