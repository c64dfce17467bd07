//! Scheduling Step — places approved projects on a fixed calendar
//!
//! Greedy list scheduling: projects are taken highest risk first (ties keep
//! input order) and each goes to the earliest start week whose whole window
//! keeps its crew type within capacity. Projects that cannot fit are reported
//! as `BLOCKED`, never dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::model::Project;

/// Calendar length and crew capacities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Calendar length in weeks; weeks are numbered from 1
    pub weeks: u32,
    /// Capacity for crew types missing from `crew_capacity`
    pub default_crew_capacity: u32,
    pub crew_capacity: BTreeMap<String, u32>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        let crew_capacity = [
            ("water_crew", 15),
            ("electrical_crew", 12),
            ("road_crew", 20),
            ("general_construction", 25),
            ("emergency_response", 10),
        ]
        .into_iter()
        .map(|(crew, capacity)| (crew.to_string(), capacity))
        .collect();

        Self {
            weeks: 13,
            default_crew_capacity: 10,
            crew_capacity,
        }
    }
}

impl CalendarConfig {
    pub fn capacity_for(&self, crew_type: &str) -> u32 {
        self.crew_capacity
            .get(crew_type)
            .copied()
            .unwrap_or(self.default_crew_capacity)
    }
}

/// Where a project landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Placement {
    /// Inclusive week range
    Scheduled { start_week: u32, end_week: u32 },
    Blocked { reason: String },
}

/// One approved project on the calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTask {
    pub project_id: String,
    pub title: String,
    pub crew_type: String,
    pub crew_size: u32,
    pub risk_score: f64,
    #[serde(flatten)]
    pub placement: Placement,
}

impl ScheduleTask {
    pub fn is_blocked(&self) -> bool {
        matches!(self.placement, Placement::Blocked { .. })
    }

    /// Whether the task occupies `week`
    pub fn occupies(&self, week: u32) -> bool {
        match self.placement {
            Placement::Scheduled {
                start_week,
                end_week,
            } => (start_week..=end_week).contains(&week),
            Placement::Blocked { .. } => false,
        }
    }
}

/// Peak use of one crew type across the calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewUtilization {
    pub crew_type: String,
    pub peak: u32,
    pub capacity: u32,
    pub percent: f64,
}

/// Scheduling output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub weeks: u32,
    /// Tasks in scheduling order
    pub tasks: Vec<ScheduleTask>,
    pub utilization: Vec<CrewUtilization>,
}

impl Schedule {
    pub fn scheduled(&self) -> impl Iterator<Item = &ScheduleTask> {
        self.tasks.iter().filter(|t| !t.is_blocked())
    }

    pub fn blocked(&self) -> impl Iterator<Item = &ScheduleTask> {
        self.tasks.iter().filter(|t| t.is_blocked())
    }

    pub fn task(&self, project_id: &str) -> Option<&ScheduleTask> {
        self.tasks.iter().find(|t| t.project_id == project_id)
    }

    /// Text Gantt chart, one row per task
    pub fn render_gantt(&self) -> String {
        let width = self
            .tasks
            .iter()
            .map(|t| t.project_id.len())
            .max()
            .unwrap_or(0)
            .max(7);

        let mut out = String::new();
        let _ = write!(out, "{:<width$} |", "project");
        for week in 1..=self.weeks {
            let _ = write!(out, "{:>3}", week);
        }
        out.push('\n');

        for task in &self.tasks {
            let _ = write!(out, "{:<width$} |", task.project_id);
            match &task.placement {
                Placement::Scheduled { .. } => {
                    for week in 1..=self.weeks {
                        out.push_str(if task.occupies(week) { "  #" } else { "  ." });
                    }
                    let _ = write!(out, "  {} x{}", task.crew_type, task.crew_size);
                }
                Placement::Blocked { reason } => {
                    let _ = write!(out, "  BLOCKED: {reason}");
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Greedy first-fit scheduler
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: CalendarConfig,
}

impl Scheduler {
    pub fn new(config: CalendarConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Schedule `projects` (already filtered to final APPROVE)
    pub fn schedule(&self, projects: &[&Project]) -> Schedule {
        let mut ordered: Vec<&Project> = projects.to_vec();
        // Stable: equal risk keeps input order
        ordered.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));

        let mut tasks: Vec<ScheduleTask> = Vec::with_capacity(ordered.len());
        for project in ordered {
            let placement = self.place(project, &tasks);
            tasks.push(ScheduleTask {
                project_id: project.id.clone(),
                title: project.title.clone(),
                crew_type: project.required_crew_type.clone(),
                crew_size: project.crew_size,
                risk_score: project.risk_score,
                placement,
            });
        }

        let utilization = self.utilization(&tasks);
        Schedule {
            weeks: self.config.weeks,
            tasks,
            utilization,
        }
    }

    fn place(&self, project: &Project, existing: &[ScheduleTask]) -> Placement {
        let weeks = self.config.weeks;
        let capacity = self.config.capacity_for(&project.required_crew_type);
        let duration = project.estimated_weeks.max(1);

        if duration > weeks {
            return Placement::Blocked {
                reason: format!("needs {duration} weeks, calendar has {weeks}"),
            };
        }
        if project.crew_size > capacity {
            return Placement::Blocked {
                reason: format!(
                    "needs {} {}, capacity is {}",
                    project.crew_size, project.required_crew_type, capacity
                ),
            };
        }

        for start_week in 1..=(weeks - duration + 1) {
            let end_week = start_week + duration - 1;
            let fits = (start_week..=end_week).all(|week| {
                crew_in_use(existing, &project.required_crew_type, week) + project.crew_size
                    <= capacity
            });
            if fits {
                return Placement::Scheduled {
                    start_week,
                    end_week,
                };
            }
        }

        Placement::Blocked {
            reason: format!(
                "no {duration}-week window with {} free {} within {weeks} weeks",
                project.crew_size, project.required_crew_type
            ),
        }
    }

    fn utilization(&self, tasks: &[ScheduleTask]) -> Vec<CrewUtilization> {
        let mut crews: BTreeMap<&str, u32> = self
            .config
            .crew_capacity
            .iter()
            .map(|(crew, capacity)| (crew.as_str(), *capacity))
            .collect();
        for task in tasks {
            crews
                .entry(task.crew_type.as_str())
                .or_insert_with(|| self.config.capacity_for(&task.crew_type));
        }

        crews
            .into_iter()
            .map(|(crew_type, capacity)| {
                let peak = (1..=self.config.weeks)
                    .map(|week| crew_in_use(tasks, crew_type, week))
                    .max()
                    .unwrap_or(0);
                let percent = if capacity == 0 {
                    0.0
                } else {
                    f64::from(peak) / f64::from(capacity) * 100.0
                };
                CrewUtilization {
                    crew_type: crew_type.to_string(),
                    peak,
                    capacity,
                    percent,
                }
            })
            .collect()
    }
}

fn crew_in_use(tasks: &[ScheduleTask], crew_type: &str, week: u32) -> u32 {
    tasks
        .iter()
        .filter(|t| t.crew_type == crew_type && t.occupies(week))
        .map(|t| t.crew_size)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, risk: f64, crew: &str, size: u32, weeks: u32) -> Project {
        Project::new(id, id, "test")
            .with_risk(risk)
            .with_crew(crew, size)
            .with_weeks(weeks)
    }

    #[test]
    fn test_highest_risk_scheduled_first() {
        let low = project("LOW", 3.0, "road_crew", 20, 4);
        let high = project("HIGH", 7.0, "road_crew", 20, 4);
        let schedule = Scheduler::default().schedule(&[&low, &high]);

        assert_eq!(schedule.tasks[0].project_id, "HIGH");
        assert_eq!(
            schedule.task("HIGH").unwrap().placement,
            Placement::Scheduled { start_week: 1, end_week: 4 }
        );
        assert_eq!(
            schedule.task("LOW").unwrap().placement,
            Placement::Scheduled { start_week: 5, end_week: 8 }
        );
    }

    #[test]
    fn test_equal_risk_keeps_input_order() {
        let a = project("A", 5.0, "water_crew", 15, 2);
        let b = project("B", 5.0, "water_crew", 15, 2);
        let schedule = Scheduler::default().schedule(&[&a, &b]);
        let ids: Vec<&str> = schedule.tasks.iter().map(|t| t.project_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_parallel_when_capacity_allows() {
        let a = project("A", 5.0, "general_construction", 10, 6);
        let b = project("B", 4.0, "general_construction", 10, 6);
        let schedule = Scheduler::default().schedule(&[&a, &b]);
        assert!(schedule.tasks.iter().all(|t| t.occupies(1)));
        let util = schedule
            .utilization
            .iter()
            .find(|u| u.crew_type == "general_construction")
            .unwrap();
        assert_eq!(util.peak, 20);
        assert_eq!(util.capacity, 25);
    }

    #[test]
    fn test_blocked_projects_are_reported() {
        let too_long = project("LONG", 5.0, "road_crew", 5, 14);
        let too_big = project("BIG", 5.0, "emergency_response", 11, 2);
        let schedule = Scheduler::default().schedule(&[&too_long, &too_big]);
        assert_eq!(schedule.blocked().count(), 2);
        assert_eq!(schedule.scheduled().count(), 0);
    }

    #[test]
    fn test_blocked_when_calendar_full() {
        let first = project("FIRST", 6.0, "electrical_crew", 12, 8);
        let second = project("SECOND", 5.0, "electrical_crew", 12, 8);
        let schedule = Scheduler::default().schedule(&[&first, &second]);
        assert!(!schedule.task("FIRST").unwrap().is_blocked());
        assert!(schedule.task("SECOND").unwrap().is_blocked());
    }

    #[test]
    fn test_unknown_crew_uses_default_capacity() {
        let config = CalendarConfig::default();
        assert_eq!(config.capacity_for("tree_crew"), 10);
        assert_eq!(config.capacity_for("road_crew"), 20);
    }

    #[test]
    fn test_gantt_marks_weeks() {
        let a = project("PRJ-A", 5.0, "road_crew", 4, 2);
        let blocked = project("PRJ-B", 4.0, "road_crew", 4, 20);
        let gantt = Scheduler::default().schedule(&[&a, &blocked]).render_gantt();
        let row = gantt.lines().find(|l| l.starts_with("PRJ-A")).unwrap();
        assert_eq!(row.matches('#').count(), 2);
        assert!(gantt.contains("BLOCKED"), "{gantt}");
    }

    #[test]
    fn test_task_serialization_carries_status() {
        let a = project("PRJ-A", 5.0, "road_crew", 4, 2);
        let schedule = Scheduler::default().schedule(&[&a]);
        let json = serde_json::to_string(&schedule.tasks[0]).unwrap();
        assert!(json.contains("\"status\":\"SCHEDULED\""), "JSON: {json}");
        assert!(json.contains("\"start_week\":1"), "JSON: {json}");
    }
}
