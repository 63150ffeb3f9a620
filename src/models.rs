//! Core data types for the schedule analysis engine.
//!
//! A [`ScheduleDocument`] is the normalized form produced by the format
//! parsers (XER, MS-Project XML) upstream of this crate. It is treated as a
//! read-only snapshot for the duration of one analysis run; a re-import or a
//! baseline capture is a new snapshot, never a mutation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;

/// Precedence relationship type between two activities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    /// Successor starts after predecessor finishes.
    #[default]
    FinishToStart,
    /// Successor starts after predecessor starts.
    StartToStart,
    /// Successor finishes after predecessor finishes.
    FinishToFinish,
    /// Successor finishes after predecessor starts.
    StartToFinish,
}

/// Date constraint applied to a single activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    #[default]
    None,
    StartNoEarlierThan,
    StartNoLaterThan,
    FinishNoEarlierThan,
    FinishNoLaterThan,
    MustStartOn,
    MustFinishOn,
}

impl ConstraintType {
    /// Two-way (hard) constraints pin a date rather than bound it.
    pub fn is_hard(self) -> bool {
        matches!(self, ConstraintType::MustStartOn | ConstraintType::MustFinishOn)
    }
}

/// Project header: identity, data date, and planned window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// As-of date for progress. Work before this date is history, work after
    /// it is forecast.
    pub data_date: NaiveDate,
    pub planned_start: NaiveDate,
    pub planned_finish: Option<NaiveDate>,
}

impl Project {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        data_date: NaiveDate,
        planned_start: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_date,
            planned_start,
            planned_finish: None,
        }
    }

    pub fn with_planned_finish(mut self, finish: NaiveDate) -> Self {
        self.planned_finish = Some(finish);
        self
    }
}

/// A single schedulable activity.
///
/// Durations are whole working days in the activity's own calendar;
/// milestones have `duration == 0`. `planned_start`/`planned_finish` carry
/// the scheduled dates captured from the source tool and are only consulted
/// for baseline comparison; CPM output never reads them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub code: String,
    pub name: String,
    /// Remaining-at-plan duration in working days (>= 0).
    pub duration: i64,
    pub calendar_id: String,
    /// 0.0..=100.0.
    pub percent_complete: f64,
    pub actual_start: Option<NaiveDate>,
    pub actual_finish: Option<NaiveDate>,
    pub constraint: ConstraintType,
    pub constraint_date: Option<NaiveDate>,
    pub wbs_path: String,
    pub planned_start: Option<NaiveDate>,
    pub planned_finish: Option<NaiveDate>,
}

impl Activity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration: i64) -> Self {
        let id = id.into();
        Self {
            code: id.clone(),
            id,
            name: name.into(),
            duration,
            calendar_id: String::new(),
            percent_complete: 0.0,
            actual_start: None,
            actual_finish: None,
            constraint: ConstraintType::None,
            constraint_date: None,
            wbs_path: String::new(),
            planned_start: None,
            planned_finish: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_calendar(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_percent_complete(mut self, percent: f64) -> Self {
        self.percent_complete = percent;
        self
    }

    pub fn with_actual_start(mut self, date: NaiveDate) -> Self {
        self.actual_start = Some(date);
        self
    }

    /// Marks the activity finished. Implies 100% complete.
    pub fn with_actual_finish(mut self, date: NaiveDate) -> Self {
        self.actual_finish = Some(date);
        self.percent_complete = 100.0;
        self
    }

    pub fn with_constraint(mut self, constraint: ConstraintType, date: NaiveDate) -> Self {
        self.constraint = constraint;
        self.constraint_date = Some(date);
        self
    }

    pub fn with_wbs(mut self, wbs_path: impl Into<String>) -> Self {
        self.wbs_path = wbs_path.into();
        self
    }

    pub fn with_planned(mut self, start: NaiveDate, finish: NaiveDate) -> Self {
        self.planned_start = Some(start);
        self.planned_finish = Some(finish);
        self
    }

    /// Zero-duration activities are milestones.
    pub fn is_milestone(&self) -> bool {
        self.duration == 0
    }

    pub fn is_complete(&self) -> bool {
        self.actual_finish.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.actual_start.is_some() || self.actual_finish.is_some()
    }
}

/// A precedence link between two activities of the same project.
///
/// Lag is a signed working-day offset in the successor's calendar; negative
/// lag is a lead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Relationship {
    pub predecessor_id: String,
    pub successor_id: String,
    pub kind: RelationType,
    pub lag: i64,
}

impl Relationship {
    /// Finish-to-Start with zero lag.
    pub fn new(predecessor_id: impl Into<String>, successor_id: impl Into<String>) -> Self {
        Self {
            predecessor_id: predecessor_id.into(),
            successor_id: successor_id.into(),
            kind: RelationType::FinishToStart,
            lag: 0,
        }
    }

    pub fn with_kind(mut self, kind: RelationType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_lag(mut self, lag: i64) -> Self {
        self.lag = lag;
        self
    }
}

/// Assignment of a resource to an activity. Consulted only by the DCMA
/// "Resources" metric.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceAssignment {
    pub activity_id: String,
    pub resource_id: String,
    pub units: f64,
}

/// The normalized schedule snapshot handed over by the parser boundary.
///
/// `assignments: None` means no resource data was supplied at all, which is
/// distinct from an empty assignment list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleDocument {
    pub project: Project,
    pub calendars: Vec<Calendar>,
    pub activities: Vec<Activity>,
    pub relationships: Vec<Relationship>,
    pub assignments: Option<Vec<ResourceAssignment>>,
}

impl ScheduleDocument {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            calendars: Vec::new(),
            activities: Vec::new(),
            relationships: Vec::new(),
            assignments: None,
        }
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendars.push(calendar);
        self
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_assignments(mut self, assignments: Vec<ResourceAssignment>) -> Self {
        self.assignments = Some(assignments);
        self
    }

    /// The calendar used for project-level measurements (first in the
    /// document by convention).
    pub fn project_calendar(&self) -> Option<&Calendar> {
        self.calendars.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_activity_builder() {
        let act = Activity::new("A100", "Pour foundation", 5)
            .with_code("FND-01")
            .with_calendar("cal-5d")
            .with_constraint(ConstraintType::StartNoEarlierThan, d(2025, 3, 3))
            .with_wbs("site/foundation");

        assert_eq!(act.id, "A100");
        assert_eq!(act.code, "FND-01");
        assert_eq!(act.duration, 5);
        assert_eq!(act.constraint, ConstraintType::StartNoEarlierThan);
        assert_eq!(act.constraint_date, Some(d(2025, 3, 3)));
        assert!(!act.is_milestone());
        assert!(!act.is_complete());
    }

    #[test]
    fn test_actual_finish_implies_complete() {
        let act = Activity::new("A1", "Done work", 3)
            .with_actual_start(d(2025, 1, 6))
            .with_actual_finish(d(2025, 1, 8));
        assert!(act.is_complete());
        assert!(act.is_started());
        assert_eq!(act.percent_complete, 100.0);
    }

    #[test]
    fn test_milestone() {
        let act = Activity::new("M1", "Contract award", 0);
        assert!(act.is_milestone());
    }

    #[test]
    fn test_hard_constraints() {
        assert!(ConstraintType::MustStartOn.is_hard());
        assert!(ConstraintType::MustFinishOn.is_hard());
        assert!(!ConstraintType::StartNoEarlierThan.is_hard());
        assert!(!ConstraintType::None.is_hard());
    }

    #[test]
    fn test_relationship_defaults() {
        let rel = Relationship::new("A", "B");
        assert_eq!(rel.kind, RelationType::FinishToStart);
        assert_eq!(rel.lag, 0);

        let lead = Relationship::new("A", "B")
            .with_kind(RelationType::StartToStart)
            .with_lag(-2);
        assert_eq!(lead.kind, RelationType::StartToStart);
        assert_eq!(lead.lag, -2);
    }

    #[test]
    fn test_document_roundtrips_through_json() {
        let doc = ScheduleDocument::new(Project::new("P1", "Plant", d(2025, 1, 1), d(2025, 1, 1)))
            .with_calendar(Calendar::five_day("cal"))
            .with_activity(Activity::new("A", "Work", 5).with_calendar("cal"));

        let json = serde_json::to_string(&doc).unwrap();
        let back: ScheduleDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.activities.len(), 1);
        assert_eq!(back.activities[0].id, "A");
        assert_eq!(back.calendars[0].id, "cal");
    }
}
