//! Baseline comparison for schedule-slip reporting.
//!
//! Consumes two document snapshots and produces a [`VarianceReport`];
//! neither snapshot is touched. Variances compare the best known date on
//! each side (actual when recorded, otherwise the captured planned date)
//! and are expressed in calendar days, positive meaning later than
//! baseline.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::models::{Activity, ScheduleDocument};

/// Start/finish drift of one activity against the baseline. A variance is
/// `None` when either side lacks the date.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityVariance {
    pub activity_id: String,
    pub start_variance_days: Option<i64>,
    pub finish_variance_days: Option<i64>,
}

/// Drift of a whole schedule against a baseline snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VarianceReport {
    /// One entry per activity present in both snapshots.
    pub activities: Vec<ActivityVariance>,
    /// In the current schedule but not the baseline.
    pub added_ids: Vec<String>,
    /// In the baseline but dropped from the current schedule.
    pub removed_ids: Vec<String>,
    /// Activities whose finish slipped past the baseline.
    pub slipped_ids: Vec<String>,
}

fn best_start(act: &Activity) -> Option<NaiveDate> {
    act.actual_start.or(act.planned_start)
}

fn best_finish(act: &Activity) -> Option<NaiveDate> {
    act.actual_finish.or(act.planned_finish)
}

fn days_between(baseline: Option<NaiveDate>, current: Option<NaiveDate>) -> Option<i64> {
    match (baseline, current) {
        (Some(b), Some(c)) => Some((c - b).num_days()),
        _ => None,
    }
}

/// Compares a schedule to a baseline snapshot.
pub fn compare_to_baseline(
    current: &ScheduleDocument,
    baseline: &ScheduleDocument,
) -> VarianceReport {
    let baseline_by_id: FxHashMap<&str, &Activity> = baseline
        .activities
        .iter()
        .map(|a| (a.id.as_str(), a))
        .collect();

    let mut activities = Vec::new();
    let mut added_ids = Vec::new();
    let mut slipped_ids = Vec::new();

    for act in &current.activities {
        let Some(base) = baseline_by_id.get(act.id.as_str()) else {
            added_ids.push(act.id.clone());
            continue;
        };
        let start_variance_days = days_between(best_start(base), best_start(act));
        let finish_variance_days = days_between(best_finish(base), best_finish(act));
        if matches!(finish_variance_days, Some(v) if v > 0) {
            slipped_ids.push(act.id.clone());
        }
        activities.push(ActivityVariance {
            activity_id: act.id.clone(),
            start_variance_days,
            finish_variance_days,
        });
    }

    let current_ids: FxHashSet<&str> = current
        .activities
        .iter()
        .map(|a| a.id.as_str())
        .collect();
    let removed_ids = baseline
        .activities
        .iter()
        .filter(|a| !current_ids.contains(a.id.as_str()))
        .map(|a| a.id.clone())
        .collect();

    VarianceReport {
        activities,
        added_ids,
        removed_ids,
        slipped_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Project;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn doc_with(activities: Vec<Activity>) -> ScheduleDocument {
        let mut doc = ScheduleDocument::new(Project::new(
            "P1",
            "Test project",
            d(2025, 1, 6),
            d(2025, 1, 6),
        ));
        doc.activities = activities;
        doc
    }

    #[test]
    fn test_slip_against_baseline_plan() {
        let baseline = doc_with(vec![
            Activity::new("A", "A", 5).with_planned(d(2025, 1, 6), d(2025, 1, 10)),
            Activity::new("B", "B", 3).with_planned(d(2025, 1, 13), d(2025, 1, 15)),
        ]);
        let current = doc_with(vec![
            Activity::new("A", "A", 5)
                .with_actual_start(d(2025, 1, 6))
                .with_actual_finish(d(2025, 1, 14)),
            Activity::new("B", "B", 3).with_planned(d(2025, 1, 13), d(2025, 1, 15)),
        ]);

        let report = compare_to_baseline(&current, &baseline);
        assert_eq!(report.activities.len(), 2);

        let a = &report.activities[0];
        assert_eq!(a.start_variance_days, Some(0));
        assert_eq!(a.finish_variance_days, Some(4));
        assert_eq!(report.slipped_ids, vec!["A".to_string()]);

        let b = &report.activities[1];
        assert_eq!(b.finish_variance_days, Some(0));
    }

    #[test]
    fn test_added_and_removed() {
        let baseline = doc_with(vec![Activity::new("OLD", "Old", 2)]);
        let current = doc_with(vec![Activity::new("NEW", "New", 2)]);

        let report = compare_to_baseline(&current, &baseline);
        assert_eq!(report.added_ids, vec!["NEW".to_string()]);
        assert_eq!(report.removed_ids, vec!["OLD".to_string()]);
        assert!(report.activities.is_empty());
    }

    #[test]
    fn test_missing_dates_yield_no_variance() {
        let baseline = doc_with(vec![Activity::new("A", "A", 5)]);
        let current = doc_with(vec![Activity::new("A", "A", 5)]);

        let report = compare_to_baseline(&current, &baseline);
        assert_eq!(report.activities[0].start_variance_days, None);
        assert_eq!(report.activities[0].finish_variance_days, None);
        assert!(report.slipped_ids.is_empty());
    }
}
