//! Total float, free float, and criticality.
//!
//! Total float is measured between the early and late finish points in the
//! float calendar (the activity's own calendar by default). Free float is
//! the smallest slack any outgoing relationship leaves before the successor's
//! earliest consuming date, floored at zero per relationship; an activity
//! with no successors has no one to delay and reports zero. The critical
//! path is the set of all activities at or under the float tolerance; when
//! several zero-float paths exist, all of them are reported.

use crate::calendar::CalendarError;
use crate::config::{AnalysisConfig, FloatCalendarMode};
use crate::cpm::DateSchedule;
use crate::models::RelationType;
use crate::network::ValidatedNetwork;

/// Per-activity float and criticality, indexed by [`crate::network::ActId`].
/// Entries are `None` for activities excluded from CPM.
pub struct FloatResult {
    pub total_float: Vec<Option<i64>>,
    pub free_float: Vec<Option<i64>>,
    pub is_critical: Vec<bool>,
    pub is_near_critical: Vec<bool>,
}

/// Derives float and criticality from computed dates. Completed activities
/// carry no float and are never part of the forward critical path.
pub fn analyze_float(
    net: &ValidatedNetwork<'_>,
    sched: &DateSchedule,
    config: &AnalysisConfig,
) -> Result<FloatResult, CalendarError> {
    let n = net.len();
    let mut total_float: Vec<Option<i64>> = vec![None; n];
    let mut free_float: Vec<Option<i64>> = vec![None; n];
    let mut is_critical = vec![false; n];
    let mut is_near_critical = vec![false; n];

    for &id in &net.topo {
        let i = id as usize;
        let Some(span) = sched.span(id) else {
            continue;
        };
        if sched.complete[i] {
            total_float[i] = Some(0);
            free_float[i] = Some(0);
            continue;
        }
        let Some(cal) = net.calendar(id) else {
            continue;
        };
        let float_cal = match config.float_calendar {
            FloatCalendarMode::OwnCalendar => cal,
            FloatCalendarMode::ProjectCalendar => net.doc.project_calendar().unwrap_or(cal),
        };

        let tf = float_cal.working_days_between(span.early_finish, span.late_finish);

        let mut ff: Option<i64> = None;
        for edge in &net.succs[i] {
            if sched.started[edge.other as usize] {
                continue;
            }
            let Some(sspan) = sched.span(edge.other) else {
                continue;
            };
            let Some(scal) = net.calendar(edge.other) else {
                continue;
            };
            let slack = match edge.kind {
                RelationType::FinishToStart => scal.working_days_between(
                    scal.add_working_days(span.early_finish, edge.lag)?,
                    sspan.early_start,
                ),
                RelationType::StartToStart => scal.working_days_between(
                    scal.add_working_days(span.early_start, edge.lag)?,
                    sspan.early_start,
                ),
                RelationType::FinishToFinish => scal.working_days_between(
                    scal.add_working_days(span.early_finish, edge.lag)?,
                    sspan.early_finish,
                ),
                RelationType::StartToFinish => scal.working_days_between(
                    scal.add_working_days(span.early_start, edge.lag)?,
                    sspan.early_finish,
                ),
            }
            .max(0);
            ff = Some(ff.map_or(slack, |f| f.min(slack)));
        }

        // An activity with no successors delays nobody: zero free float,
        // capped so the free/total invariant survives negative float.
        let ff = ff.unwrap_or(0).min(tf);

        total_float[i] = Some(tf);
        free_float[i] = Some(ff);
        is_critical[i] = tf <= config.float_tolerance_days;
        is_near_critical[i] = !is_critical[i] && tf <= config.near_critical_threshold_days;
    }

    Ok(FloatResult {
        total_float,
        free_float,
        is_critical,
        is_near_critical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;
    use crate::cpm::{compute_dates, CpmOptions};
    use crate::models::{Activity, Project, Relationship, ScheduleDocument};
    use crate::network::validate;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn make_doc(activities: Vec<Activity>, relationships: Vec<Relationship>) -> ScheduleDocument {
        let mut doc = ScheduleDocument::new(Project::new(
            "P1",
            "Test project",
            d(2025, 1, 6),
            d(2025, 1, 6),
        ))
        .with_calendar(Calendar::seven_day("cal"));
        for a in activities {
            doc.activities.push(a.with_calendar("cal"));
        }
        doc.relationships = relationships;
        doc
    }

    fn run(doc: &ScheduleDocument, config: &AnalysisConfig) -> (Vec<String>, FloatResult) {
        let net = validate(doc, config).unwrap();
        let sched = compute_dates(&net, config, &CpmOptions::default()).unwrap();
        let floats = analyze_float(&net, &sched, config).unwrap();
        let critical = floats
            .is_critical
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(i, _)| doc.activities[i].id.clone())
            .collect();
        (critical, floats)
    }

    fn float_of(doc: &ScheduleDocument, floats: &FloatResult, id: &str) -> i64 {
        let i = doc.activities.iter().position(|a| a.id == id).unwrap();
        floats.total_float[i].unwrap()
    }

    #[test]
    fn test_chain_is_fully_critical() {
        // A(5) -> B(3) -> C(2): zero float everywhere.
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 5),
                Activity::new("B", "B", 3),
                Activity::new("C", "C", 2),
            ],
            vec![Relationship::new("A", "B"), Relationship::new("B", "C")],
        );
        let (critical, floats) = run(&doc, &AnalysisConfig::default());
        assert_eq!(critical, vec!["A", "B", "C"]);
        for id in ["A", "B", "C"] {
            assert_eq!(float_of(&doc, &floats, id), 0);
        }
    }

    #[test]
    fn test_diamond_short_branch_has_float() {
        // A(5) -> B(3) -> D(1), A(5) -> C(1) -> D(1): C floats 2 days.
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 5),
                Activity::new("B", "B", 3),
                Activity::new("C", "C", 1),
                Activity::new("D", "D", 1),
            ],
            vec![
                Relationship::new("A", "B"),
                Relationship::new("A", "C"),
                Relationship::new("B", "D"),
                Relationship::new("C", "D"),
            ],
        );
        let (critical, floats) = run(&doc, &AnalysisConfig::default());
        assert_eq!(critical, vec!["A", "B", "D"]);
        assert_eq!(float_of(&doc, &floats, "C"), 2);

        let ci = doc.activities.iter().position(|a| a.id == "C").unwrap();
        assert_eq!(floats.free_float[ci], Some(2));
    }

    #[test]
    fn test_free_float_never_exceeds_total_float() {
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 5),
                Activity::new("B", "B", 3),
                Activity::new("C", "C", 1),
                Activity::new("X", "X", 2),
                Activity::new("D", "D", 1),
            ],
            vec![
                Relationship::new("A", "B"),
                Relationship::new("A", "C"),
                Relationship::new("C", "X"),
                Relationship::new("B", "D"),
                Relationship::new("X", "D"),
            ],
        );
        let (_, floats) = run(&doc, &AnalysisConfig::default());
        for i in 0..doc.activities.len() {
            let (Some(tf), Some(ff)) = (floats.total_float[i], floats.free_float[i]) else {
                panic!("missing float for activity {i}");
            };
            assert!(ff <= tf, "activity {i}: free {ff} > total {tf}");
        }
    }

    #[test]
    fn test_sink_free_float_is_zero() {
        // B has five days of total float but no successors to delay.
        let doc = make_doc(
            vec![Activity::new("A", "A", 10), Activity::new("B", "B", 5)],
            vec![],
        );
        let (_, floats) = run(&doc, &AnalysisConfig::default());
        let bi = doc.activities.iter().position(|a| a.id == "B").unwrap();
        assert_eq!(floats.total_float[bi], Some(5));
        assert_eq!(floats.free_float[bi], Some(0));
    }

    #[test]
    fn test_near_critical_band() {
        // Parallel branch 5 days shorter than the driving path.
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 10),
                Activity::new("B", "B", 5),
                Activity::new("End", "End", 0),
            ],
            vec![Relationship::new("A", "End"), Relationship::new("B", "End")],
        );
        let (critical, floats) = run(&doc, &AnalysisConfig::default());
        assert_eq!(critical, vec!["A", "End"]);

        let bi = doc.activities.iter().position(|a| a.id == "B").unwrap();
        assert_eq!(floats.total_float[bi], Some(5));
        assert!(floats.is_near_critical[bi]);
        assert!(!floats.is_critical[bi]);
    }

    #[test]
    fn test_wide_float_is_not_near_critical() {
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 20),
                Activity::new("B", "B", 5),
                Activity::new("End", "End", 0),
            ],
            vec![Relationship::new("A", "End"), Relationship::new("B", "End")],
        );
        let (_, floats) = run(&doc, &AnalysisConfig::default());
        let bi = doc.activities.iter().position(|a| a.id == "B").unwrap();
        assert_eq!(floats.total_float[bi], Some(15));
        assert!(!floats.is_near_critical[bi]);
        assert!(!floats.is_critical[bi]);
    }

    #[test]
    fn test_completed_activity_not_critical() {
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 5)
                    .with_actual_start(d(2025, 1, 6))
                    .with_actual_finish(d(2025, 1, 10)),
                Activity::new("B", "B", 3),
            ],
            vec![Relationship::new("A", "B")],
        );
        let (critical, floats) = run(&doc, &AnalysisConfig::default());
        assert_eq!(critical, vec!["B"]);
        assert_eq!(float_of(&doc, &floats, "A"), 0);
    }

    #[test]
    fn test_float_calendar_mode_changes_measurement() {
        // Driving path on a five-day calendar, floating activity on a
        // seven-day calendar spanning a weekend.
        let mut doc = make_doc(
            vec![Activity::new("A", "A", 5), Activity::new("B", "B", 1)],
            vec![],
        );
        doc.calendars = vec![Calendar::five_day("cal"), Calendar::seven_day("cal7")];
        doc.activities[1].calendar_id = "cal7".to_string();

        let own = AnalysisConfig::default();
        let (_, floats) = run(&doc, &own);
        // B finishes Jan 7 (point); project finish point is Mon Jan 13.
        // Its own seven-day calendar counts 6 days of float.
        assert_eq!(float_of(&doc, &floats, "B"), 6);

        let project = AnalysisConfig {
            float_calendar: FloatCalendarMode::ProjectCalendar,
            ..AnalysisConfig::default()
        };
        let (_, floats) = run(&doc, &project);
        // The five-day project calendar sees only 4 working days in the
        // same window.
        assert_eq!(float_of(&doc, &floats, "B"), 4);
    }
}
