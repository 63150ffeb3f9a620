//! Critical path method: calendar-aware forward and backward passes.
//!
//! Dates are day-start points and spans are half-open (see [`crate::calendar`]).
//! The forward pass walks the validated topological order computing earliest
//! dates; the backward pass walks it in reverse computing latest dates,
//! seeded from the latest early finish across sinks or an external project
//! finish constraint, whichever is later. Lag is converted to dates through
//! the successor activity's calendar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::calendar::{Calendar, CalendarError};
use crate::config::AnalysisConfig;
use crate::float::FloatResult;
use crate::log_summary;
use crate::models::{ConstraintType, RelationType};
use crate::network::{ActId, ValidatedNetwork};

/// How many activities are processed between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 64;

/// Errors raised by date computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CpmError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    /// The caller-supplied deadline elapsed. Partial state is discarded; an
    /// incomplete schedule is never returned as if complete.
    #[error("computation deadline elapsed after {processed} of {total} activities")]
    Timeout { processed: usize, total: usize },
}

/// Caller-supplied deadline and/or abort flag, checked between topological
/// layers of both passes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    deadline: Option<Instant>,
    flag: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deadline(budget: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + budget),
            flag: None,
        }
    }

    pub fn with_flag(flag: Arc<AtomicBool>) -> Self {
        Self {
            deadline: None,
            flag: Some(flag),
        }
    }

    pub fn expired(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        if let Some(flag) = &self.flag {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        false
    }
}

/// Options for one computation run.
#[derive(Clone, Debug, Default)]
pub struct CpmOptions {
    /// External project finish constraint (inclusive date). The backward
    /// pass seeds from this or the computed finish, whichever is later.
    pub project_finish: Option<NaiveDate>,
    pub cancel: CancelToken,
}

/// A constraint the computed dates could not honor. Warnings, not errors:
/// the run completes and the conflict is surfaced for reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintWarning {
    pub activity_id: String,
    pub constraint: ConstraintType,
    pub constraint_date: NaiveDate,
    /// The logic-driven date that conflicts with the constraint.
    pub computed: NaiveDate,
}

/// Early/late day-start points for one activity. Finish points are
/// exclusive (morning after the last worked day).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateSpan {
    pub early_start: NaiveDate,
    pub early_finish: NaiveDate,
    pub late_start: NaiveDate,
    pub late_finish: NaiveDate,
}

/// Full output of the two passes, indexed by [`ActId`]. `spans[i]` is `None`
/// only for activities excluded by lenient calendar resolution.
#[derive(Debug)]
pub struct DateSchedule {
    pub spans: Vec<Option<DateSpan>>,
    pub complete: Vec<bool>,
    pub started: Vec<bool>,
    /// Project planned start point.
    pub start_point: NaiveDate,
    /// Latest early finish across included activities.
    pub finish_point: NaiveDate,
    /// Backward-pass seed (>= `finish_point`).
    pub seed_point: NaiveDate,
    pub warnings: Vec<ConstraintWarning>,
}

impl DateSchedule {
    #[inline]
    pub fn span(&self, id: ActId) -> Option<&DateSpan> {
        self.spans[id as usize].as_ref()
    }
}

/// Computes early and late dates for every included activity.
pub fn compute_dates(
    net: &ValidatedNetwork<'_>,
    config: &AnalysisConfig,
    options: &CpmOptions,
) -> Result<DateSchedule, CpmError> {
    compute_dates_inflated(net, config, options, &[])
}

/// Same as [`compute_dates`] with per-activity duration inflation, used by
/// the DCMA critical-path integrity test to re-run the passes without
/// touching the document.
pub(crate) fn compute_dates_inflated(
    net: &ValidatedNetwork<'_>,
    config: &AnalysisConfig,
    options: &CpmOptions,
    inflations: &[(ActId, i64)],
) -> Result<DateSchedule, CpmError> {
    let n = net.len();
    let data_date = net.doc.project.data_date;
    let planned_start = net.doc.project.planned_start;
    let total = net.topo.len();

    let mut spans: Vec<Option<DateSpan>> = vec![None; n];
    let mut complete = vec![false; n];
    let mut started = vec![false; n];
    let mut warnings: Vec<ConstraintWarning> = Vec::new();

    // Forward pass.
    for (processed, &id) in net.topo.iter().enumerate() {
        if processed % CANCEL_CHECK_INTERVAL == 0 && options.cancel.expired() {
            return Err(CpmError::Timeout { processed, total });
        }
        let act = net.activity(id);
        let Some(cal) = net.calendar(id) else {
            continue;
        };
        let duration = effective_duration(net, inflations, id);

        if let Some(finish) = act.actual_finish {
            let start = act.actual_start.unwrap_or(finish);
            let ef = next_day(finish);
            complete[id as usize] = true;
            started[id as usize] = true;
            spans[id as usize] = Some(DateSpan {
                early_start: start,
                early_finish: ef,
                late_start: start,
                late_finish: ef,
            });
            continue;
        }

        let (es, ef) = if let Some(actual_start) = act.actual_start {
            // Progress override: the actual start pins the early start and
            // incoming logic no longer drives this activity; only the
            // remaining portion is scheduled, from the data date.
            started[id as usize] = true;
            let remaining = remaining_duration(duration, act.percent_complete);
            let resume = actual_start.max(data_date);
            let ef = cal.add_working_days(resume, remaining)?;
            (actual_start, ef)
        } else {
            forward_dates(net, &spans, &mut warnings, id, act, cal, duration, planned_start)?
        };

        spans[id as usize] = Some(DateSpan {
            early_start: es,
            early_finish: ef,
            late_start: es,
            late_finish: ef,
        });
    }

    // Seed: latest early finish, or the external finish constraint if later.
    let mut finish_point = planned_start;
    let mut any = false;
    for span in spans.iter().flatten() {
        if !any || span.early_finish > finish_point {
            finish_point = span.early_finish;
            any = true;
        }
    }
    let mut seed_point = finish_point;
    if let Some(pf) = options.project_finish {
        seed_point = seed_point.max(next_day(pf));
    }

    // Backward pass.
    for (processed, &id) in net.topo.iter().rev().enumerate() {
        if processed % CANCEL_CHECK_INTERVAL == 0 && options.cancel.expired() {
            return Err(CpmError::Timeout {
                processed: total + processed,
                total: total * 2,
            });
        }
        if complete[id as usize] {
            continue;
        }
        let act = net.activity(id);
        let Some(cal) = net.calendar(id) else {
            continue;
        };
        let duration = if started[id as usize] {
            remaining_duration(effective_duration(net, inflations, id), act.percent_complete)
        } else {
            effective_duration(net, inflations, id)
        };

        let mut lf = seed_point;
        let mut ls_ceil: Option<NaiveDate> = None;
        for edge in &net.succs[id as usize] {
            // A started successor no longer takes dates from its logic; the
            // link constrains nothing (mirror of the forward-pass override).
            if started[edge.other as usize] {
                continue;
            }
            let Some(sspan) = spans[edge.other as usize] else {
                continue;
            };
            let Some(scal) = net.calendar(edge.other) else {
                continue;
            };
            match edge.kind {
                RelationType::FinishToStart => {
                    lf = lf.min(scal.add_working_days(sspan.late_start, -edge.lag)?);
                }
                RelationType::StartToStart => {
                    let cand = scal.add_working_days(sspan.late_start, -edge.lag)?;
                    ls_ceil = Some(ls_ceil.map_or(cand, |c| c.min(cand)));
                }
                RelationType::FinishToFinish => {
                    lf = lf.min(scal.add_working_days(sspan.late_finish, -edge.lag)?);
                }
                RelationType::StartToFinish => {
                    let cand = scal.add_working_days(sspan.late_finish, -edge.lag)?;
                    ls_ceil = Some(ls_ceil.map_or(cand, |c| c.min(cand)));
                }
            }
        }

        if let Some(date) = act.constraint_date {
            match act.constraint {
                ConstraintType::FinishNoLaterThan | ConstraintType::MustFinishOn => {
                    lf = lf.min(next_day(date));
                }
                ConstraintType::StartNoLaterThan | ConstraintType::MustStartOn => {
                    ls_ceil = Some(ls_ceil.map_or(date, |c| c.min(date)));
                }
                _ => {}
            }
        }

        if let Some(ceil) = ls_ceil {
            lf = lf.min(cal.add_working_days(ceil, duration)?);
        }
        let ls = cal.add_working_days(lf, -duration)?;

        if let Some(span) = spans[id as usize].as_mut() {
            span.late_start = ls;
            span.late_finish = lf;
        }
    }

    log_summary!(
        config.verbosity,
        "cpm: {} activities dated, finish point {}, seed {}",
        total,
        finish_point,
        seed_point
    );

    Ok(DateSchedule {
        spans,
        complete,
        started,
        start_point: planned_start,
        finish_point,
        seed_point,
        warnings,
    })
}

/// Early dates for an unstarted activity: predecessor-driven floors, then
/// constraint clamping.
#[allow(clippy::too_many_arguments)]
fn forward_dates(
    net: &ValidatedNetwork<'_>,
    spans: &[Option<DateSpan>],
    warnings: &mut Vec<ConstraintWarning>,
    id: ActId,
    act: &crate::models::Activity,
    cal: &Calendar,
    duration: i64,
    planned_start: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), CpmError> {
    let mut es = planned_start;
    let mut ef_floor: Option<NaiveDate> = None;

    for edge in &net.preds[id as usize] {
        let Some(pspan) = spans[edge.other as usize] else {
            continue;
        };
        match edge.kind {
            RelationType::FinishToStart => {
                es = es.max(cal.add_working_days(pspan.early_finish, edge.lag)?);
            }
            RelationType::StartToStart => {
                es = es.max(cal.add_working_days(pspan.early_start, edge.lag)?);
            }
            RelationType::FinishToFinish => {
                let cand = cal.add_working_days(pspan.early_finish, edge.lag)?;
                ef_floor = Some(ef_floor.map_or(cand, |f| f.max(cand)));
            }
            RelationType::StartToFinish => {
                let cand = cal.add_working_days(pspan.early_start, edge.lag)?;
                ef_floor = Some(ef_floor.map_or(cand, |f| f.max(cand)));
            }
        }
    }

    if let Some(date) = act.constraint_date {
        match act.constraint {
            ConstraintType::StartNoEarlierThan => es = es.max(date),
            ConstraintType::FinishNoEarlierThan => {
                let point = next_day(date);
                ef_floor = Some(ef_floor.map_or(point, |f| f.max(point)));
            }
            ConstraintType::MustStartOn => {
                if es > date {
                    warnings.push(ConstraintWarning {
                        activity_id: act.id.clone(),
                        constraint: act.constraint,
                        constraint_date: date,
                        computed: es,
                    });
                }
                es = es.max(date);
            }
            ConstraintType::MustFinishOn => {
                let point = next_day(date);
                ef_floor = Some(ef_floor.map_or(point, |f| f.max(point)));
            }
            _ => {}
        }
    }

    let mut es = cal.roll_forward(es)?;
    let mut ef = cal.add_working_days(es, duration)?;
    if let Some(floor) = ef_floor {
        let floor = cal.roll_forward(floor)?;
        // Spans are rigid (finish = start + duration): a finish-driven
        // activity starts later instead of stretching.
        if floor > ef {
            ef = floor;
            es = cal.add_working_days(ef, -duration)?;
        }
    }

    // No-later-than violations (and an overshot MustFinishOn) surface as
    // warnings here and as late-date ceilings in the backward pass.
    if let Some(date) = act.constraint_date {
        let violated = match act.constraint {
            ConstraintType::StartNoLaterThan => es > date,
            // Compare last worked days: the exclusive finish point may sit
            // past a weekend without the work itself running late.
            ConstraintType::FinishNoLaterThan | ConstraintType::MustFinishOn => {
                inclusive_finish(cal, es, ef)? > date
            }
            _ => false,
        };
        if violated {
            warnings.push(ConstraintWarning {
                activity_id: act.id.clone(),
                constraint: act.constraint,
                constraint_date: date,
                computed: inclusive_finish(cal, es, ef)?,
            });
        }
    }

    Ok((es, ef))
}

fn effective_duration(net: &ValidatedNetwork<'_>, inflations: &[(ActId, i64)], id: ActId) -> i64 {
    let extra: i64 = inflations
        .iter()
        .filter(|(i, _)| *i == id)
        .map(|(_, x)| x)
        .sum();
    net.activity(id).duration + extra
}

fn remaining_duration(duration: i64, percent_complete: f64) -> i64 {
    let frac = (100.0 - percent_complete.clamp(0.0, 100.0)) / 100.0;
    (duration as f64 * frac).ceil() as i64
}

fn next_day(d: NaiveDate) -> NaiveDate {
    d.succ_opt().unwrap_or(d)
}

/// Last worked day before an exclusive finish point. Milestones report their
/// start date.
pub(crate) fn inclusive_finish(
    cal: &Calendar,
    start: NaiveDate,
    finish_point: NaiveDate,
) -> Result<NaiveDate, CalendarError> {
    if finish_point <= start {
        Ok(start)
    } else {
        cal.add_working_days(finish_point, -1)
    }
}

/// Per-activity dates and float, ready for serialization. Finish dates here
/// are inclusive (the last worked day), as scheduling tools display them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityDates {
    pub activity_id: String,
    pub early_start: NaiveDate,
    pub early_finish: NaiveDate,
    pub late_start: NaiveDate,
    pub late_finish: NaiveDate,
    /// Working days the activity can slip before delaying project finish.
    pub total_float: i64,
    /// Working days the activity can slip before delaying any successor.
    pub free_float: i64,
    pub is_critical: bool,
    pub is_near_critical: bool,
    pub complete: bool,
}

/// The CPM boundary record: plain serializable data with no references back
/// into the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CpmResult {
    pub activities: Vec<ActivityDates>,
    /// Inclusive project finish date; `None` for an empty network.
    pub project_finish: Option<NaiveDate>,
    /// Working days from planned start to finish in the project calendar.
    pub project_duration_days: i64,
    pub critical_path_ids: Vec<String>,
    pub constraint_warnings: Vec<ConstraintWarning>,
    pub excluded_activity_ids: Vec<String>,
}

impl CpmResult {
    /// Assembles the boundary record from the internal schedule and float
    /// analysis.
    pub fn from_parts(
        net: &ValidatedNetwork<'_>,
        sched: &DateSchedule,
        floats: &FloatResult,
    ) -> Result<Self, CpmError> {
        let mut activities = Vec::with_capacity(net.topo.len());
        for id in 0..net.len() as ActId {
            let Some(span) = sched.span(id) else {
                continue;
            };
            let act = net.activity(id);
            let i = id as usize;

            let (early_start, early_finish, late_start, late_finish) = if sched.complete[i] {
                let start = act.actual_start.or(act.actual_finish).unwrap_or(span.early_start);
                let finish = act.actual_finish.unwrap_or(start);
                (start, finish, start, finish)
            } else {
                let cal = net.calendar(id).ok_or_else(|| CalendarError::Unresolved {
                    activity_id: act.id.clone(),
                    calendar_id: act.calendar_id.clone(),
                })?;
                (
                    span.early_start,
                    inclusive_finish(cal, span.early_start, span.early_finish)?,
                    span.late_start,
                    inclusive_finish(cal, span.late_start, span.late_finish)?,
                )
            };

            activities.push(ActivityDates {
                activity_id: act.id.clone(),
                early_start,
                early_finish,
                late_start,
                late_finish,
                total_float: floats.total_float[i].unwrap_or(0),
                free_float: floats.free_float[i].unwrap_or(0),
                is_critical: floats.is_critical[i],
                is_near_critical: floats.is_near_critical[i],
                complete: sched.complete[i],
            });
        }

        let (project_finish, project_duration_days) = match net.doc.project_calendar() {
            Some(cal) if !net.topo.is_empty() => (
                Some(inclusive_finish(cal, sched.start_point, sched.finish_point)?),
                cal.working_days_between(sched.start_point, sched.finish_point),
            ),
            _ => (None, 0),
        };

        let critical_path_ids = floats
            .is_critical
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .filter_map(|(i, _)| net.index.resolve(i as ActId).map(|s| s.to_string()))
            .collect();

        Ok(Self {
            activities,
            project_finish,
            project_duration_days,
            critical_path_ids,
            constraint_warnings: sched.warnings.clone(),
            excluded_activity_ids: net.excluded_ids(),
        })
    }
}
