//! The fourteen DCMA checks.
//!
//! Every function is pure over [`AssessCtx`] and returns a
//! [`MetricOutcome`]; thresholds come from the configured
//! [`crate::config::DcmaThresholds`].

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{AssessCtx, MetricOutcome, Status};
use crate::config::{BeiVariant, CpliVariant};
use crate::cpm::{compute_dates_inflated, CpmOptions};
use crate::models::RelationType;
use crate::network::ActId;

fn pct(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 * 100.0 / denominator as f64
    }
}

fn threshold_status(value: f64, limit: f64, breach: Status) -> Status {
    if value > limit {
        breach
    } else {
        Status::Pass
    }
}

/// Metric 1: non-milestone activities missing a predecessor or successor.
pub(super) fn logic(ctx: &AssessCtx) -> MetricOutcome {
    let mut offenders = Vec::new();
    let mut denom = 0usize;
    for &id in &ctx.net.topo {
        let act = ctx.net.activity(id);
        if act.is_milestone() {
            continue;
        }
        denom += 1;
        let i = id as usize;
        if ctx.net.preds[i].is_empty() || ctx.net.succs[i].is_empty() {
            offenders.push(act.id.clone());
        }
    }
    let raw = pct(offenders.len(), denom);
    let status = threshold_status(raw, ctx.config.dcma.missing_logic_pct, Status::Fail);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 2: relationships with negative lag. Any lead fails.
pub(super) fn leads(ctx: &AssessCtx) -> MetricOutcome {
    let offenders: Vec<String> = ctx
        .net
        .doc
        .relationships
        .iter()
        .filter(|r| r.lag < 0)
        .map(|r| r.successor_id.clone())
        .collect();
    let status = if offenders.is_empty() {
        Status::Pass
    } else {
        Status::Fail
    };
    MetricOutcome::evaluated(offenders.len() as f64, status, offenders)
}

/// Metric 3: share of relationships with positive lag.
pub(super) fn lags(ctx: &AssessCtx) -> MetricOutcome {
    let rels = &ctx.net.doc.relationships;
    let offenders: Vec<String> = rels
        .iter()
        .filter(|r| r.lag > 0)
        .map(|r| r.successor_id.clone())
        .collect();
    let raw = pct(offenders.len(), rels.len());
    let status = threshold_status(raw, ctx.config.dcma.lag_pct, Status::Fail);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 4: share of relationships that are not Finish-to-Start.
pub(super) fn relationship_types(ctx: &AssessCtx) -> MetricOutcome {
    let rels = &ctx.net.doc.relationships;
    let offenders: Vec<String> = rels
        .iter()
        .filter(|r| r.kind != RelationType::FinishToStart)
        .map(|r| r.successor_id.clone())
        .collect();
    let raw = pct(offenders.len(), rels.len());
    let status = threshold_status(raw, ctx.config.dcma.non_fs_pct, Status::Warn);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 5: activities pinned by a must-start/must-finish constraint.
pub(super) fn hard_constraints(ctx: &AssessCtx) -> MetricOutcome {
    let mut offenders = Vec::new();
    let mut denom = 0usize;
    for &id in &ctx.net.topo {
        denom += 1;
        let act = ctx.net.activity(id);
        if act.constraint.is_hard() {
            offenders.push(act.id.clone());
        }
    }
    let raw = pct(offenders.len(), denom);
    let status = threshold_status(raw, ctx.config.dcma.hard_constraint_pct, Status::Fail);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 6: incomplete activities with excessive total float.
pub(super) fn high_float(ctx: &AssessCtx) -> MetricOutcome {
    let mut offenders = Vec::new();
    let mut denom = 0usize;
    for &id in &ctx.net.topo {
        let i = id as usize;
        if ctx.sched.complete[i] {
            continue;
        }
        denom += 1;
        if let Some(tf) = ctx.floats.total_float[i] {
            if tf > ctx.config.dcma.high_float_days {
                offenders.push(ctx.net.activity(id).id.clone());
            }
        }
    }
    let raw = pct(offenders.len(), denom);
    let status = threshold_status(raw, ctx.config.dcma.high_float_pct, Status::Fail);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 7: activities with negative total float. Any count fails.
pub(super) fn negative_float(ctx: &AssessCtx) -> MetricOutcome {
    let mut offenders = Vec::new();
    for &id in &ctx.net.topo {
        let i = id as usize;
        if ctx.sched.complete[i] {
            continue;
        }
        if matches!(ctx.floats.total_float[i], Some(tf) if tf < 0) {
            offenders.push(ctx.net.activity(id).id.clone());
        }
    }
    let status = if offenders.is_empty() {
        Status::Pass
    } else {
        Status::Fail
    };
    MetricOutcome::evaluated(offenders.len() as f64, status, offenders)
}

/// Metric 8: activities with excessive duration. The model carries no
/// summary activities, so every activity is in the denominator.
pub(super) fn high_duration(ctx: &AssessCtx) -> MetricOutcome {
    let mut offenders = Vec::new();
    let mut denom = 0usize;
    for &id in &ctx.net.topo {
        denom += 1;
        let act = ctx.net.activity(id);
        if act.duration > ctx.config.dcma.high_duration_days {
            offenders.push(act.id.clone());
        }
    }
    let raw = pct(offenders.len(), denom);
    let status = threshold_status(raw, ctx.config.dcma.high_duration_pct, Status::Fail);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 9: actual dates after the data date, or forecast dates before it.
pub(super) fn invalid_dates(ctx: &AssessCtx) -> MetricOutcome {
    let data_date = ctx.net.doc.project.data_date;
    let mut offenders = Vec::new();
    for &id in &ctx.net.topo {
        let i = id as usize;
        let act = ctx.net.activity(id);
        let mut bad = act.actual_start.is_some_and(|s| s > data_date)
            || act.actual_finish.is_some_and(|f| f > data_date);
        if !bad && !ctx.sched.started[i] {
            if let Some(span) = ctx.sched.span(id) {
                bad = span.early_start < data_date;
            }
        }
        if bad {
            offenders.push(act.id.clone());
        }
    }
    let status = if offenders.is_empty() {
        Status::Pass
    } else {
        Status::Fail
    };
    MetricOutcome::evaluated(offenders.len() as f64, status, offenders)
}

/// Metric 10: incomplete activities with no resource assignment. Only
/// evaluated when assignment data was supplied at all.
pub(super) fn resources(ctx: &AssessCtx) -> MetricOutcome {
    let Some(assignments) = &ctx.net.doc.assignments else {
        return MetricOutcome::not_evaluated("no resource assignment data supplied");
    };
    let assigned: FxHashSet<&str> = assignments
        .iter()
        .map(|a| a.activity_id.as_str())
        .collect();

    let mut offenders = Vec::new();
    let mut denom = 0usize;
    for &id in &ctx.net.topo {
        let i = id as usize;
        let act = ctx.net.activity(id);
        if ctx.sched.complete[i] || act.is_milestone() {
            continue;
        }
        denom += 1;
        if !assigned.contains(act.id.as_str()) {
            offenders.push(act.id.clone());
        }
    }
    let raw = pct(offenders.len(), denom);
    let status = threshold_status(raw, 0.0, Status::Warn);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 11: completed activities that finished after their baseline date.
pub(super) fn missed_tasks(ctx: &AssessCtx) -> MetricOutcome {
    let Some(baseline) = ctx.baseline else {
        return MetricOutcome::not_evaluated("no baseline supplied");
    };
    let baseline_finish: FxHashMap<&str, NaiveDate> = baseline
        .activities
        .iter()
        .filter_map(|a| {
            a.planned_finish
                .or(a.actual_finish)
                .map(|f| (a.id.as_str(), f))
        })
        .collect();

    let mut offenders = Vec::new();
    let mut denom = 0usize;
    for &id in &ctx.net.topo {
        let act = ctx.net.activity(id);
        let Some(actual) = act.actual_finish else {
            continue;
        };
        let Some(&target) = baseline_finish.get(act.id.as_str()) else {
            continue;
        };
        denom += 1;
        if actual > target {
            offenders.push(act.id.clone());
        }
    }
    if denom == 0 {
        return MetricOutcome::not_evaluated("no completed activities with a baseline finish");
    }
    let raw = pct(offenders.len(), denom);
    let status = threshold_status(raw, ctx.config.dcma.missed_task_pct, Status::Fail);
    MetricOutcome::evaluated(raw, status, offenders)
}

/// Metric 12: synthetic network integrity probe. Consuming a non-critical
/// activity's float must leave the project finish alone; inflating a
/// critical activity must move it by exactly the inflation.
pub(super) fn critical_path_test(ctx: &AssessCtx) -> MetricOutcome {
    let mut critical_candidate: Option<ActId> = None;
    let mut float_candidate: Option<(ActId, i64)> = None;
    for &id in &ctx.net.topo {
        let i = id as usize;
        if ctx.sched.started[i] {
            continue;
        }
        if ctx.floats.is_critical[i] && critical_candidate.is_none() {
            critical_candidate = Some(id);
        }
        if let Some(tf) = ctx.floats.total_float[i] {
            if tf > 0 && float_candidate.map_or(true, |(_, best)| tf > best) {
                float_candidate = Some((id, tf));
            }
        }
    }
    let Some(critical) = critical_candidate else {
        return MetricOutcome::not_evaluated("no unstarted critical activity to probe");
    };

    let options = CpmOptions::default();
    let base_finish = ctx.sched.finish_point;
    let mut violations: Vec<String> = Vec::new();

    if let Some((id, tf)) = float_candidate {
        match compute_dates_inflated(ctx.net, ctx.config, &options, &[(id, tf)]) {
            Ok(probe) => {
                if probe.finish_point != base_finish {
                    violations.push(ctx.net.activity(id).id.clone());
                }
            }
            Err(_) => return MetricOutcome::not_evaluated("date computation failed during probe"),
        }
    }

    let inflation = ctx.config.cp_test_inflation_days;
    match compute_dates_inflated(ctx.net, ctx.config, &options, &[(critical, inflation)]) {
        Ok(probe) => {
            let shift = ctx
                .net
                .calendar(critical)
                .map(|cal| cal.working_days_between(base_finish, probe.finish_point))
                .unwrap_or(0);
            if shift != inflation {
                violations.push(ctx.net.activity(critical).id.clone());
            }
        }
        Err(_) => return MetricOutcome::not_evaluated("date computation failed during probe"),
    }

    let status = if violations.is_empty() {
        Status::Pass
    } else {
        Status::Fail
    };
    MetricOutcome::evaluated(violations.len() as f64, status, violations)
}

/// Metric 13: Critical Path Length Index.
pub(super) fn cpli(ctx: &AssessCtx) -> MetricOutcome {
    let Some(cal) = ctx.net.doc.project_calendar() else {
        return MetricOutcome::not_evaluated("no project calendar");
    };
    let length = cal.working_days_between(ctx.sched.start_point, ctx.sched.finish_point);
    if length <= 0 {
        return MetricOutcome::not_evaluated("zero-length critical path");
    }
    let project_float = match ctx.config.cpli_variant {
        CpliVariant::SeedGap => {
            cal.working_days_between(ctx.sched.finish_point, ctx.sched.seed_point)
        }
        CpliVariant::MinSinkFloat => {
            let mut min_tf: Option<i64> = None;
            for &id in &ctx.net.topo {
                let i = id as usize;
                if ctx.sched.complete[i] || !ctx.net.succs[i].is_empty() {
                    continue;
                }
                if let Some(tf) = ctx.floats.total_float[i] {
                    min_tf = Some(min_tf.map_or(tf, |m| m.min(tf)));
                }
            }
            min_tf.unwrap_or(0)
        }
    };
    let value = (length + project_float) as f64 / length as f64;
    let status = if value < ctx.config.dcma.cpli_low {
        Status::Fail
    } else if value > ctx.config.dcma.cpli_high {
        Status::Warn
    } else {
        Status::Pass
    };
    MetricOutcome::evaluated(value, status, Vec::new())
}

/// Metric 14: Baseline Execution Index.
pub(super) fn bei(ctx: &AssessCtx) -> MetricOutcome {
    let Some(baseline) = ctx.baseline else {
        return MetricOutcome::not_evaluated("no baseline supplied");
    };
    let data_date = ctx.net.doc.project.data_date;

    let due: Vec<&str> = baseline
        .activities
        .iter()
        .filter(|a| match ctx.config.bei_variant {
            BeiVariant::PlannedToDate => a
                .planned_finish
                .or(a.actual_finish)
                .is_some_and(|f| f <= data_date),
            BeiVariant::TotalPlanned => true,
        })
        .map(|a| a.id.as_str())
        .collect();
    if due.is_empty() {
        return MetricOutcome::not_evaluated("no baseline activities due by the data date");
    }

    let completed: FxHashSet<&str> = ctx
        .net
        .doc
        .activities
        .iter()
        .filter(|a| a.actual_finish.is_some_and(|f| f <= data_date))
        .map(|a| a.id.as_str())
        .collect();

    let offenders: Vec<String> = due
        .iter()
        .filter(|id| !completed.contains(*id))
        .map(|id| id.to_string())
        .collect();

    let value = completed.len() as f64 / due.len() as f64;
    let status = if value < ctx.config.dcma.bei_min {
        Status::Fail
    } else {
        Status::Pass
    };
    MetricOutcome::evaluated(value, status, offenders)
}
