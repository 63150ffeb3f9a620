//! DCMA 14-point schedule quality assessment.
//!
//! Each metric is a pure function over the validated network, computed
//! dates, and float analysis, registered in a static table ([`METRICS`])
//! keyed by metric id. Metric evaluation never fails: an inapplicable
//! metric (no baseline, no resource data) reports
//! [`Status::NotEvaluated`] with a reason instead of being skipped.

mod metrics;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::cpm::DateSchedule;
use crate::float::FloatResult;
use crate::log_detail;
use crate::models::ScheduleDocument;
use crate::network::ValidatedNetwork;

/// Outcome of one metric against its threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pass,
    Warn,
    Fail,
    /// The metric's inputs were not supplied (e.g. no baseline); reported
    /// explicitly, never silently omitted.
    NotEvaluated,
}

/// One row of the assessment report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricResult {
    /// 1..=14.
    pub id: u8,
    pub name: String,
    /// Percentage for ratio metrics, count for count metrics, index value
    /// for CPLI/BEI.
    pub raw_value: f64,
    pub status: Status,
    /// Activity ids behind the measurement, for traceability.
    pub offenders: Vec<String>,
    pub note: Option<String>,
}

/// The full 14-point report: plain serializable data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DcmaReport {
    /// Always 14 entries, ordered by metric id.
    pub metrics: Vec<MetricResult>,
    /// Number of metrics with [`Status::Pass`].
    pub pass_count: usize,
    pub cpli: Option<f64>,
    pub bei: Option<f64>,
}

/// What a metric function produces; id and name come from the registry.
pub(crate) struct MetricOutcome {
    raw_value: f64,
    status: Status,
    offenders: Vec<String>,
    note: Option<String>,
}

impl MetricOutcome {
    fn evaluated(raw_value: f64, status: Status, offenders: Vec<String>) -> Self {
        Self {
            raw_value,
            status,
            offenders,
            note: None,
        }
    }

    fn not_evaluated(note: impl Into<String>) -> Self {
        Self {
            raw_value: 0.0,
            status: Status::NotEvaluated,
            offenders: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// Everything a metric function may consult.
pub(crate) struct AssessCtx<'a> {
    pub net: &'a ValidatedNetwork<'a>,
    pub sched: &'a DateSchedule,
    pub floats: &'a FloatResult,
    pub baseline: Option<&'a ScheduleDocument>,
    pub config: &'a AnalysisConfig,
}

struct MetricDescriptor {
    id: u8,
    name: &'static str,
    run: fn(&AssessCtx) -> MetricOutcome,
}

/// The metric registry: a statically known mapping from metric id to its
/// check, resolved at compile time.
static METRICS: &[MetricDescriptor] = &[
    MetricDescriptor { id: 1, name: "Logic", run: metrics::logic },
    MetricDescriptor { id: 2, name: "Leads", run: metrics::leads },
    MetricDescriptor { id: 3, name: "Lags", run: metrics::lags },
    MetricDescriptor { id: 4, name: "Relationship Types", run: metrics::relationship_types },
    MetricDescriptor { id: 5, name: "Hard Constraints", run: metrics::hard_constraints },
    MetricDescriptor { id: 6, name: "High Float", run: metrics::high_float },
    MetricDescriptor { id: 7, name: "Negative Float", run: metrics::negative_float },
    MetricDescriptor { id: 8, name: "High Duration", run: metrics::high_duration },
    MetricDescriptor { id: 9, name: "Invalid Dates", run: metrics::invalid_dates },
    MetricDescriptor { id: 10, name: "Resources", run: metrics::resources },
    MetricDescriptor { id: 11, name: "Missed Tasks", run: metrics::missed_tasks },
    MetricDescriptor { id: 12, name: "Critical Path Test", run: metrics::critical_path_test },
    MetricDescriptor { id: 13, name: "Critical Path Length Index", run: metrics::cpli },
    MetricDescriptor { id: 14, name: "Baseline Execution Index", run: metrics::bei },
];

/// Runs all 14 checks and assembles the report.
pub fn assess(
    net: &ValidatedNetwork<'_>,
    sched: &DateSchedule,
    floats: &FloatResult,
    baseline: Option<&ScheduleDocument>,
    config: &AnalysisConfig,
) -> DcmaReport {
    let ctx = AssessCtx {
        net,
        sched,
        floats,
        baseline,
        config,
    };

    let mut results = Vec::with_capacity(METRICS.len());
    for metric in METRICS {
        let outcome = (metric.run)(&ctx);
        log_detail!(
            config.verbosity,
            "dcma {:>2} {}: {:?} (raw {:.2}, {} offenders)",
            metric.id,
            metric.name,
            outcome.status,
            outcome.raw_value,
            outcome.offenders.len()
        );
        results.push(MetricResult {
            id: metric.id,
            name: metric.name.to_string(),
            raw_value: outcome.raw_value,
            status: outcome.status,
            offenders: outcome.offenders,
            note: outcome.note,
        });
    }

    let pass_count = results.iter().filter(|r| r.status == Status::Pass).count();
    let index_value = |id: u8| {
        results
            .iter()
            .find(|r| r.id == id)
            .filter(|r| r.status != Status::NotEvaluated)
            .map(|r| r.raw_value)
    };
    let cpli = index_value(13);
    let bei = index_value(14);

    DcmaReport {
        metrics: results,
        pass_count,
        cpli,
        bei,
    }
}
