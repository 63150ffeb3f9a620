//! Schedule network analysis engine.
//!
//! Takes a normalized project schedule (activities, precedence
//! relationships, working calendars) and computes the Critical Path Method
//! solution plus a DCMA 14-point quality assessment. Format parsing
//! (Primavera XER, MS-Project XML), persistence, and transport live outside
//! this crate; the boundary is [`ScheduleDocument`] in and plain
//! serializable reports out.
//!
//! # Modules
//!
//! - **`models`**: normalized schedule entities — [`Project`], [`Activity`],
//!   [`Relationship`], [`ScheduleDocument`]
//! - **`calendar`**: working-day masks, exceptions, and date arithmetic
//! - **`network`**: referential integrity, cycle detection (Kahn), and the
//!   dense activity arena
//! - **`cpm`**: calendar-aware forward/backward passes
//! - **`float`**: total/free float, criticality, near-critical flags
//! - **`dcma`**: the 14-point assessment over a static metric registry
//! - **`variance`**: baseline comparison and slip reporting
//!
//! # Pipeline
//!
//! Each stage is a pure function of its inputs; nothing mutates the
//! document. [`analyze`] chains validate → compute dates → float → assess,
//! which is the order the stages depend on each other. Independent schedule
//! snapshots can be analyzed concurrently without coordination.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod calendar;
pub mod config;
pub mod cpm;
pub mod dcma;
pub mod float;
pub mod logging;
pub mod models;
pub mod network;
pub mod variance;

pub use calendar::{Calendar, CalendarError};
pub use config::{AnalysisConfig, BeiVariant, CpliVariant, DcmaThresholds, FloatCalendarMode};
pub use cpm::{
    compute_dates, ActivityDates, CancelToken, ConstraintWarning, CpmError, CpmOptions, CpmResult,
    DateSchedule, DateSpan,
};
pub use dcma::{assess, DcmaReport, MetricResult, Status};
pub use float::{analyze_float, FloatResult};
pub use models::{
    Activity, ConstraintType, Project, RelationType, Relationship, ResourceAssignment,
    ScheduleDocument,
};
pub use network::{
    validate, ActId, ActivityIndex, NetworkError, ValidateError, ValidatedNetwork, ValidationError,
};
pub use variance::{compare_to_baseline, ActivityVariance, VarianceReport};

/// Any way a full analysis run can fail.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Validate(#[from] ValidateError),
    #[error(transparent)]
    Cpm(#[from] CpmError),
}

/// Combined output of one analysis run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub cpm: CpmResult,
    pub dcma: DcmaReport,
    /// Present only when a baseline was supplied.
    pub variance: Option<VarianceReport>,
}

/// Runs the full pipeline without a baseline. DCMA metrics 11 and 14 report
/// NotEvaluated.
pub fn analyze(
    doc: &ScheduleDocument,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalyzeError> {
    analyze_with_options(doc, None, config, &CpmOptions::default())
}

/// Runs the full pipeline against a baseline snapshot, enabling the
/// baseline-dependent DCMA metrics and the variance report.
pub fn analyze_with_baseline(
    doc: &ScheduleDocument,
    baseline: &ScheduleDocument,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalyzeError> {
    analyze_with_options(doc, Some(baseline), config, &CpmOptions::default())
}

/// Full pipeline with explicit CPM options (external finish constraint,
/// deadline/cancellation token).
pub fn analyze_with_options(
    doc: &ScheduleDocument,
    baseline: Option<&ScheduleDocument>,
    config: &AnalysisConfig,
    options: &CpmOptions,
) -> Result<AnalysisReport, AnalyzeError> {
    let net = network::validate(doc, config)?;
    let sched = cpm::compute_dates(&net, config, options)?;
    let floats = float::analyze_float(&net, &sched, config).map_err(CpmError::from)?;
    let dcma_report = dcma::assess(&net, &sched, &floats, baseline, config);
    let cpm_result = CpmResult::from_parts(&net, &sched, &floats)?;

    Ok(AnalysisReport {
        cpm: cpm_result,
        dcma: dcma_report,
        variance: baseline.map(|b| variance::compare_to_baseline(doc, b)),
    })
}
