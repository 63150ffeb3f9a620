//! Configuration for the analysis pipeline.

use serde::{Deserialize, Serialize};

/// Which calendar float is measured in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatCalendarMode {
    /// Each activity's float is counted in its own calendar.
    #[default]
    OwnCalendar,
    /// All float is normalized to the project calendar (first calendar in
    /// the document).
    ProjectCalendar,
}

/// Published CPLI formulas differ on what "project total float" means.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpliVariant {
    /// Float between the computed finish and the backward-pass seed.
    #[default]
    SeedGap,
    /// Minimum total float across sink activities.
    MinSinkFloat,
}

/// Published BEI formulas differ on the denominator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeiVariant {
    /// Baseline activities due to finish by the data date.
    #[default]
    PlannedToDate,
    /// Every baseline activity regardless of due date.
    TotalPlanned,
}

/// Pass/warn/fail thresholds for the DCMA 14-point assessment.
///
/// Defaults are the published DCMA values; percentages are 0..100.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DcmaThresholds {
    /// Metric 1: max % of non-milestone activities missing logic.
    pub missing_logic_pct: f64,
    /// Metric 3: max % of relationships with positive lag.
    pub lag_pct: f64,
    /// Metric 4: max % of relationships that are not Finish-to-Start.
    pub non_fs_pct: f64,
    /// Metric 5: max % of activities with a hard constraint.
    pub hard_constraint_pct: f64,
    /// Metric 6: float above this many working days counts as high.
    pub high_float_days: i64,
    /// Metric 6: max % of incomplete activities with high float.
    pub high_float_pct: f64,
    /// Metric 8: duration above this many working days counts as high.
    pub high_duration_days: i64,
    /// Metric 8: max % of activities with high duration.
    pub high_duration_pct: f64,
    /// Metric 11: max % of completed activities finishing past baseline.
    pub missed_task_pct: f64,
    /// Metric 13: CPLI below this fails.
    pub cpli_low: f64,
    /// Metric 13: CPLI above this warns.
    pub cpli_high: f64,
    /// Metric 14: BEI below this fails.
    pub bei_min: f64,
}

impl Default for DcmaThresholds {
    fn default() -> Self {
        Self {
            missing_logic_pct: 5.0,
            lag_pct: 5.0,
            non_fs_pct: 10.0,
            hard_constraint_pct: 5.0,
            high_float_days: 44,
            high_float_pct: 5.0,
            high_duration_days: 44,
            high_duration_pct: 5.0,
            missed_task_pct: 5.0,
            cpli_low: 0.95,
            cpli_high: 1.00,
            bei_min: 0.95,
        }
    }
}

/// Knobs for the whole pipeline: validator, CPM engine, float analyzer, and
/// DCMA assessor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Total float at or below this counts as critical (working days).
    /// Nonzero values absorb rounding from cross-calendar conversion.
    pub float_tolerance_days: i64,
    /// Non-critical activities with float at or below this are flagged
    /// near-critical for risk reporting.
    pub near_critical_threshold_days: i64,
    /// Sanity bound on |lag|; a relationship beyond it fails validation.
    pub max_lag_days: i64,
    /// When set, an unresolved calendar excludes the activity from CPM
    /// instead of failing the run; exclusions are surfaced in the result.
    pub lenient_calendars: bool,
    pub float_calendar: FloatCalendarMode,
    pub cpli_variant: CpliVariant,
    pub bei_variant: BeiVariant,
    /// Working days added to a critical activity by the DCMA metric 12
    /// network integrity test.
    pub cp_test_inflation_days: i64,
    /// 0 = silent, 1 = pass summaries, 2 = per-activity detail, 3 = trace.
    pub verbosity: u8,
    pub dcma: DcmaThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            float_tolerance_days: 0,
            near_critical_threshold_days: 10,
            max_lag_days: 120,
            lenient_calendars: false,
            float_calendar: FloatCalendarMode::OwnCalendar,
            cpli_variant: CpliVariant::SeedGap,
            bei_variant: BeiVariant::PlannedToDate,
            cp_test_inflation_days: 600,
            verbosity: 0,
            dcma: DcmaThresholds::default(),
        }
    }
}
