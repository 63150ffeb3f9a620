//! Network validation: referential integrity, topological ordering, and the
//! dense activity arena consumed by the CPM engine.
//!
//! All downstream stages index activities by [`ActId`] (a dense `u32`
//! assigned in document order) and walk `Vec`-based adjacency lists, so the
//! graph is cheap to traverse and deterministic to test.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use thiserror::Error;

use crate::calendar::{Calendar, CalendarError};
use crate::config::AnalysisConfig;
use crate::log_summary;
use crate::models::{Activity, ConstraintType, RelationType, ScheduleDocument};

/// Dense activity id; position in `ScheduleDocument::activities`.
pub type ActId = u32;

/// Malformed-document errors, reported before any date math runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("duplicate activity id '{0}'")]
    DuplicateActivity(String),
    #[error("relationship {predecessor_id} -> {successor_id} references unknown activity '{missing_id}'")]
    DanglingRelationship {
        predecessor_id: String,
        successor_id: String,
        missing_id: String,
    },
    #[error("activity '{activity_id}' has negative duration {duration}")]
    NegativeDuration { activity_id: String, duration: i64 },
    #[error("relationship {predecessor_id} -> {successor_id} lag {lag} exceeds the sanity bound of {max} working days")]
    ExcessiveLag {
        predecessor_id: String,
        successor_id: String,
        lag: i64,
        max: i64,
    },
    #[error("activity '{activity_id}' percent complete {value} is outside 0..=100")]
    InvalidPercentComplete { activity_id: String, value: f64 },
    #[error("activity '{activity_id}' has constraint {constraint:?} but no constraint date")]
    MissingConstraintDate {
        activity_id: String,
        constraint: ConstraintType,
    },
}

/// Structural graph errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The relationship digraph is not acyclic. `activity_ids` is the
    /// residual set left after Kahn's algorithm drains every zero-in-degree
    /// node; it contains at least one member of some cycle.
    #[error("cycle detected in the relationship graph involving {activity_ids:?}")]
    Cycle { activity_ids: Vec<String> },
}

/// Any reason `validate` can reject a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Bidirectional map between activity id strings and dense [`ActId`]s.
#[derive(Debug, Clone, Default)]
pub struct ActivityIndex {
    to_id: FxHashMap<String, ActId>,
    from_id: Vec<String>,
}

impl ActivityIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_id: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_id: Vec::with_capacity(capacity),
        }
    }

    /// Inserts a new id, returning `None` if it is already present.
    fn insert(&mut self, s: &str) -> Option<ActId> {
        if self.to_id.contains_key(s) {
            return None;
        }
        let id = self.from_id.len() as ActId;
        self.from_id.push(s.to_string());
        self.to_id.insert(s.to_string(), id);
        Some(id)
    }

    #[inline]
    pub fn get(&self, s: &str) -> Option<ActId> {
        self.to_id.get(s).copied()
    }

    #[inline]
    pub fn resolve(&self, id: ActId) -> Option<&str> {
        self.from_id.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.from_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_id.is_empty()
    }
}

/// One direction of a relationship as seen from an activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub other: ActId,
    pub kind: RelationType,
    pub lag: i64,
}

/// Component label for activities excluded in lenient calendar mode.
const NO_COMPONENT: u32 = u32::MAX;

/// A structurally sound activity network, ready for date computation.
///
/// Borrows the document; owns the arena. The topological order is consumed
/// directly by the CPM engine so it never recomputes it.
#[derive(Debug)]
pub struct ValidatedNetwork<'a> {
    pub doc: &'a ScheduleDocument,
    pub index: ActivityIndex,
    /// Per-activity index into `doc.calendars`; `None` only in lenient mode.
    calendar_ix: Vec<Option<usize>>,
    /// Incoming edges: `preds[s]` lists predecessors of `s`.
    pub preds: Vec<Vec<Edge>>,
    /// Outgoing edges: `succs[p]` lists successors of `p`.
    pub succs: Vec<Vec<Edge>>,
    /// Topological order over included activities.
    pub topo: Vec<ActId>,
    /// Weakly-connected component label per activity (excluded activities
    /// carry no label).
    pub components: Vec<u32>,
    pub component_count: u32,
    /// Activities excluded by lenient calendar resolution.
    pub excluded: Vec<bool>,
}

impl<'a> ValidatedNetwork<'a> {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn activity(&self, id: ActId) -> &'a Activity {
        &self.doc.activities[id as usize]
    }

    /// Resolved calendar for an included activity; `None` for excluded ones.
    #[inline]
    pub fn calendar(&self, id: ActId) -> Option<&'a Calendar> {
        self.calendar_ix[id as usize].map(|ix| &self.doc.calendars[ix])
    }

    #[inline]
    pub fn included(&self, id: ActId) -> bool {
        !self.excluded[id as usize]
    }

    /// Ids of activities excluded from CPM by lenient calendar resolution.
    pub fn excluded_ids(&self) -> Vec<String> {
        self.excluded
            .iter()
            .enumerate()
            .filter(|(_, &ex)| ex)
            .map(|(i, _)| self.doc.activities[i].id.clone())
            .collect()
    }
}

/// Validates referential integrity and acyclicity, producing the arena and
/// topological order for the CPM engine. Pure: the document is not touched.
pub fn validate<'a>(
    doc: &'a ScheduleDocument,
    config: &AnalysisConfig,
) -> Result<ValidatedNetwork<'a>, ValidateError> {
    let n = doc.activities.len();
    let mut index = ActivityIndex::with_capacity(n);

    for act in &doc.activities {
        if act.duration < 0 {
            return Err(ValidationError::NegativeDuration {
                activity_id: act.id.clone(),
                duration: act.duration,
            }
            .into());
        }
        if !(0.0..=100.0).contains(&act.percent_complete) {
            return Err(ValidationError::InvalidPercentComplete {
                activity_id: act.id.clone(),
                value: act.percent_complete,
            }
            .into());
        }
        if act.constraint != ConstraintType::None && act.constraint_date.is_none() {
            return Err(ValidationError::MissingConstraintDate {
                activity_id: act.id.clone(),
                constraint: act.constraint,
            }
            .into());
        }
        if index.insert(&act.id).is_none() {
            return Err(ValidationError::DuplicateActivity(act.id.clone()).into());
        }
    }

    // Calendar resolution. First calendar with a given id wins.
    let mut calendar_ids: FxHashMap<&str, usize> =
        FxHashMap::with_capacity_and_hasher(doc.calendars.len(), Default::default());
    for (ix, cal) in doc.calendars.iter().enumerate() {
        calendar_ids.entry(cal.id.as_str()).or_insert(ix);
    }

    let mut calendar_ix: Vec<Option<usize>> = Vec::with_capacity(n);
    let mut excluded = vec![false; n];
    for (i, act) in doc.activities.iter().enumerate() {
        match calendar_ids.get(act.calendar_id.as_str()) {
            Some(&ix) => calendar_ix.push(Some(ix)),
            None if config.lenient_calendars => {
                excluded[i] = true;
                calendar_ix.push(None);
            }
            None => {
                return Err(CalendarError::Unresolved {
                    activity_id: act.id.clone(),
                    calendar_id: act.calendar_id.clone(),
                }
                .into());
            }
        }
    }

    // Relationships: endpoint and lag checks, then adjacency. Edges touching
    // an excluded activity are validated but not traversed.
    let mut preds: Vec<Vec<Edge>> = vec![Vec::new(); n];
    let mut succs: Vec<Vec<Edge>> = vec![Vec::new(); n];
    for rel in &doc.relationships {
        let pred = index.get(&rel.predecessor_id).ok_or_else(|| {
            ValidationError::DanglingRelationship {
                predecessor_id: rel.predecessor_id.clone(),
                successor_id: rel.successor_id.clone(),
                missing_id: rel.predecessor_id.clone(),
            }
        })?;
        let succ = index.get(&rel.successor_id).ok_or_else(|| {
            ValidationError::DanglingRelationship {
                predecessor_id: rel.predecessor_id.clone(),
                successor_id: rel.successor_id.clone(),
                missing_id: rel.successor_id.clone(),
            }
        })?;
        if rel.lag.abs() > config.max_lag_days {
            return Err(ValidationError::ExcessiveLag {
                predecessor_id: rel.predecessor_id.clone(),
                successor_id: rel.successor_id.clone(),
                lag: rel.lag,
                max: config.max_lag_days,
            }
            .into());
        }
        if excluded[pred as usize] || excluded[succ as usize] {
            continue;
        }
        succs[pred as usize].push(Edge {
            other: succ,
            kind: rel.kind,
            lag: rel.lag,
        });
        preds[succ as usize].push(Edge {
            other: pred,
            kind: rel.kind,
            lag: rel.lag,
        });
    }

    let topo = topological_order(n, &excluded, &preds, &succs, &index)?;
    let (components, component_count) = label_components(n, &excluded, &preds, &succs);

    log_summary!(
        config.verbosity,
        "validated network: {} activities ({} excluded), {} relationships, {} components",
        n,
        excluded.iter().filter(|&&e| e).count(),
        doc.relationships.len(),
        component_count
    );

    Ok(ValidatedNetwork {
        doc,
        index,
        calendar_ix,
        preds,
        succs,
        topo,
        components,
        component_count,
        excluded,
    })
}

/// Kahn's algorithm over included activities. A non-empty residual after
/// draining every zero-in-degree node is a cycle.
fn topological_order(
    n: usize,
    excluded: &[bool],
    preds: &[Vec<Edge>],
    succs: &[Vec<Edge>],
    index: &ActivityIndex,
) -> Result<Vec<ActId>, NetworkError> {
    let mut in_degree = vec![0usize; n];
    let mut included_count = 0usize;
    for i in 0..n {
        if excluded[i] {
            continue;
        }
        included_count += 1;
        in_degree[i] = preds[i].len();
    }

    // Seed in ascending id order for a deterministic result.
    let mut queue: VecDeque<ActId> = (0..n)
        .filter(|&i| !excluded[i] && in_degree[i] == 0)
        .map(|i| i as ActId)
        .collect();

    let mut order: Vec<ActId> = Vec::with_capacity(included_count);
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for edge in &succs[id as usize] {
            let s = edge.other as usize;
            in_degree[s] -= 1;
            if in_degree[s] == 0 {
                queue.push_back(edge.other);
            }
        }
    }

    if order.len() != included_count {
        let mut seen = vec![false; n];
        for &id in &order {
            seen[id as usize] = true;
        }
        let activity_ids = (0..n)
            .filter(|&i| !excluded[i] && !seen[i])
            .filter_map(|i| index.resolve(i as ActId).map(|s| s.to_string()))
            .collect();
        return Err(NetworkError::Cycle { activity_ids });
    }

    Ok(order)
}

/// Labels weakly-connected components by undirected BFS. Disjoint
/// sub-projects carry no cross-component ordering constraint.
fn label_components(
    n: usize,
    excluded: &[bool],
    preds: &[Vec<Edge>],
    succs: &[Vec<Edge>],
) -> (Vec<u32>, u32) {
    let mut labels = vec![NO_COMPONENT; n];
    let mut next = 0u32;
    let mut queue: VecDeque<usize> = VecDeque::new();

    for start in 0..n {
        if excluded[start] || labels[start] != NO_COMPONENT {
            continue;
        }
        labels[start] = next;
        queue.push_back(start);
        while let Some(i) = queue.pop_front() {
            for edge in preds[i].iter().chain(succs[i].iter()) {
                let j = edge.other as usize;
                if labels[j] == NO_COMPONENT {
                    labels[j] = next;
                    queue.push_back(j);
                }
            }
        }
        next += 1;
    }

    (labels, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;
    use crate::models::{Project, Relationship};
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

    #[test]
    fn test_valid_chain() {
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 5),
                Activity::new("B", "B", 3),
                Activity::new("C", "C", 2),
            ],
            vec![Relationship::new("A", "B"), Relationship::new("B", "C")],
        );
        let net = validate(&doc, &AnalysisConfig::default()).unwrap();
        assert_eq!(net.len(), 3);
        assert_eq!(net.topo.len(), 3);
        assert_eq!(net.component_count, 1);
    }

    #[test]
    fn test_topo_order_respects_precedence() {
        let doc = make_doc(
            vec![
                Activity::new("C", "C", 2),
                Activity::new("A", "A", 5),
                Activity::new("B", "B", 3),
            ],
            vec![Relationship::new("A", "B"), Relationship::new("B", "C")],
        );
        let net = validate(&doc, &AnalysisConfig::default()).unwrap();
        let pos: FxHashMap<&str, usize> = net
            .topo
            .iter()
            .enumerate()
            .map(|(p, &id)| (net.index.resolve(id).unwrap(), p))
            .collect();
        assert!(pos["A"] < pos["B"]);
        assert!(pos["B"] < pos["C"]);
    }

    #[test]
    fn test_duplicate_activity_id() {
        let doc = make_doc(
            vec![Activity::new("A", "first", 1), Activity::new("A", "second", 2)],
            vec![],
        );
        let err = validate(&doc, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Validation(ValidationError::DuplicateActivity(ref id)) if id == "A"
        ));
    }

    #[test]
    fn test_dangling_relationship() {
        let doc = make_doc(
            vec![Activity::new("A", "A", 1)],
            vec![Relationship::new("A", "GHOST")],
        );
        let err = validate(&doc, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Validation(ValidationError::DanglingRelationship { ref missing_id, .. })
                if missing_id == "GHOST"
        ));
    }

    #[test]
    fn test_cycle_reports_participants() {
        let doc = make_doc(
            vec![Activity::new("A", "A", 1), Activity::new("B", "B", 1)],
            vec![Relationship::new("A", "B"), Relationship::new("B", "A")],
        );
        let err = validate(&doc, &AnalysisConfig::default()).unwrap_err();
        match err {
            ValidateError::Network(NetworkError::Cycle { activity_ids }) => {
                assert!(activity_ids.contains(&"A".to_string()));
                assert!(activity_ids.contains(&"B".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_duration() {
        let doc = make_doc(vec![Activity::new("A", "A", -1)], vec![]);
        let err = validate(&doc, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Validation(ValidationError::NegativeDuration { .. })
        ));
    }

    #[test]
    fn test_excessive_lag() {
        let doc = make_doc(
            vec![Activity::new("A", "A", 1), Activity::new("B", "B", 1)],
            vec![Relationship::new("A", "B").with_lag(-500)],
        );
        let err = validate(&doc, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Validation(ValidationError::ExcessiveLag { lag: -500, .. })
        ));
    }

    #[test]
    fn test_missing_constraint_date() {
        let mut doc = make_doc(vec![Activity::new("A", "A", 1)], vec![]);
        doc.activities[0].constraint = ConstraintType::MustStartOn;
        let err = validate(&doc, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Validation(ValidationError::MissingConstraintDate { .. })
        ));
    }

    #[test]
    fn test_unresolved_calendar_strict() {
        let mut doc = make_doc(vec![Activity::new("A", "A", 1)], vec![]);
        doc.activities[0].calendar_id = "nope".to_string();
        let err = validate(&doc, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Calendar(CalendarError::Unresolved { .. })
        ));
    }

    #[test]
    fn test_unresolved_calendar_lenient_excludes() {
        let mut doc = make_doc(
            vec![Activity::new("A", "A", 1), Activity::new("B", "B", 1)],
            vec![Relationship::new("A", "B")],
        );
        doc.activities[1].calendar_id = "nope".to_string();
        let config = AnalysisConfig {
            lenient_calendars: true,
            ..AnalysisConfig::default()
        };
        let net = validate(&doc, &config).unwrap();
        assert_eq!(net.excluded_ids(), vec!["B".to_string()]);
        // The edge into the excluded activity is not traversed.
        assert!(net.succs[net.index.get("A").unwrap() as usize].is_empty());
        assert_eq!(net.topo.len(), 1);
    }

    #[test]
    fn test_disjoint_components() {
        let doc = make_doc(
            vec![
                Activity::new("A", "A", 1),
                Activity::new("B", "B", 1),
                Activity::new("X", "X", 1),
                Activity::new("Y", "Y", 1),
            ],
            vec![Relationship::new("A", "B"), Relationship::new("X", "Y")],
        );
        let net = validate(&doc, &AnalysisConfig::default()).unwrap();
        assert_eq!(net.component_count, 2);
        let a = net.index.get("A").unwrap() as usize;
        let b = net.index.get("B").unwrap() as usize;
        let x = net.index.get("X").unwrap() as usize;
        assert_eq!(net.components[a], net.components[b]);
        assert_ne!(net.components[a], net.components[x]);
    }
}
