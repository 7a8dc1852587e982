//! Transition journal.
//!
//! Keeps an ordered record of every committed transition of a machine,
//! independent of the per-composite history used for re-entry.

use super::identifier::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// Record of a single committed transition.
///
/// `source` and `target` are the active leaf states before and after the
/// step, which may differ from the declared transition endpoints when the
/// transition leaves or enters a composite state.
///
/// # Example
///
/// ```rust
/// use statecraft::core::TransitionRecord;
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let record = TransitionRecord {
///     sequence: 1,
///     source: "Idle".to_string(),
///     target: "Running".to_string(),
///     event: Some("start".to_string()),
///     event_id: Some(Uuid::new_v4()),
///     transition: None,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.sequence, 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionRecord<S: Identifier, E: Identifier> {
    /// Position of the step in the machine's lifetime, starting at 1
    pub sequence: u64,
    /// Active leaf state before the transition
    pub source: S,
    /// Active leaf state after the transition
    pub target: S,
    /// Event type that triggered the transition; `None` for completions
    pub event: Option<E>,
    /// Id of the triggering event
    pub event_id: Option<Uuid>,
    /// Name of the declared transition, if it has one
    pub transition: Option<String>,
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,
}

/// Ordered, optionally bounded journal of transitions.
///
/// With a limit, the oldest records are evicted first; `total()` still counts
/// every record ever appended.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{TransitionLog, TransitionRecord};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let mut log = TransitionLog::new();
/// for (i, (from, to)) in [("A", "B"), ("B", "C")].into_iter().enumerate() {
///     log.record(TransitionRecord {
///         sequence: i as u64 + 1,
///         source: from.to_string(),
///         target: to.to_string(),
///         event: Some("next".to_string()),
///         event_id: Some(Uuid::new_v4()),
///         transition: None,
///         timestamp: Utc::now(),
///     });
/// }
///
/// let path: Vec<&str> = log.path().into_iter().map(String::as_str).collect();
/// assert_eq!(path, vec!["A", "B", "C"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionLog<S: Identifier, E: Identifier> {
    records: VecDeque<TransitionRecord<S, E>>,
    limit: Option<usize>,
    total: u64,
}

impl<S: Identifier, E: Identifier> Default for TransitionLog<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Identifier, E: Identifier> TransitionLog<S, E> {
    /// Create an unbounded journal.
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
            limit: None,
            total: 0,
        }
    }

    /// Create a journal that keeps at most `limit` records.
    pub fn bounded(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(1024)),
            limit: Some(limit),
            total: 0,
        }
    }

    /// Append a record, evicting the oldest one when the limit is reached.
    pub fn record(&mut self, record: TransitionRecord<S, E>) {
        if let Some(limit) = self.limit {
            if limit == 0 {
                self.total += 1;
                return;
            }
            while self.records.len() >= limit {
                self.records.pop_front();
            }
        }
        self.records.push_back(record);
        self.total += 1;
    }

    /// States traversed by the retained records: the source of the first
    /// record, then the target of each record.
    pub fn path(&self) -> Vec<&S> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.front() {
            path.push(&first.source);
        }
        for record in &self.records {
            path.push(&record.target);
        }
        path
    }

    /// Time between the first and last retained record.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn records(&self) -> impl DoubleEndedIterator<Item = &TransitionRecord<S, E>> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord<S, E>> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records ever appended, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sequence: u64, from: &str, to: &str, timestamp: DateTime<Utc>) -> TransitionRecord<String, String> {
        TransitionRecord {
            sequence,
            source: from.to_string(),
            target: to.to_string(),
            event: Some("next".to_string()),
            event_id: Some(Uuid::new_v4()),
            transition: None,
            timestamp,
        }
    }

    #[test]
    fn new_log_is_empty() {
        let log: TransitionLog<String, String> = TransitionLog::new();
        assert!(log.is_empty());
        assert!(log.path().is_empty());
        assert!(log.duration().is_none());
        assert_eq!(log.total(), 0);
    }

    #[test]
    fn path_returns_state_sequence() {
        let mut log = TransitionLog::new();
        log.record(record(1, "Initial", "Processing", Utc::now()));
        log.record(record(2, "Processing", "Complete", Utc::now()));

        let path: Vec<&str> = log.path().into_iter().map(String::as_str).collect();
        assert_eq!(path, vec!["Initial", "Processing", "Complete"]);
    }

    #[test]
    fn bounded_log_evicts_oldest() {
        let mut log = TransitionLog::bounded(2);
        log.record(record(1, "A", "B", Utc::now()));
        log.record(record(2, "B", "C", Utc::now()));
        log.record(record(3, "C", "D", Utc::now()));

        assert_eq!(log.len(), 2);
        assert_eq!(log.total(), 3);
        let sequences: Vec<u64> = log.records().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
    }

    #[test]
    fn zero_limit_keeps_nothing_but_counts() {
        let mut log = TransitionLog::bounded(0);
        log.record(record(1, "A", "B", Utc::now()));

        assert!(log.is_empty());
        assert_eq!(log.total(), 1);
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let start = Utc::now();
        let mut log = TransitionLog::new();
        log.record(record(1, "A", "B", start));
        log.record(record(2, "B", "C", start + chrono::Duration::milliseconds(25)));

        assert_eq!(log.duration(), Some(Duration::from_millis(25)));
    }

    #[test]
    fn single_record_has_duration_zero() {
        let mut log = TransitionLog::new();
        log.record(record(1, "A", "B", Utc::now()));

        assert_eq!(log.duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn log_serializes_correctly() {
        let mut log = TransitionLog::bounded(4);
        log.record(record(1, "A", "B", Utc::now()));

        let json = serde_json::to_string(&log).unwrap();
        let restored: TransitionLog<String, String> = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.len(), 1);
        assert_eq!(restored.limit(), Some(4));
        assert_eq!(restored.last(), log.last());
    }
}
