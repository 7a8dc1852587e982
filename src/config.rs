//! Runtime and resolution settings.
//!
//! [`MachineConfig`] governs one running machine; [`Resolution`] is frozen
//! into a model at build time because it decides which transition wins.

use serde::{Deserialize, Serialize};

/// What to do with an event that no transition accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledPolicy {
    /// Notify listeners and discard the event
    #[default]
    Drop,

    /// Notify listeners and return `MachineError::UnhandledEvent`
    Strict,
}

/// Which priority value is tried first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    #[default]
    HighestFirst,
    LowestFirst,
}

/// How transitions with equal priority are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    FirstDeclared,
    LastDeclared,
}

/// Transition selection order for a (source, event) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub priority: PriorityOrder,
    pub ties: TieBreak,
}

impl Resolution {
    /// Compare two candidates given as (priority, declaration order).
    /// `Less` means `a` is tried before `b`.
    pub(crate) fn compare(&self, a: (i32, usize), b: (i32, usize)) -> std::cmp::Ordering {
        let by_priority = match self.priority {
            PriorityOrder::HighestFirst => b.0.cmp(&a.0),
            PriorityOrder::LowestFirst => a.0.cmp(&b.0),
        };
        by_priority.then_with(|| match self.ties {
            TieBreak::FirstDeclared => a.1.cmp(&b.1),
            TieBreak::LastDeclared => b.1.cmp(&a.1),
        })
    }
}

/// Settings for one machine.
///
/// # Example
///
/// ```rust
/// use statecraft::config::{MachineConfig, UnhandledPolicy};
///
/// let config = MachineConfig::from_json(r#"{ "unhandled": "strict", "queue_capacity": 64 }"#).unwrap();
/// assert_eq!(config.unhandled, UnhandledPolicy::Strict);
/// assert_eq!(config.queue_capacity, Some(64));
/// assert!(config.stop_on_final);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub unhandled: UnhandledPolicy,

    /// Stop once a final state is entered from which nothing can leave
    pub stop_on_final: bool,

    /// Maximum number of queued events; `None` means unbounded
    pub queue_capacity: Option<usize>,

    /// Maximum events processed by one drain of the queue
    pub max_steps_per_run: usize,

    /// Maximum transition records kept in the journal; `None` keeps all
    pub journal_limit: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            unhandled: UnhandledPolicy::Drop,
            stop_on_final: true,
            queue_capacity: None,
            max_steps_per_run: 10_000,
            journal_limit: None,
        }
    }
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn unhandled(mut self, policy: UnhandledPolicy) -> Self {
        self.unhandled = policy;
        self
    }

    pub fn strict(self) -> Self {
        self.unhandled(UnhandledPolicy::Strict)
    }

    pub fn stop_on_final(mut self, stop: bool) -> Self {
        self.stop_on_final = stop;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn max_steps_per_run(mut self, steps: usize) -> Self {
        self.max_steps_per_run = steps;
        self
    }

    pub fn journal_limit(mut self, limit: usize) -> Self {
        self.journal_limit = Some(limit);
        self
    }
}
