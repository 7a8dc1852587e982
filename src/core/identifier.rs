//! Identifier trait shared by state ids and event types.
//!
//! States and events are referred to by value. Anything that can be hashed,
//! compared, cloned and serialized can act as an identifier, so plain
//! `String`s work as well as enums generated by [`state_enum!`](crate::state_enum).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for state ids and event type ids.
///
/// All methods are pure. Identifiers are immutable tokens; the state machine
/// stores them in its arena and compares them on every lookup.
///
/// # Required Traits
///
/// - `Clone`: identifiers are copied into records and notifications
/// - `Eq` + `Hash`: identifiers key the model's lookup tables
/// - `Debug`: identifiers show up in errors and logs
/// - `Serialize` + `DeserializeOwned`: identifiers are part of checkpoints
///
/// # Example
///
/// ```rust
/// use statecraft::core::Identifier;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Door {
///     Open,
///     Closed,
/// }
///
/// impl Identifier for Door {
///     fn name(&self) -> &str {
///         match self {
///             Self::Open => "Open",
///             Self::Closed => "Closed",
///         }
///     }
/// }
///
/// assert_eq!(Door::Open.name(), "Open");
/// assert_eq!("Closed".to_string().name(), "Closed");
/// ```
pub trait Identifier:
    Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Get the identifier's name for display/logging.
    fn name(&self) -> &str;
}

impl Identifier for String {
    fn name(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Running,
        Done,
    }

    impl Identifier for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "Idle",
                Self::Running => "Running",
                Self::Done => "Done",
            }
        }
    }

    #[test]
    fn enum_name_returns_variant() {
        assert_eq!(TestState::Idle.name(), "Idle");
        assert_eq!(TestState::Running.name(), "Running");
        assert_eq!(TestState::Done.name(), "Done");
    }

    #[test]
    fn string_name_is_the_string() {
        let id = "Running".to_string();
        assert_eq!(id.name(), "Running");
    }

    #[test]
    fn identifier_serializes_correctly() {
        let state = TestState::Running;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: TestState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }

    #[test]
    fn identifier_is_hashable() {
        let mut set = std::collections::HashSet::new();
        set.insert(TestState::Idle);
        set.insert(TestState::Idle);
        set.insert(TestState::Done);
        assert_eq!(set.len(), 2);
    }
}
