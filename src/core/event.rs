//! Events that drive transitions.

use super::identifier::Identifier;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An event type paired with an opaque payload.
///
/// Events are immutable once constructed: fields are private and only
/// readable through accessors. Every event carries a random id so that
/// notifications and log lines about the same event can be correlated.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Event;
/// use serde_json::json;
///
/// let event = Event::with_payload("deposit".to_string(), json!({ "amount": 25 }));
/// assert_eq!(event.kind(), "deposit");
/// assert_eq!(event.payload()["amount"], 25);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Event<E: Identifier> {
    id: Uuid,
    kind: E,
    #[serde(with = "super::context::value_format")]
    payload: Value,
    created_at: DateTime<Utc>,
}

impl<E: Identifier> Event<E> {
    /// Create an event without payload.
    pub fn new(kind: E) -> Self {
        Self::with_payload(kind, Value::Null)
    }

    /// Create an event carrying a JSON payload.
    pub fn with_payload(kind: E, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Create an event from any serializable payload.
    pub fn try_with<T: Serialize>(kind: E, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::with_payload(kind, serde_json::to_value(payload)?))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &E {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Decode the payload into `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

impl<E: Identifier> From<E> for Event<E> {
    fn from(kind: E) -> Self {
        Self::new(kind)
    }
}
