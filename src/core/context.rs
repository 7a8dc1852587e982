//! Extended state carried alongside the active state.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by typed context access.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context value '{key}' could not be read as the requested type: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Context value '{key}' could not be serialized: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Mutable key-value extended state of a machine.
///
/// Values are stored as JSON so that guards and actions written by different
/// parties can share data without agreeing on a Rust type, and so the whole
/// context can be snapshotted into notifications and checkpoints.
///
/// Keys iterate in sorted order, which keeps snapshots deterministic.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Context;
///
/// let mut ctx = Context::new().with("retries", 0u32);
/// let retries: u32 = ctx.get("retries").unwrap().unwrap_or_default();
/// ctx.set("retries", retries + 1).unwrap();
///
/// assert_eq!(ctx.get::<u32>("retries").unwrap(), Some(1));
/// assert!(ctx.get::<u32>("missing").unwrap().is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a plain JSON value, used when preparing an
    /// initial context.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder-style insert of any serializable value.
    pub fn try_with<T: Serialize>(
        mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Self, ContextError> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Read a value and decode it into `T`.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ContextError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|source| ContextError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Read the raw JSON value.
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Serialize `value` and store it under `key`, replacing any previous value.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<(), ContextError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| ContextError::Encode {
            key: key.clone(),
            source,
        })?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Store a raw JSON value.
    pub fn set_raw(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Remove a key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Context {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_map(self.values.iter().map(|(k, v)| (k, StoredRef(v))))
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = BTreeMap::<String, Stored>::deserialize(deserializer)?;
        Ok(Self {
            values: values.into_iter().map(|(k, v)| (k, v.0)).collect(),
        })
    }
}

struct StoredRef<'a>(&'a Value);

impl Serialize for StoredRef<'_> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        value_format::serialize(self.0, serializer)
    }
}

#[derive(Deserialize)]
struct Stored(#[serde(with = "value_format")] Value);

/// Serde adapter for JSON values inside other formats.
///
/// Self-describing formats receive the value unchanged. Compact formats such
/// as bincode cannot decode a `Value` on their own, so there it travels as a
/// JSON string.
pub(crate) mod value_format {
    use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Value, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            value.serialize(serializer)
        } else {
            let text = serde_json::to_string(value).map_err(ser::Error::custom)?;
            serializer.serialize_str(&text)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        if deserializer.is_human_readable() {
            Value::deserialize(deserializer)
        } else {
            let text = String::deserialize(deserializer)?;
            serde_json::from_str(&text).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        total: f64,
    }

    #[test]
    fn missing_key_reads_none() {
        let ctx = Context::new();
        assert_eq!(ctx.get::<String>("absent").unwrap(), None);
    }

    #[test]
    fn typed_round_trip_through_context() {
        let mut ctx = Context::new();
        ctx.set("order", Order { id: 7, total: 12.5 }).unwrap();

        let order: Order = ctx.get("order").unwrap().unwrap();
        assert_eq!(order, Order { id: 7, total: 12.5 });
    }

    #[test]
    fn wrong_type_reports_key() {
        let ctx = Context::new().with("count", "not a number");

        let err = ctx.get::<u32>("count").unwrap_err();
        assert!(matches!(err, ContextError::Decode { ref key, .. } if key == "count"));
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn unserializable_value_is_an_error_not_null() {
        let mut scores = std::collections::HashMap::new();
        scores.insert((1, 2), 3);

        let err = Context::new().try_with("scores", &scores).unwrap_err();
        assert!(matches!(err, ContextError::Encode { ref key, .. } if key == "scores"));

        let mut ctx = Context::new();
        assert!(ctx.set("scores", &scores).is_err());
        assert!(!ctx.contains("scores"));
    }

    #[test]
    fn set_replaces_previous_value() {
        let mut ctx = Context::new().with("x", 1);
        ctx.set("x", 2).unwrap();
        assert_eq!(ctx.get_raw("x"), Some(&json!(2)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn iteration_is_sorted_by_key() {
        let ctx = Context::new().with("b", 2).with("a", 1).with("c", 3);
        let keys: Vec<&str> = ctx.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_and_contains() {
        let mut ctx = Context::new().with("flag", true);
        assert!(ctx.contains("flag"));
        assert_eq!(ctx.remove("flag"), Some(json!(true)));
        assert!(!ctx.contains("flag"));
        assert!(ctx.is_empty());
    }

    #[test]
    fn context_serializes_as_plain_object() {
        let ctx = Context::new().with("a", 1);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, json!({ "a": 1 }));
    }

    #[test]
    fn context_survives_binary_encoding() {
        let ctx = Context::new()
            .try_with("order", Order { id: 3, total: 9.75 })
            .unwrap()
            .with("tags", vec!["a", "b"]);

        let bytes = bincode::serialize(&ctx).unwrap();
        let back: Context = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn context_deserializes_from_json_object() {
        let ctx: Context = serde_json::from_value(json!({ "n": 5, "s": "x" })).unwrap();
        assert_eq!(ctx.get::<u32>("n").unwrap(), Some(5));
        assert_eq!(ctx.get::<String>("s").unwrap().as_deref(), Some("x"));
    }
}
