//! Checkpoint and resume functionality for machines.
//!
//! A checkpoint captures the runtime data of one machine: active leaf,
//! composite history, context, journal, queued events and configuration.
//! Guards and actions live in the model and are not serialized, so a
//! checkpoint can only be restored against a model with the same states.
//!
//! Checkpoints encode to JSON for inspection and to bincode for compact
//! storage. Where they are stored is up to the caller.

use crate::config::MachineConfig;
use crate::core::{Context, Event, Identifier, TransitionLog};
use crate::engine::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot of a machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Checkpoint<S: Identifier, E: Identifier> {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// Id of the machine the checkpoint was taken from
    pub machine_id: Uuid,

    /// Name of the model the machine runs
    pub model_name: Option<String>,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    pub status: Status,

    /// Active leaf state
    pub active: S,

    /// Last active child of each composite visited, as (composite, child)
    pub history: Vec<(S, S)>,

    pub context: Context,

    pub journal: TransitionLog<S, E>,

    /// Events queued but not yet processed, in queue order
    pub pending: Vec<Event<E>>,

    /// Number of transitions committed so far
    pub sequence: u64,

    pub config: MachineConfig,
}

impl<S: Identifier, E: Identifier> Checkpoint<S, E> {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    pub(crate) fn check_version(&self) -> Result<(), CheckpointError> {
        if self.version == CHECKPOINT_VERSION {
            Ok(())
        } else {
            Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            })
        }
    }
}
