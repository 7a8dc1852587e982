//! Errors raised while saving or restoring a machine.

use thiserror::Error;

/// Errors of checkpoint encoding and [`Machine::restore`](crate::engine::Machine::restore).
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// JSON or bincode encoding of a checkpoint failed
    #[error("Cannot encode checkpoint: {0}")]
    SerializationFailed(String),

    /// Bytes or text are not a checkpoint
    #[error("Cannot decode checkpoint: {0}")]
    DeserializationFailed(String),

    #[error("Checkpoint format {found} is not readable by format {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Checkpoint was taken from a machine built on a different model
    #[error("Checkpoint belongs to model {found:?}, not {expected:?}")]
    ModelMismatch {
        expected: Option<String>,
        found: Option<String>,
    },

    /// Active state or history does not fit the model
    #[error("Checkpoint does not fit the model: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_checkpoint_problem() {
        let err = CheckpointError::UnsupportedVersion {
            found: 7,
            supported: 1,
        };
        assert_eq!(err.to_string(), "Checkpoint format 7 is not readable by format 1");

        let err = CheckpointError::ValidationFailed("unknown state 'Gone'".into());
        assert_eq!(err.to_string(), "Checkpoint does not fit the model: unknown state 'Gone'");
    }
}
