use chrono::{DateTime, Utc};
use shared::{BlockedReason, ProgramStatus};

use crate::backend::storage::VersionConflict;

/// Errors surfaced by the program services.
///
/// Every variant is recoverable by the caller; none of them leaves a partial
/// write behind.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("{message}")]
    Validation { message: String, fields: Vec<String> },

    #[error("No such action: {0}")]
    UnknownAction(String),

    #[error("{message}")]
    StateConflict { message: String, status: ProgramStatus },

    #[error("Day {day} is not available yet ({reason})")]
    GateClosed {
        day: u32,
        reason: BlockedReason,
        next_available_at: Option<DateTime<Utc>>,
    },

    #[error("Day {day} has already been completed")]
    DuplicateCompletion { day: u32 },

    #[error("{0}")]
    NotFound(String),

    #[error("Program state for caregiver {0} was modified concurrently, retry the request")]
    ConcurrentModification(String),

    #[error("Storage unavailable: {0}")]
    Storage(#[source] anyhow::Error),
}

impl ProgramError {
    pub fn validation(message: impl Into<String>, fields: &[&str]) -> Self {
        ProgramError::Validation {
            message: message.into(),
            fields: fields.iter().map(|field| field.to_string()).collect(),
        }
    }

    pub fn conflict(message: impl Into<String>, status: ProgramStatus) -> Self {
        ProgramError::StateConflict {
            message: message.into(),
            status,
        }
    }
}

impl From<anyhow::Error> for ProgramError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<VersionConflict>() {
            Some(conflict) => ProgramError::ConcurrentModification(conflict.caregiver_id.clone()),
            None => ProgramError::Storage(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_maps_to_concurrent_modification() {
        let error = anyhow::Error::new(VersionConflict {
            caregiver_id: "cg-1".to_string(),
            expected: 3,
            found: 4,
        });

        match ProgramError::from(error) {
            ProgramError::ConcurrentModification(id) => assert_eq!(id, "cg-1"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_map_to_storage() {
        let error = anyhow::anyhow!("disk full");
        assert!(matches!(ProgramError::from(error), ProgramError::Storage(_)));
    }
}
