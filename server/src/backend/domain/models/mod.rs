pub mod control;
pub mod gating;
pub mod progress;

pub use control::*;
pub use gating::*;
pub use progress::*;

use chrono::{FixedOffset, Offset, Utc};

/// Program-wide scalar configuration handed to the domain services
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgramSettings {
    /// Final day number of the program
    pub program_days: u32,
    /// Delay applied to lazily created control records
    pub default_delay_hours: f64,
    /// Offset of the caregiver-local clock used for allowed hours and weekends
    pub local_offset: FixedOffset,
}

impl Default for ProgramSettings {
    fn default() -> Self {
        Self {
            program_days: 10,
            default_delay_hours: 24.0,
            local_offset: Utc.fix(),
        }
    }
}

/// The persisted triple for one caregiver
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramState {
    pub progress: ProgressRecord,
    pub control: ControlRecord,
    pub gating: GatingRecord,
    /// Optimistic concurrency token, 0 until first saved
    pub version: i64,
}

/// Resolved identity of the administrator performing an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub admin_id: String,
    pub admin_name: String,
}

impl AdminIdentity {
    pub fn system() -> Self {
        Self {
            admin_id: "system".to_string(),
            admin_name: "System".to_string(),
        }
    }
}

/// Caregiver as known to the surrounding application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaregiverRecord {
    pub id: String,
    pub name: String,
    pub assigned_patient_id: Option<String>,
}

impl CaregiverRecord {
    pub fn has_assigned_patient(&self) -> bool {
        self.assigned_patient_id
            .as_deref()
            .map(|patient| !patient.trim().is_empty())
            .unwrap_or(false)
    }
}
