use chrono::{DateTime, Utc};
use shared::{AdminActionKind, ControlSnapshot, CustomSettings, ProgramStatus};

/// One immutable entry of the admin audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct AdminActionRecord {
    pub action: AdminActionKind,
    pub admin_id: String,
    pub admin_name: String,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
    pub previous_value: ControlSnapshot,
    pub new_value: ControlSnapshot,
}

/// Per-caregiver administrative state
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRecord {
    pub caregiver_id: String,
    pub status: ProgramStatus,
    pub delay_hours: f64,
    pub custom_settings: CustomSettings,
    /// Append-only
    pub admin_actions: Vec<AdminActionRecord>,
}

impl ControlRecord {
    pub fn new(caregiver_id: &str, delay_hours: f64) -> Self {
        Self {
            caregiver_id: caregiver_id.to_string(),
            status: ProgramStatus::Active,
            delay_hours,
            custom_settings: CustomSettings::default(),
            admin_actions: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            status: self.status,
            delay_hours: self.delay_hours,
            custom_settings: self.custom_settings,
        }
    }
}
