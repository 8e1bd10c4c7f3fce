use chrono::{DateTime, Utc};
use shared::BlockedReason;

/// Output of the gate calculator
#[derive(Debug, Clone, PartialEq)]
pub struct GateResult {
    pub can_start_current_day: bool,
    /// `None` exactly when the gate is open
    pub blocked_reason: Option<BlockedReason>,
    pub next_available_at: Option<DateTime<Utc>>,
    pub current_available_day: u32,
    pub calculated_at: DateTime<Utc>,
}

impl GateResult {
    pub fn open(day: u32, available_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            can_start_current_day: true,
            blocked_reason: None,
            next_available_at: Some(available_at),
            current_available_day: day,
            calculated_at: now,
        }
    }

    pub fn closed(
        day: u32,
        reason: BlockedReason,
        next_available_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            can_start_current_day: false,
            blocked_reason: Some(reason),
            next_available_at,
            current_available_day: day,
            calculated_at: now,
        }
    }
}

/// Admin-issued unlock of one specific day
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRecord {
    pub day: u32,
    pub unlocked_by: String,
    pub unlocked_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Cached gate plus the overrides it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct GatingRecord {
    pub caregiver_id: String,
    pub gate: GateResult,
    /// At most one entry per day
    pub overrides: Vec<OverrideRecord>,
}

impl GatingRecord {
    pub fn has_override(&self, day: u32) -> bool {
        self.overrides.iter().any(|entry| entry.day == day)
    }
}
