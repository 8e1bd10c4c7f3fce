use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a caregiver's program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramStatus {
    Active,
    Paused,
    /// Terminal until an explicit restart
    Terminated,
    /// Terminal: the final day has been completed
    Completed,
}

impl ProgramStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramStatus::Active => "active",
            ProgramStatus::Paused => "paused",
            ProgramStatus::Terminated => "terminated",
            ProgramStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgramStatus::Terminated | ProgramStatus::Completed)
    }
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgramStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProgramStatus::Active),
            "paused" => Ok(ProgramStatus::Paused),
            "terminated" => Ok(ProgramStatus::Terminated),
            "completed" => Ok(ProgramStatus::Completed),
            other => Err(format!("Unknown program status: {}", other)),
        }
    }
}

/// Why the current day cannot be started right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    ProgramPaused,
    ProgramTerminated,
    ProgramCompleted,
    PreviousDayIncomplete,
    TimeDelay,
    OutsideAllowedHours,
    /// Set directly by the `pause` action
    AdminPause,
    /// Set directly by the `terminate` action
    AdminTerminated,
}

impl BlockedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockedReason::ProgramPaused => "program_paused",
            BlockedReason::ProgramTerminated => "program_terminated",
            BlockedReason::ProgramCompleted => "program_completed",
            BlockedReason::PreviousDayIncomplete => "previous_day_incomplete",
            BlockedReason::TimeDelay => "time_delay",
            BlockedReason::OutsideAllowedHours => "outside_allowed_hours",
            BlockedReason::AdminPause => "admin_pause",
            BlockedReason::AdminTerminated => "admin_terminated",
        }
    }
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockedReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "program_paused" => Ok(BlockedReason::ProgramPaused),
            "program_terminated" => Ok(BlockedReason::ProgramTerminated),
            "program_completed" => Ok(BlockedReason::ProgramCompleted),
            "previous_day_incomplete" => Ok(BlockedReason::PreviousDayIncomplete),
            "time_delay" => Ok(BlockedReason::TimeDelay),
            "outside_allowed_hours" => Ok(BlockedReason::OutsideAllowedHours),
            "admin_pause" => Ok(BlockedReason::AdminPause),
            "admin_terminated" => Ok(BlockedReason::AdminTerminated),
            other => Err(format!("Unknown blocked reason: {}", other)),
        }
    }
}

/// Kind of entry in the admin audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminActionKind {
    Pause,
    Resume,
    Terminate,
    ModifyDelay,
    ResetDay,
    ForceUnlock,
    RestartProgram,
    UpdateSettings,
    /// Recorded by the system when the final day is completed
    CompleteProgram,
}

impl AdminActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminActionKind::Pause => "pause",
            AdminActionKind::Resume => "resume",
            AdminActionKind::Terminate => "terminate",
            AdminActionKind::ModifyDelay => "modify_delay",
            AdminActionKind::ResetDay => "reset_day",
            AdminActionKind::ForceUnlock => "force_unlock",
            AdminActionKind::RestartProgram => "restart_program",
            AdminActionKind::UpdateSettings => "update_settings",
            AdminActionKind::CompleteProgram => "complete_program",
        }
    }
}

impl fmt::Display for AdminActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(AdminActionKind::Pause),
            "resume" => Ok(AdminActionKind::Resume),
            "terminate" => Ok(AdminActionKind::Terminate),
            "modify_delay" => Ok(AdminActionKind::ModifyDelay),
            "reset_day" => Ok(AdminActionKind::ResetDay),
            "force_unlock" => Ok(AdminActionKind::ForceUnlock),
            "restart_program" => Ok(AdminActionKind::RestartProgram),
            "update_settings" => Ok(AdminActionKind::UpdateSettings),
            "complete_program" => Ok(AdminActionKind::CompleteProgram),
            other => Err(format!("No such action: {}", other)),
        }
    }
}

/// One completed program day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedDay {
    pub day: u32,
    /// RFC 3339 timestamp
    pub completed_at: String,
    pub notes: Option<String>,
    /// Minutes spent on the day
    pub time_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramProgress {
    pub caregiver_id: String,
    pub current_day: u32,
    pub completed_days: Vec<CompletedDay>,
    /// Minutes, never decreases
    pub total_time_spent: f64,
    pub is_completed: bool,
    pub completed_at: Option<String>,
}

/// Hours of the caregiver-local 24h clock during which a day may be started.
/// `end` is exclusive; `start > end` describes an overnight window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedStartHours {
    pub start: u8,
    pub end: u8,
}

impl Default for AllowedStartHours {
    fn default() -> Self {
        Self { start: 0, end: 24 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSettings {
    pub skip_weekends: bool,
    pub allowed_start_hours: AllowedStartHours,
}

/// Control values captured before and after an admin action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSnapshot {
    pub status: ProgramStatus,
    pub delay_hours: f64,
    #[serde(default)]
    pub custom_settings: CustomSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminActionEntry {
    pub action: AdminActionKind,
    pub admin_id: String,
    pub admin_name: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub reason: Option<String>,
    pub previous_value: ControlSnapshot,
    pub new_value: ControlSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramControl {
    pub caregiver_id: String,
    pub status: ProgramStatus,
    pub delay_hours: f64,
    pub custom_settings: CustomSettings,
    pub admin_actions: Vec<AdminActionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatingOverride {
    pub day: u32,
    pub unlocked_by: String,
    pub unlocked_at: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGating {
    pub caregiver_id: String,
    pub can_start_current_day: bool,
    pub blocked_reason: Option<BlockedReason>,
    pub next_available_at: Option<String>,
    pub current_available_day: u32,
    pub overrides: Vec<GatingOverride>,
    pub last_calculated_at: String,
}

/// Response for the caregiver-facing program state query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStateResponse {
    pub progress: ProgramProgress,
    pub control: ProgramControl,
    pub gating: DayGating,
}

/// Request to complete the caregiver's current day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDayRequest {
    pub notes: Option<String>,
    /// Minutes spent, defaults to 0
    pub time_spent: Option<f64>,
    /// Day the client believes it is completing
    pub day: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDayResponse {
    pub progress: ProgramProgress,
    pub gating: DayGating,
    pub next_day_available_at: Option<String>,
    pub is_completed: bool,
    pub success_message: String,
}

/// Admin request to change a caregiver's program.
///
/// `delay_hours` and `force_unlock_day` stay raw JSON so that a wrongly typed
/// value is reported as a validation error on that field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramControlRequest {
    pub action: Option<String>,
    pub admin_id: Option<String>,
    pub reason: Option<String>,
    pub delay_hours: Option<serde_json::Value>,
    pub force_unlock_day: Option<serde_json::Value>,
    pub custom_settings: Option<CustomSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramControlResponse {
    pub progress: ProgramProgress,
    pub control: ProgramControl,
    pub gating: DayGating,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramControlOverviewEntry {
    pub caregiver_id: String,
    pub progress: ProgramProgress,
    pub control: ProgramControl,
    pub gating: DayGating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramControlOverviewResponse {
    pub caregivers: Vec<ProgramControlOverviewEntry>,
}
