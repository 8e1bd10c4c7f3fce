//! Domain-level command and result types.
//!
//! The REST layer maps the public DTOs from the `shared` crate to these
//! internal types; services only ever see validated domain values.

pub mod program_control {
    use crate::backend::domain::models::{AdminIdentity, ProgramState};
    use shared::{AdminActionKind, CustomSettings};

    /// Raw admin request, validated by `ControlService::apply_action`.
    #[derive(Debug, Clone, Default)]
    pub struct ProgramControlCommand {
        pub caregiver_id: String,
        pub action: Option<String>,
        /// Resolved by the caller; `None` is rejected before any lookup
        pub admin: Option<AdminIdentity>,
        pub reason: Option<String>,
        pub delay_hours: Option<f64>,
        pub force_unlock_day: Option<i64>,
        pub custom_settings: Option<CustomSettings>,
    }

    /// A validated admin action with its parameters
    #[derive(Debug, Clone, PartialEq)]
    pub enum ControlAction {
        Pause,
        Resume,
        Terminate,
        ModifyDelay { delay_hours: f64 },
        ResetDay,
        ForceUnlock { day: u32 },
        RestartProgram,
        UpdateSettings { settings: CustomSettings },
    }

    impl ControlAction {
        pub fn kind(&self) -> AdminActionKind {
            match self {
                ControlAction::Pause => AdminActionKind::Pause,
                ControlAction::Resume => AdminActionKind::Resume,
                ControlAction::Terminate => AdminActionKind::Terminate,
                ControlAction::ModifyDelay { .. } => AdminActionKind::ModifyDelay,
                ControlAction::ResetDay => AdminActionKind::ResetDay,
                ControlAction::ForceUnlock { .. } => AdminActionKind::ForceUnlock,
                ControlAction::RestartProgram => AdminActionKind::RestartProgram,
                ControlAction::UpdateSettings { .. } => AdminActionKind::UpdateSettings,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct ProgramControlResult {
        pub state: ProgramState,
        pub success_message: String,
    }

    #[derive(Debug, Clone)]
    pub struct ProgramOverviewEntry {
        pub caregiver_id: String,
        pub state: ProgramState,
    }
}

pub mod progress {
    use crate::backend::domain::models::ProgramState;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone, Default)]
    pub struct CompleteDayCommand {
        pub caregiver_id: String,
        pub notes: Option<String>,
        /// Minutes, defaults to 0
        pub time_spent: Option<f64>,
        /// Day the caller believes it is completing
        pub day: Option<u32>,
    }

    #[derive(Debug, Clone)]
    pub struct CompleteDayResult {
        pub state: ProgramState,
        pub next_day_available_at: Option<DateTime<Utc>>,
        pub is_completed: bool,
        pub success_message: String,
    }
}
