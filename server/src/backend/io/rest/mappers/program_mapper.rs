use shared::{
    AdminActionEntry, CompleteDayResponse, CompletedDay, DayGating, GatingOverride, ProgramControl,
    ProgramControlOverviewEntry, ProgramControlOverviewResponse, ProgramControlResponse,
    ProgramProgress, ProgramStateResponse,
};

use crate::backend::domain::commands::program_control::{ProgramControlResult, ProgramOverviewEntry};
use crate::backend::domain::commands::progress::CompleteDayResult;
use crate::backend::domain::models::{ControlRecord, GatingRecord, ProgramState, ProgressRecord};

/// Converts domain program records into the shared DTOs, timestamps as RFC 3339
pub struct ProgramMapper;

impl ProgramMapper {
    pub fn to_progress_dto(progress: ProgressRecord) -> ProgramProgress {
        ProgramProgress {
            caregiver_id: progress.caregiver_id,
            current_day: progress.current_day,
            completed_days: progress
                .completed_days
                .into_iter()
                .map(|entry| CompletedDay {
                    day: entry.day,
                    completed_at: entry.completed_at.to_rfc3339(),
                    notes: entry.notes,
                    time_spent: entry.time_spent,
                })
                .collect(),
            total_time_spent: progress.total_time_spent,
            is_completed: progress.is_completed,
            completed_at: progress.completed_at.map(|at| at.to_rfc3339()),
        }
    }

    pub fn to_control_dto(control: ControlRecord) -> ProgramControl {
        ProgramControl {
            caregiver_id: control.caregiver_id,
            status: control.status,
            delay_hours: control.delay_hours,
            custom_settings: control.custom_settings,
            admin_actions: control
                .admin_actions
                .into_iter()
                .map(|entry| AdminActionEntry {
                    action: entry.action,
                    admin_id: entry.admin_id,
                    admin_name: entry.admin_name,
                    timestamp: entry.timestamp.to_rfc3339(),
                    reason: entry.reason,
                    previous_value: entry.previous_value,
                    new_value: entry.new_value,
                })
                .collect(),
        }
    }

    pub fn to_gating_dto(gating: GatingRecord) -> DayGating {
        DayGating {
            caregiver_id: gating.caregiver_id,
            can_start_current_day: gating.gate.can_start_current_day,
            blocked_reason: gating.gate.blocked_reason,
            next_available_at: gating.gate.next_available_at.map(|at| at.to_rfc3339()),
            current_available_day: gating.gate.current_available_day,
            overrides: gating
                .overrides
                .into_iter()
                .map(|entry| GatingOverride {
                    day: entry.day,
                    unlocked_by: entry.unlocked_by,
                    unlocked_at: entry.unlocked_at.to_rfc3339(),
                    reason: entry.reason,
                })
                .collect(),
            last_calculated_at: gating.gate.calculated_at.to_rfc3339(),
        }
    }

    pub fn to_state_response(state: ProgramState) -> ProgramStateResponse {
        ProgramStateResponse {
            progress: Self::to_progress_dto(state.progress),
            control: Self::to_control_dto(state.control),
            gating: Self::to_gating_dto(state.gating),
        }
    }

    pub fn to_complete_day_response(result: CompleteDayResult) -> CompleteDayResponse {
        CompleteDayResponse {
            progress: Self::to_progress_dto(result.state.progress),
            gating: Self::to_gating_dto(result.state.gating),
            next_day_available_at: result.next_day_available_at.map(|at| at.to_rfc3339()),
            is_completed: result.is_completed,
            success_message: result.success_message,
        }
    }

    pub fn to_control_response(result: ProgramControlResult) -> ProgramControlResponse {
        ProgramControlResponse {
            progress: Self::to_progress_dto(result.state.progress),
            control: Self::to_control_dto(result.state.control),
            gating: Self::to_gating_dto(result.state.gating),
            success_message: result.success_message,
        }
    }

    pub fn to_overview_response(entries: Vec<ProgramOverviewEntry>) -> ProgramControlOverviewResponse {
        ProgramControlOverviewResponse {
            caregivers: entries
                .into_iter()
                .map(|entry| ProgramControlOverviewEntry {
                    caregiver_id: entry.caregiver_id,
                    progress: Self::to_progress_dto(entry.state.progress),
                    control: Self::to_control_dto(entry.state.control),
                    gating: Self::to_gating_dto(entry.state.gating),
                })
                .collect(),
        }
    }
}
