//! Admin-facing program control.
//!
//! `apply_action` validates the request fully before taking the caregiver
//! lock, so a rejected action never touches stored state. Every accepted
//! action appends exactly one audit entry.

use chrono::{DateTime, Utc};
use shared::{AdminActionKind, BlockedReason, CustomSettings, ProgramStatus};
use tracing::{info, warn};

use super::commands::program_control::{
    ControlAction, ProgramControlCommand, ProgramControlResult, ProgramOverviewEntry,
};
use super::errors::ProgramError;
use super::models::{AdminActionRecord, AdminIdentity, GateResult, OverrideRecord, ProgramState};
use super::program_context::ProgramContext;

#[derive(Clone)]
pub struct ControlService {
    context: ProgramContext,
}

impl ControlService {
    pub fn new(context: ProgramContext) -> Self {
        Self { context }
    }

    /// All caregivers with an assigned patient, each with a freshly computed gate
    pub async fn get_overview(&self) -> Result<Vec<ProgramOverviewEntry>, ProgramError> {
        info!("Building program control overview");
        let caregivers = self.context.caregivers().list_caregivers_with_patient().await?;

        let mut entries = Vec::with_capacity(caregivers.len());
        for caregiver in caregivers {
            let state = self.context.current_state(&caregiver.id).await?;
            entries.push(ProgramOverviewEntry {
                caregiver_id: caregiver.id,
                state,
            });
        }

        info!("Program control overview has {} caregivers", entries.len());
        Ok(entries)
    }

    /// One caregiver's triple including the full audit trail
    pub async fn get_program_control(&self, caregiver_id: &str) -> Result<ProgramState, ProgramError> {
        info!("Getting program control for caregiver {}", caregiver_id);
        self.context.require_caregiver(caregiver_id).await?;
        self.context.current_state(caregiver_id).await
    }

    pub async fn apply_action(
        &self,
        command: ProgramControlCommand,
    ) -> Result<ProgramControlResult, ProgramError> {
        let caregiver_id = command.caregiver_id.clone();

        let Some(admin) = command.admin.clone() else {
            warn!("Rejected program control for caregiver {}: no admin identity", caregiver_id);
            return Err(ProgramError::validation("Admin identity is required", &["adminId"]));
        };
        let action = self.parse_action(&command)?;
        info!(
            "Admin {} applying {} to caregiver {}",
            admin.admin_id,
            action.kind(),
            caregiver_id
        );

        self.context.require_caregiver(&caregiver_id).await?;

        let _guard = self.context.locks().acquire(&caregiver_id).await;
        let now = self.context.now();
        let (mut state, _) = self.context.load_state(&caregiver_id, now).await?;

        check_precondition(&action, state.control.status)?;

        let previous_value = state.control.snapshot();
        self.mutate(&mut state, &action, &admin, command.reason.as_deref(), now);
        state.control.admin_actions.push(AdminActionRecord {
            action: action.kind(),
            admin_id: admin.admin_id.clone(),
            admin_name: admin.admin_name.clone(),
            timestamp: now,
            reason: command.reason.clone(),
            previous_value,
            new_value: state.control.snapshot(),
        });

        self.context.save(&mut state).await?;

        info!(
            "Applied {} to caregiver {}: status {}, day {}",
            action.kind(),
            caregiver_id,
            state.control.status,
            state.progress.current_day
        );

        Ok(ProgramControlResult {
            success_message: success_message(&action),
            state,
        })
    }

    /// Turn the raw command into a validated action, before any lookup or lock
    fn parse_action(&self, command: &ProgramControlCommand) -> Result<ControlAction, ProgramError> {
        let name = command.action.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(ProgramError::validation("Action is required", &["action"]));
        }

        let kind = name
            .parse::<AdminActionKind>()
            .map_err(|_| ProgramError::UnknownAction(name.to_string()))?;

        let action = match kind {
            AdminActionKind::Pause => ControlAction::Pause,
            AdminActionKind::Resume => ControlAction::Resume,
            AdminActionKind::Terminate => ControlAction::Terminate,
            AdminActionKind::ResetDay => ControlAction::ResetDay,
            AdminActionKind::RestartProgram => ControlAction::RestartProgram,
            AdminActionKind::ModifyDelay => {
                let delay_hours = command.delay_hours.ok_or_else(|| {
                    ProgramError::validation("delayHours is required for modify_delay", &["delayHours"])
                })?;
                if !delay_hours.is_finite() || delay_hours < 0.0 {
                    return Err(ProgramError::validation(
                        "delayHours must be a non-negative number",
                        &["delayHours"],
                    ));
                }
                ControlAction::ModifyDelay { delay_hours }
            }
            AdminActionKind::ForceUnlock => {
                let day = command.force_unlock_day.ok_or_else(|| {
                    ProgramError::validation(
                        "forceUnlockDay is required for force_unlock",
                        &["forceUnlockDay"],
                    )
                })?;
                let program_days = self.context.settings().program_days;
                let day = u32::try_from(day)
                    .ok()
                    .filter(|day| (1..=program_days).contains(day))
                    .ok_or_else(|| {
                        ProgramError::validation(
                            format!("forceUnlockDay must be a day between 1 and {}", program_days),
                            &["forceUnlockDay"],
                        )
                    })?;
                ControlAction::ForceUnlock { day }
            }
            AdminActionKind::UpdateSettings => {
                let settings = command.custom_settings.ok_or_else(|| {
                    ProgramError::validation(
                        "customSettings is required for update_settings",
                        &["customSettings"],
                    )
                })?;
                validate_settings(&settings)?;
                ControlAction::UpdateSettings { settings }
            }
            // Recorded by the system only, never requested by an admin
            AdminActionKind::CompleteProgram => {
                return Err(ProgramError::UnknownAction(name.to_string()))
            }
        };

        Ok(action)
    }

    fn mutate(
        &self,
        state: &mut ProgramState,
        action: &ControlAction,
        admin: &AdminIdentity,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let day = state.progress.current_day;
        match action {
            ControlAction::Pause => {
                state.control.status = ProgramStatus::Paused;
                state.gating.gate = GateResult::closed(day, BlockedReason::AdminPause, None, now);
            }
            ControlAction::Terminate => {
                state.control.status = ProgramStatus::Terminated;
                state.gating.gate = GateResult::closed(day, BlockedReason::AdminTerminated, None, now);
            }
            ControlAction::Resume => {
                state.control.status = ProgramStatus::Active;
                self.context.refresh_gate(state, now);
            }
            ControlAction::ModifyDelay { delay_hours } => {
                state.control.delay_hours = *delay_hours;
                self.context.refresh_gate(state, now);
            }
            ControlAction::ResetDay => {
                if state.progress.remove_completion(day).is_some() {
                    info!("Removed completion of day {} for caregiver {}", day, state.progress.caregiver_id);
                }
                if state.control.status == ProgramStatus::Completed {
                    state.control.status = ProgramStatus::Active;
                    state.progress.is_completed = false;
                    state.progress.completed_at = None;
                }
                self.context.refresh_gate(state, now);
            }
            ControlAction::ForceUnlock { day: unlock_day } => {
                if state.gating.has_override(*unlock_day) {
                    info!(
                        "Day {} already unlocked for caregiver {}",
                        unlock_day, state.progress.caregiver_id
                    );
                } else {
                    state.gating.overrides.push(OverrideRecord {
                        day: *unlock_day,
                        unlocked_by: admin.admin_id.clone(),
                        unlocked_at: now,
                        reason: reason.map(str::to_string),
                    });
                    state.gating.overrides.sort_by_key(|entry| entry.day);
                }
                self.context.refresh_gate(state, now);
            }
            ControlAction::RestartProgram => {
                state.progress.current_day = 1;
                state.progress.completed_days.clear();
                state.progress.is_completed = false;
                state.progress.completed_at = None;
                state.gating.overrides.clear();
                state.control.status = ProgramStatus::Active;
                self.context.refresh_gate(state, now);
            }
            ControlAction::UpdateSettings { settings } => {
                state.control.custom_settings = *settings;
                self.context.refresh_gate(state, now);
            }
        }
    }
}

fn check_precondition(action: &ControlAction, status: ProgramStatus) -> Result<(), ProgramError> {
    let allowed = match action {
        ControlAction::Pause => status == ProgramStatus::Active,
        ControlAction::Resume => status == ProgramStatus::Paused,
        ControlAction::Terminate => !status.is_terminal(),
        ControlAction::ResetDay => status != ProgramStatus::Terminated,
        ControlAction::ModifyDelay { .. }
        | ControlAction::ForceUnlock { .. }
        | ControlAction::RestartProgram
        | ControlAction::UpdateSettings { .. } => true,
    };

    if allowed {
        Ok(())
    } else {
        warn!("Rejected {}: program is currently {}", action.kind(), status);
        Err(ProgramError::conflict(
            format!("Cannot {} program: program is currently {}", action.kind(), status),
            status,
        ))
    }
}

/// Hours are 0-23 for the start and 0-24 for the exclusive end; an empty window is rejected
fn validate_settings(settings: &CustomSettings) -> Result<(), ProgramError> {
    let hours = settings.allowed_start_hours;
    let mut fields = Vec::new();
    if hours.start > 23 {
        fields.push("customSettings.allowedStartHours.start");
    }
    if hours.end > 24 {
        fields.push("customSettings.allowedStartHours.end");
    }
    if !fields.is_empty() {
        return Err(ProgramError::validation("allowedStartHours must be within 0-24", &fields));
    }
    if hours.start == hours.end {
        return Err(ProgramError::validation(
            "allowedStartHours start and end must differ",
            &["customSettings.allowedStartHours"],
        ));
    }
    Ok(())
}

fn success_message(action: &ControlAction) -> String {
    match action {
        ControlAction::Pause => "Program paused".to_string(),
        ControlAction::Resume => "Program resumed".to_string(),
        ControlAction::Terminate => "Program terminated".to_string(),
        ControlAction::ModifyDelay { delay_hours } => format!("Delay set to {} hours", delay_hours),
        ControlAction::ResetDay => "Current day reset".to_string(),
        ControlAction::ForceUnlock { day } => format!("Day {} unlocked", day),
        ControlAction::RestartProgram => "Program restarted from day 1".to_string(),
        ControlAction::UpdateSettings { .. } => "Schedule settings updated".to_string(),
    }
}
