//! Caregiver-facing program operations: reading the program state and
//! completing the current day.

use chrono::{DateTime, Utc};
use shared::{AdminActionKind, BlockedReason, ProgramStatus};
use tracing::{info, warn};

use super::commands::progress::{CompleteDayCommand, CompleteDayResult};
use super::errors::ProgramError;
use super::models::{AdminActionRecord, AdminIdentity, CompletedDayRecord, ProgramState};
use super::program_context::ProgramContext;

#[derive(Clone)]
pub struct ProgressService {
    context: ProgramContext,
}

impl ProgressService {
    pub fn new(context: ProgramContext) -> Self {
        Self { context }
    }

    /// Program state for a caregiver, created with defaults on first access
    pub async fn get_program_state(&self, caregiver_id: &str) -> Result<ProgramState, ProgramError> {
        info!("Getting program state for caregiver {}", caregiver_id);
        self.context.require_caregiver(caregiver_id).await?;
        self.context.current_state(caregiver_id).await
    }

    /// Record completion of the caregiver's current day.
    ///
    /// Preconditions, first failure wins: assigned patient, active status,
    /// open gate, day not yet completed.
    pub async fn complete_day(&self, command: CompleteDayCommand) -> Result<CompleteDayResult, ProgramError> {
        let caregiver_id = command.caregiver_id.as_str();
        info!("Completing day for caregiver {}", caregiver_id);

        let time_spent = command.time_spent.unwrap_or(0.0);
        if !time_spent.is_finite() || time_spent < 0.0 {
            return Err(ProgramError::validation(
                "timeSpent must be a non-negative number of minutes",
                &["timeSpent"],
            ));
        }

        let caregiver = self.context.require_caregiver(caregiver_id).await?;
        if !caregiver.has_assigned_patient() {
            warn!("Caregiver {} has no assigned patient", caregiver_id);
            return Err(ProgramError::NotFound(format!(
                "Caregiver {} has no assigned patient",
                caregiver_id
            )));
        }

        let _guard = self.context.locks().acquire(caregiver_id).await;
        let now = self.context.now();
        let (mut state, _) = self.context.load_state(caregiver_id, now).await?;

        let status = state.control.status;
        if status != ProgramStatus::Active {
            warn!("Rejected completion for caregiver {}: program is {}", caregiver_id, status);
            return Err(ProgramError::conflict(format!("Program is currently {}", status), status));
        }

        self.context.refresh_gate(&mut state, now);
        let day = state.progress.current_day;
        let gate = &state.gating.gate;
        if !gate.can_start_current_day {
            let reason = gate.blocked_reason.unwrap_or(BlockedReason::PreviousDayIncomplete);
            warn!("Rejected completion for caregiver {}: day {} blocked ({})", caregiver_id, day, reason);
            return Err(ProgramError::GateClosed {
                day,
                reason,
                next_available_at: gate.next_available_at,
            });
        }

        if let Some(requested) = command.day {
            if requested != day {
                if state.progress.has_completed(requested) {
                    warn!("Rejected duplicate completion of day {} for caregiver {}", requested, caregiver_id);
                    return Err(ProgramError::DuplicateCompletion { day: requested });
                }
                return Err(ProgramError::conflict(
                    format!("Day {} is not the current day (current day is {})", requested, day),
                    status,
                ));
            }
        }

        let recorded = state.progress.record_completion(CompletedDayRecord {
            day,
            completed_at: now,
            notes: command.notes.clone(),
            time_spent,
        });
        if !recorded {
            warn!("Rejected duplicate completion of day {} for caregiver {}", day, caregiver_id);
            return Err(ProgramError::DuplicateCompletion { day });
        }

        let is_completed = day >= self.context.settings().program_days;
        if is_completed {
            self.finish_program(&mut state, now);
        } else {
            state.progress.current_day = day + 1;
        }
        self.context.refresh_gate(&mut state, now);
        self.context.save(&mut state).await?;

        let (next_day_available_at, success_message) = if is_completed {
            info!("Caregiver {} completed the program", caregiver_id);
            (None, "Congratulations! You have completed the program.".to_string())
        } else {
            info!(
                "Caregiver {} completed day {}, next day available at {:?}",
                caregiver_id, day, state.gating.gate.next_available_at
            );
            (state.gating.gate.next_available_at, format!("Day {} completed", day))
        };

        Ok(CompleteDayResult {
            state,
            next_day_available_at,
            is_completed,
            success_message,
        })
    }

    /// Final day done: mark the progress and control records completed and audit the status change
    fn finish_program(&self, state: &mut ProgramState, now: DateTime<Utc>) {
        let previous_value = state.control.snapshot();
        state.progress.is_completed = true;
        state.progress.completed_at = Some(now);
        state.control.status = ProgramStatus::Completed;

        let system = AdminIdentity::system();
        state.control.admin_actions.push(AdminActionRecord {
            action: AdminActionKind::CompleteProgram,
            admin_id: system.admin_id,
            admin_name: system.admin_name,
            timestamp: now,
            reason: Some("Final program day completed".to_string()),
            previous_value,
            new_value: state.control.snapshot(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::clock::Clock;
    use crate::backend::domain::program_context::test_support::*;
    use crate::backend::storage::traits::GatingStore;
    use chrono::Duration;

    fn complete(caregiver_id: &str, minutes: f64) -> CompleteDayCommand {
        CompleteDayCommand {
            caregiver_id: caregiver_id.to_string(),
            notes: Some("done".to_string()),
            time_spent: Some(minutes),
            day: None,
        }
    }

    async fn set_status(env: &TestEnv, caregiver_id: &str, status: ProgramStatus) {
        let mut state = env.context.current_state(caregiver_id).await.unwrap();
        state.control.status = status;
        env.store.save_program_state(&state).await.unwrap();
    }

    async fn set_delay(env: &TestEnv, caregiver_id: &str, delay_hours: f64) {
        let mut state = env.context.current_state(caregiver_id).await.unwrap();
        state.control.delay_hours = delay_hours;
        env.store.save_program_state(&state).await.unwrap();
    }

    #[tokio::test]
    async fn test_new_caregiver_starts_on_open_day_one() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());

        let state = service.get_program_state("cg-1").await.unwrap();

        assert_eq!(state.progress.current_day, 1);
        assert!(state.gating.gate.can_start_current_day);
        assert_eq!(state.gating.gate.blocked_reason, None);
    }

    #[tokio::test]
    async fn test_unknown_caregiver_is_not_found() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());

        let error = service.get_program_state("cg-404").await.unwrap_err();
        assert!(matches!(error, ProgramError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_completion_starts_delay_and_reopens_after_it() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());
        let t = monday_morning();

        let result = service.complete_day(complete("cg-1", 30.0)).await.unwrap();

        let gate = &result.state.gating.gate;
        assert_eq!(result.state.progress.current_day, 2);
        assert!(!gate.can_start_current_day);
        assert_eq!(gate.blocked_reason, Some(BlockedReason::TimeDelay));
        assert_eq!(gate.next_available_at, Some(t + Duration::hours(24)));
        assert_eq!(result.next_day_available_at, Some(t + Duration::hours(24)));
        assert_eq!(result.state.progress.total_time_spent, 30.0);

        env.clock.advance(Duration::hours(24) + Duration::seconds(1));
        let state = service.get_program_state("cg-1").await.unwrap();
        assert!(state.gating.gate.can_start_current_day);
        assert_eq!(state.gating.gate.blocked_reason, None);

        // The reopened gate was persisted by the read
        let stored = env.store.load_program_state("cg-1").await.unwrap().unwrap();
        assert!(stored.gating.gate.can_start_current_day);
    }

    #[tokio::test]
    async fn test_completion_rejected_while_delay_runs() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());
        service.complete_day(complete("cg-1", 30.0)).await.unwrap();

        let error = service.complete_day(complete("cg-1", 10.0)).await.unwrap_err();
        match error {
            ProgramError::GateClosed { day, reason, .. } => {
                assert_eq!(day, 2);
                assert_eq!(reason, BlockedReason::TimeDelay);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let state = service.get_program_state("cg-1").await.unwrap();
        assert_eq!(state.progress.total_time_spent, 30.0);
        assert_eq!(state.progress.current_day, 2);
    }

    #[tokio::test]
    async fn test_paused_program_rejects_completion() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());
        set_status(&env, "cg-1", ProgramStatus::Paused).await;

        let error = service.complete_day(complete("cg-1", 5.0)).await.unwrap_err();
        assert_eq!(error.to_string(), "Program is currently paused");
        assert!(matches!(
            error,
            ProgramError::StateConflict { status: ProgramStatus::Paused, .. }
        ));
    }

    #[tokio::test]
    async fn test_caregiver_without_patient_cannot_complete() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());

        let error = service.complete_day(complete("cg-idle", 5.0)).await.unwrap_err();
        assert!(matches!(error, ProgramError::NotFound(_)));
        assert!(env.store.load_program_state("cg-idle").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_final_day_completes_program() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());
        set_delay(&env, "cg-1", 0.0).await;

        for expected_day in 1..=9 {
            let result = service.complete_day(complete("cg-1", 10.0)).await.unwrap();
            assert_eq!(result.state.progress.current_day, expected_day + 1);
            assert!(!result.is_completed);
            env.clock.advance(Duration::minutes(1));
        }

        let result = service.complete_day(complete("cg-1", 10.0)).await.unwrap();
        assert!(result.is_completed);
        assert!(result.state.progress.is_completed);
        assert_eq!(result.state.progress.completed_at, Some(env.clock.now()));
        assert_eq!(result.state.progress.current_day, 10);
        assert_eq!(result.state.control.status, ProgramStatus::Completed);
        assert_eq!(result.state.gating.gate.blocked_reason, Some(BlockedReason::ProgramCompleted));
        assert_eq!(result.next_day_available_at, None);

        let audit = &result.state.control.admin_actions;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AdminActionKind::CompleteProgram);
        assert_eq!(audit[0].admin_id, "system");
        assert_eq!(audit[0].previous_value.status, ProgramStatus::Active);
        assert_eq!(audit[0].new_value.status, ProgramStatus::Completed);

        let error = service.complete_day(complete("cg-1", 10.0)).await.unwrap_err();
        assert!(matches!(
            error,
            ProgramError::StateConflict { status: ProgramStatus::Completed, .. }
        ));
        let state = service.get_program_state("cg-1").await.unwrap();
        assert_eq!(state.progress.total_time_spent, 100.0);
    }

    #[tokio::test]
    async fn test_stale_day_is_duplicate_and_leaves_total_unchanged() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());
        set_delay(&env, "cg-1", 0.0).await;

        let mut first = complete("cg-1", 20.0);
        first.day = Some(1);
        service.complete_day(first.clone()).await.unwrap();

        let error = service.complete_day(first).await.unwrap_err();
        assert!(matches!(error, ProgramError::DuplicateCompletion { day: 1 }));

        let mut future = complete("cg-1", 20.0);
        future.day = Some(5);
        let error = service.complete_day(future).await.unwrap_err();
        assert!(matches!(error, ProgramError::StateConflict { .. }));

        let state = service.get_program_state("cg-1").await.unwrap();
        assert_eq!(state.progress.total_time_spent, 20.0);
        assert_eq!(state.progress.current_day, 2);
    }

    #[tokio::test]
    async fn test_concurrent_completions_advance_once() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());
        set_delay(&env, "cg-1", 0.0).await;

        let mut command = complete("cg-1", 15.0);
        command.day = Some(1);
        let (a, b) = tokio::join!(
            service.complete_day(command.clone()),
            service.complete_day(command.clone())
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(failure, ProgramError::DuplicateCompletion { day: 1 }));

        let state = service.get_program_state("cg-1").await.unwrap();
        assert_eq!(state.progress.current_day, 2);
        assert_eq!(state.progress.completed_days.len(), 1);
        assert_eq!(state.progress.total_time_spent, 15.0);
    }

    #[tokio::test]
    async fn test_negative_time_spent_is_rejected() {
        let env = test_env().await;
        let service = ProgressService::new(env.context.clone());

        let error = service.complete_day(complete("cg-1", -5.0)).await.unwrap_err();
        match error {
            ProgramError::Validation { fields, .. } => assert_eq!(fields, vec!["timeSpent".to_string()]),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
