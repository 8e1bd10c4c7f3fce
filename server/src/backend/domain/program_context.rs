//! Shared plumbing for the program services.
//!
//! Both `ProgressService` and `ControlService` load, mutate and save the same
//! per-caregiver triple. `ProgramContext` owns the collaborators they share:
//! storage, the caregiver directory, the clock and the per-caregiver locks.

use chrono::{DateTime, Utc};
use shared::{BlockedReason, ProgramStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::clock::Clock;
use super::errors::ProgramError;
use super::gate_calculator::recalculate_gating;
use super::locks::CaregiverLocks;
use super::models::{
    CaregiverRecord, ControlRecord, GateResult, GatingRecord, ProgramSettings, ProgramState,
    ProgressRecord,
};
use crate::backend::storage::traits::{CaregiverDirectory, GatingStore};

#[derive(Clone)]
pub struct ProgramContext {
    store: Arc<dyn GatingStore>,
    caregivers: Arc<dyn CaregiverDirectory>,
    clock: Arc<dyn Clock>,
    locks: CaregiverLocks,
    settings: ProgramSettings,
}

impl ProgramContext {
    pub fn new(
        store: Arc<dyn GatingStore>,
        caregivers: Arc<dyn CaregiverDirectory>,
        clock: Arc<dyn Clock>,
        settings: ProgramSettings,
    ) -> Self {
        Self {
            store,
            caregivers,
            clock,
            locks: CaregiverLocks::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ProgramSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn locks(&self) -> &CaregiverLocks {
        &self.locks
    }

    pub fn caregivers(&self) -> &dyn CaregiverDirectory {
        self.caregivers.as_ref()
    }

    /// Look up a caregiver, failing with `NotFound` when unknown
    pub async fn require_caregiver(&self, caregiver_id: &str) -> Result<CaregiverRecord, ProgramError> {
        match self.caregivers.get_caregiver(caregiver_id).await? {
            Some(caregiver) => Ok(caregiver),
            None => {
                warn!("Unknown caregiver {}", caregiver_id);
                Err(ProgramError::NotFound(format!("Caregiver {} not found", caregiver_id)))
            }
        }
    }

    /// Fresh records for a caregiver who has never touched the program: day 1, active, open
    pub fn default_state(&self, caregiver_id: &str, now: DateTime<Utc>) -> ProgramState {
        ProgramState {
            progress: ProgressRecord::new(caregiver_id),
            control: ControlRecord::new(caregiver_id, self.settings.default_delay_hours),
            gating: GatingRecord {
                caregiver_id: caregiver_id.to_string(),
                gate: GateResult::open(1, now, now),
                overrides: Vec::new(),
            },
            version: 0,
        }
    }

    /// Load the stored triple, or build the default one.
    /// The flag is true when nothing was stored yet. Callers must hold the caregiver lock.
    pub async fn load_state(
        &self,
        caregiver_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(ProgramState, bool), ProgramError> {
        let loaded = self.store.load_program_state(caregiver_id).await.map_err(|e| {
            error!("Failed to load program state for caregiver {}: {:#}", caregiver_id, e);
            ProgramError::from(e)
        })?;

        match loaded {
            Some(state) => Ok((state, false)),
            None => {
                info!("Creating default program records for caregiver {}", caregiver_id);
                Ok((self.default_state(caregiver_id, now), true))
            }
        }
    }

    /// Recompute the gate in place.
    ///
    /// A gate closed directly by `pause` or `terminate` keeps its admin reason
    /// for as long as the status still matches it.
    pub fn refresh_gate(&self, state: &mut ProgramState, now: DateTime<Utc>) {
        let day = state.progress.current_day;
        let admin_reason = match (state.control.status, state.gating.gate.blocked_reason) {
            (ProgramStatus::Paused, Some(BlockedReason::AdminPause)) => Some(BlockedReason::AdminPause),
            (ProgramStatus::Terminated, Some(BlockedReason::AdminTerminated)) => {
                Some(BlockedReason::AdminTerminated)
            }
            _ => None,
        };

        state.gating.gate = match admin_reason {
            Some(reason) => GateResult::closed(day, reason, None, now),
            None => recalculate_gating(
                &state.progress,
                &state.control,
                &state.gating.overrides,
                self.settings.local_offset,
                now,
            ),
        };

        if state.gating.gate.blocked_reason == Some(BlockedReason::PreviousDayIncomplete) {
            warn!(
                "Inconsistent progress for caregiver {}: on day {} but day {} was never recorded",
                state.progress.caregiver_id,
                day,
                day.saturating_sub(1)
            );
        }
    }

    /// Persist the triple and bump `state.version`
    pub async fn save(&self, state: &mut ProgramState) -> Result<(), ProgramError> {
        match self.store.save_program_state(state).await {
            Ok(version) => {
                state.version = version;
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to save program state for caregiver {}: {:#}",
                    state.progress.caregiver_id, e
                );
                Err(ProgramError::from(e))
            }
        }
    }

    /// Read path: returns the triple with a gate computed for the current time.
    ///
    /// Persists when the records did not exist yet or the gate outcome changed.
    pub async fn current_state(&self, caregiver_id: &str) -> Result<ProgramState, ProgramError> {
        let _guard = self.locks.acquire(caregiver_id).await;
        let now = self.now();
        let (mut state, is_new) = self.load_state(caregiver_id, now).await?;

        let mut changed = false;
        if state.control.status == ProgramStatus::Active {
            let previous = state.gating.gate.clone();
            self.refresh_gate(&mut state, now);
            changed = gate_outcome_changed(&previous, &state.gating.gate);
        }

        if is_new || changed {
            self.save(&mut state).await?;
        }

        Ok(state)
    }
}

/// Whether two gates differ in anything a caller can observe, ignoring when they were computed
pub fn gate_outcome_changed(before: &GateResult, after: &GateResult) -> bool {
    if before.can_start_current_day != after.can_start_current_day
        || before.blocked_reason != after.blocked_reason
        || before.current_available_day != after.current_available_day
    {
        return true;
    }
    // An open gate reports `now` for some branches, which moves on every read
    !after.can_start_current_day && before.next_available_at != after.next_available_at
}
