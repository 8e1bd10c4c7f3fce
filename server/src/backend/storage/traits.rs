//! # Storage Traits
//!
//! Storage abstractions the domain services depend on. The SQLite
//! implementations live in `storage::sqlite`.

use anyhow::Result;
use async_trait::async_trait;

use crate::backend::domain::models::{AdminIdentity, CaregiverRecord, ProgramState};

/// Persistence for a caregiver's (progress, control, gating) triple
#[async_trait]
pub trait GatingStore: Send + Sync {
    /// Load the triple, `None` if the caregiver has no program records yet
    async fn load_program_state(&self, caregiver_id: &str) -> Result<Option<ProgramState>>;

    /// Persist the whole triple atomically and return the new version.
    ///
    /// Fails with [`VersionConflict`] when `state.version` no longer matches
    /// the stored version; nothing is written in that case.
    async fn save_program_state(&self, state: &ProgramState) -> Result<i64>;
}

/// Read access to caregivers owned by the surrounding application
#[async_trait]
pub trait CaregiverDirectory: Send + Sync {
    async fn get_caregiver(&self, caregiver_id: &str) -> Result<Option<CaregiverRecord>>;

    /// Caregivers with an assigned patient, ordered by id
    async fn list_caregivers_with_patient(&self) -> Result<Vec<CaregiverRecord>>;
}

/// Resolves admin identities, either by id or by bearer token
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn get_admin(&self, admin_id: &str) -> Result<Option<AdminIdentity>>;

    async fn find_admin_by_token(&self, token: &str) -> Result<Option<AdminIdentity>>;
}

/// Optimistic concurrency failure raised by [`GatingStore::save_program_state`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("program state for caregiver {caregiver_id} is at version {found}, expected {expected}")]
pub struct VersionConflict {
    pub caregiver_id: String,
    pub expected: i64,
    pub found: i64,
}
