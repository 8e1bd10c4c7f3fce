//! # Storage Module
//!
//! Handles persistence of the program gating records and read access to the
//! caregiver and admin directories.
//!
//! ## Current Implementation
//!
//! - **Primary Storage**: SQLite database through SQLx
//! - **Atomicity**: the (progress, control, gating) triple is written in one
//!   database transaction, guarded by an optimistic version check
//! - **Audit Trail**: admin actions are insert-only

pub mod sqlite;
pub mod traits;

pub use sqlite::{DbConnection, SqliteAdminDirectory, SqliteCaregiverDirectory, SqliteGatingStore};
pub use traits::{AdminDirectory, CaregiverDirectory, GatingStore, VersionConflict};
