//! # Domain Module
//!
//! Contains the business logic of the caregiver program: deciding whether a
//! caregiver may start their current program day, and the admin controls
//! that steer that progression.
//!
//! ## Module Organization
//!
//! - **gate_calculator**: Pure gate computation from progress, control, overrides and time
//! - **progress_service**: Caregiver-facing reads and day completion
//! - **control_service**: Admin actions and the audit trail
//! - **program_context**: Load/refresh/save plumbing shared by both services
//! - **locks**: Per-caregiver mutation boundary
//! - **clock**: Injectable time source
//!
//! ## Business Rules
//!
//! - A paused, terminated or completed program never has an open gate
//! - An admin override opens the gate for its day regardless of delay and allowed hours
//! - Completed day numbers are unique; `totalTimeSpent` never decreases
//! - Every status or delay change appends exactly one audit entry
//! - Mutations for one caregiver are serialized, different caregivers never contend

pub mod clock;
pub mod commands;
pub mod control_service;
pub mod errors;
pub mod gate_calculator;
pub mod locks;
pub mod models;
pub mod program_context;
pub mod progress_service;

pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub use clock::ManualClock;
pub use control_service::ControlService;
pub use errors::ProgramError;
pub use locks::CaregiverLocks;
pub use program_context::ProgramContext;
pub use progress_service::ProgressService;
