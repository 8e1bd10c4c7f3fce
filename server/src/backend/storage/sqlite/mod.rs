//! # SQLite Storage Module
//!
//! - **connection.rs** - pool setup and schema
//! - **program_repository.rs** - the gating triple
//! - **directory_repository.rs** - caregivers and admins

pub mod connection;
pub mod directory_repository;
pub mod program_repository;

pub use connection::DbConnection;
pub use directory_repository::{SqliteAdminDirectory, SqliteCaregiverDirectory};
pub use program_repository::SqliteGatingStore;
