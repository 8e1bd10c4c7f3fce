//! # REST API Interface Layer
//!
//! HTTP endpoints for the caregiver program. This layer handles:
//! - JSON request/response serialization through the `shared` DTOs
//! - Resolving the acting admin from `adminId` or a bearer token
//! - Translating `ProgramError` into status codes and `{"error", "code"}` bodies
//!
//! No business rules live here; every decision is made by the domain services.

pub mod api_error;
pub mod mappers;
pub mod program_control_apis;
pub mod program_state_apis;

pub use api_error::ApiError;
