use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::backend::domain::ProgramError;

/// Error half of every handler's `Result`
pub type ApiError = (StatusCode, Json<Value>);

/// Build an error body in the common `{"error", "code"}` shape
pub fn error_body(status: StatusCode, message: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(json!({
            "error": message.into(),
            "code": code,
        })),
    )
}

/// Translate a domain error into its HTTP status and JSON body
pub fn to_api_error(error: &ProgramError) -> ApiError {
    let message = error.to_string();
    match error {
        ProgramError::Validation { fields, .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": message,
                "code": "VALIDATION_ERROR",
                "fields": fields,
            })),
        ),
        ProgramError::UnknownAction(_) => error_body(StatusCode::BAD_REQUEST, message, "UNKNOWN_ACTION"),
        ProgramError::StateConflict { status, .. } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": message,
                "code": "STATE_CONFLICT",
                "status": status,
            })),
        ),
        ProgramError::GateClosed {
            reason,
            next_available_at,
            ..
        } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": message,
                "code": "DAY_NOT_AVAILABLE",
                "blockedReason": reason,
                "nextAvailableAt": next_available_at.map(|at| at.to_rfc3339()),
            })),
        ),
        ProgramError::DuplicateCompletion { .. } => {
            error_body(StatusCode::CONFLICT, message, "DUPLICATE_COMPLETION")
        }
        ProgramError::ConcurrentModification(_) => {
            error_body(StatusCode::CONFLICT, message, "CONCURRENT_MODIFICATION")
        }
        ProgramError::NotFound(_) => error_body(StatusCode::NOT_FOUND, message, "NOT_FOUND"),
        ProgramError::Storage(_) => error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "Program storage is temporarily unavailable",
            "STORAGE_UNAVAILABLE",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BlockedReason, ProgramStatus};

    #[test]
    fn test_validation_error_lists_fields() {
        let (status, Json(body)) = to_api_error(&ProgramError::validation("bad delay", &["delayHours"]));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["fields"][0], "delayHours");
    }

    #[test]
    fn test_state_conflict_surfaces_status() {
        let error = ProgramError::conflict("Program is currently paused", ProgramStatus::Paused);
        let (status, Json(body)) = to_api_error(&error);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Program is currently paused");
        assert_eq!(body["status"], "paused");
    }

    #[test]
    fn test_gate_closed_surfaces_reason() {
        let error = ProgramError::GateClosed {
            day: 2,
            reason: BlockedReason::TimeDelay,
            next_available_at: None,
        };
        let (status, Json(body)) = to_api_error(&error);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["blockedReason"], "time_delay");
        assert!(body["nextAvailableAt"].is_null());
    }

    #[test]
    fn test_storage_error_hides_details() {
        let error = ProgramError::Storage(anyhow::anyhow!("database is locked"));
        let (status, Json(body)) = to_api_error(&error);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body["error"].as_str().unwrap().contains("locked"));
    }
}
