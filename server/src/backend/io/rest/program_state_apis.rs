//! # REST API for Caregiver Program State
//!
//! Caregiver-facing endpoints: read the program state and complete the current day.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tracing::{info, warn};

use super::api_error::{to_api_error, ApiError};
use super::mappers::ProgramMapper;
use crate::backend::domain::commands::progress::CompleteDayCommand;
use crate::backend::AppState;
use shared::{CompleteDayRequest, CompleteDayResponse, ProgramStateResponse};

/// Create a router for program state APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:caregiver_id", get(get_program_state))
        .route("/:caregiver_id/complete-day", post(complete_day))
}

/// Get progress, control and gate for a caregiver, creating defaults on first access
pub async fn get_program_state(
    State(app_state): State<AppState>,
    Path(caregiver_id): Path<String>,
) -> Result<Json<ProgramStateResponse>, ApiError> {
    info!("GET /api/program-state/{}", caregiver_id);

    match app_state.progress_service.get_program_state(&caregiver_id).await {
        Ok(state) => Ok(Json(ProgramMapper::to_state_response(state))),
        Err(e) => {
            warn!("Failed to get program state for {}: {}", caregiver_id, e);
            Err(to_api_error(&e))
        }
    }
}

/// Complete the caregiver's current day
pub async fn complete_day(
    State(app_state): State<AppState>,
    Path(caregiver_id): Path<String>,
    Json(request): Json<CompleteDayRequest>,
) -> Result<Json<CompleteDayResponse>, ApiError> {
    info!("POST /api/program-state/{}/complete-day - request: {:?}", caregiver_id, request);

    let command = CompleteDayCommand {
        caregiver_id: caregiver_id.clone(),
        notes: request.notes,
        time_spent: request.time_spent,
        day: request.day,
    };

    match app_state.progress_service.complete_day(command).await {
        Ok(result) => {
            info!("{}", result.success_message);
            Ok(Json(ProgramMapper::to_complete_day_response(result)))
        }
        Err(e) => {
            warn!("Failed to complete day for {}: {}", caregiver_id, e);
            Err(to_api_error(&e))
        }
    }
}
