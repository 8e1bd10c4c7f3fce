//! # REST API for Admin Program Control
//!
//! Overview of every caregiver's program, per-caregiver detail, and the
//! action endpoint (`POST` or `PATCH`) that pauses, resumes, delays,
//! unlocks, resets or restarts a caregiver's program.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde_json::Value;
use tracing::{info, warn};

use super::api_error::{error_body, to_api_error, ApiError};
use super::mappers::ProgramMapper;
use crate::backend::domain::commands::program_control::ProgramControlCommand;
use crate::backend::domain::models::AdminIdentity;
use crate::backend::domain::ProgramError;
use crate::backend::AppState;
use shared::{ProgramControlOverviewResponse, ProgramControlRequest, ProgramControlResponse, ProgramStateResponse};

/// Create a router for program control APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_program_control_overview))
        .route(
            "/:caregiver_id",
            get(get_program_control).post(apply_program_action).patch(apply_program_action),
        )
}

/// Every caregiver with an assigned patient
pub async fn get_program_control_overview(
    State(app_state): State<AppState>,
) -> Result<Json<ProgramControlOverviewResponse>, ApiError> {
    info!("GET /api/admin/program-control");

    match app_state.control_service.get_overview().await {
        Ok(entries) => Ok(Json(ProgramMapper::to_overview_response(entries))),
        Err(e) => {
            warn!("Failed to build program control overview: {}", e);
            Err(to_api_error(&e))
        }
    }
}

/// One caregiver's program including the complete audit trail
pub async fn get_program_control(
    State(app_state): State<AppState>,
    Path(caregiver_id): Path<String>,
) -> Result<Json<ProgramStateResponse>, ApiError> {
    info!("GET /api/admin/program-control/{}", caregiver_id);

    match app_state.control_service.get_program_control(&caregiver_id).await {
        Ok(state) => Ok(Json(ProgramMapper::to_state_response(state))),
        Err(e) => {
            warn!("Failed to get program control for {}: {}", caregiver_id, e);
            Err(to_api_error(&e))
        }
    }
}

/// Apply an admin action to a caregiver's program
pub async fn apply_program_action(
    State(app_state): State<AppState>,
    Path(caregiver_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ProgramControlRequest>,
) -> Result<Json<ProgramControlResponse>, ApiError> {
    info!(
        "/api/admin/program-control/{} - action: {:?}, admin: {:?}",
        caregiver_id, request.action, request.admin_id
    );

    let admin = resolve_admin(&app_state, &headers, request.admin_id.as_deref()).await?;

    let delay_hours = parse_number(request.delay_hours.as_ref(), "delayHours").map_err(|e| to_api_error(&e))?;
    let force_unlock_day =
        parse_day(request.force_unlock_day.as_ref(), "forceUnlockDay").map_err(|e| to_api_error(&e))?;

    let command = ProgramControlCommand {
        caregiver_id: caregiver_id.clone(),
        action: request.action,
        admin,
        reason: request.reason,
        delay_hours,
        force_unlock_day,
        custom_settings: request.custom_settings,
    };

    match app_state.control_service.apply_action(command).await {
        Ok(result) => {
            info!("{} for caregiver {}", result.success_message, caregiver_id);
            Ok(Json(ProgramMapper::to_control_response(result)))
        }
        Err(e) => {
            warn!("Program action rejected for {}: {}", caregiver_id, e);
            Err(to_api_error(&e))
        }
    }
}

/// Resolve the acting admin from an explicit `adminId`, else from a bearer token.
/// `Ok(None)` means no identity was supplied at all.
async fn resolve_admin(
    app_state: &AppState,
    headers: &HeaderMap,
    admin_id: Option<&str>,
) -> Result<Option<AdminIdentity>, ApiError> {
    let directory = &app_state.admin_directory;

    if let Some(admin_id) = admin_id.map(str::trim).filter(|id| !id.is_empty()) {
        return match directory.get_admin(admin_id).await {
            Ok(Some(admin)) => Ok(Some(admin)),
            Ok(None) => {
                warn!("Unknown admin id {}", admin_id);
                Err(error_body(
                    StatusCode::NOT_FOUND,
                    format!("Admin {} not found", admin_id),
                    "NOT_FOUND",
                ))
            }
            Err(e) => Err(to_api_error(&ProgramError::from(e))),
        };
    }

    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };

    match directory.find_admin_by_token(token).await {
        Ok(Some(admin)) => Ok(Some(admin)),
        Ok(None) => {
            warn!("Bearer token did not match any admin");
            Err(error_body(StatusCode::NOT_FOUND, "Admin token not recognized", "NOT_FOUND"))
        }
        Err(e) => Err(to_api_error(&ProgramError::from(e))),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Accepts a JSON number or a numeric string; `null` counts as absent
fn parse_number(value: Option<&Value>, field: &str) -> Result<Option<f64>, ProgramError> {
    let invalid = || ProgramError::validation(format!("{} must be a number", field), &[field]);
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_f64().map(Some).ok_or_else(invalid),
        Some(Value::String(text)) => text.trim().parse::<f64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Accepts a whole JSON number or an integer string; `null` counts as absent
fn parse_day(value: Option<&Value>, field: &str) -> Result<Option<i64>, ProgramError> {
    let invalid = || ProgramError::validation(format!("{} must be an integer", field), &[field]);
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(invalid),
        Some(Value::String(text)) => text.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
