//! # Backend Module
//!
//! Contains all logic of the caregiver program service.
//!
//! This module serves as the orchestration layer that brings together:
//! - **Domain**: Gate calculation, progress and admin control rules
//! - **Storage**: SQLite persistence of the per-caregiver program records
//! - **IO**: The REST API consumed by the caregiver dashboard and admin tools
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST API, handlers)
//!     ↓
//! Domain Layer (ProgressService, ControlService, gate calculator)
//!     ↓
//! Storage Layer (GatingStore, directories)
//! ```

pub mod domain;
pub mod io;
pub mod storage;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::backend::domain::models::ProgramSettings;
use crate::backend::domain::{Clock, ControlService, ProgramContext, ProgressService, SystemClock};
use crate::backend::storage::{
    AdminDirectory, DbConnection, SqliteAdminDirectory, SqliteCaregiverDirectory, SqliteGatingStore,
};
use crate::config::ServerConfig;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub progress_service: ProgressService,
    pub control_service: ControlService,
    pub admin_directory: Arc<dyn AdminDirectory>,
}

impl AppState {
    /// Wire the services on top of an open database
    pub fn new(db: DbConnection, clock: Arc<dyn Clock>, settings: ProgramSettings) -> Self {
        let context = ProgramContext::new(
            Arc::new(SqliteGatingStore::new(db.clone())),
            Arc::new(SqliteCaregiverDirectory::new(db.clone())),
            clock,
            settings,
        );

        Self {
            progress_service: ProgressService::new(context.clone()),
            control_service: ControlService::new(context),
            admin_directory: Arc::new(SqliteAdminDirectory::new(db)),
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &ServerConfig) -> Result<AppState> {
    info!("Setting up database at {}", config.database_url);
    let db = DbConnection::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    info!("Setting up domain model");
    let settings = config.to_program_settings()?;
    info!(
        "Program runs {} days, default delay {}h, local offset {}",
        settings.program_days, settings.default_delay_hours, settings.local_offset
    );

    Ok(AppState::new(db, Arc::new(SystemClock), settings))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, cors_origin: &str) -> Result<Router> {
    // CORS setup to allow the dashboard to make requests
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api_routes = Router::new()
        .nest("/program-state", io::rest::program_state_apis::router())
        .nest("/admin/program-control", io::rest::program_control_apis::router());

    Ok(Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state))
}
