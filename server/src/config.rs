//! Configuration for the caregiver program server
//!
//! CLI arguments and environment variable handling using clap. A `.env`
//! file is loaded by `main` before parsing.

use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use clap::Parser;
use std::net::SocketAddr;

use crate::backend::domain::models::ProgramSettings;

/// Largest UTC offset accepted for the caregiver-local clock
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Day-gating and program control service for the caregiver support program
#[derive(Parser, Debug, Clone)]
#[command(name = "caregiver-program-server")]
#[command(about = "Day-gating and program control service for the caregiver support program")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// SQLx SQLite URL, the file is created if missing
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:caregiver_program.db")]
    pub database_url: String,

    /// Final day of the program
    #[arg(long, env = "PROGRAM_DAYS", default_value_t = 10)]
    pub program_days: u32,

    /// Delay between days for programs created without an explicit setting
    #[arg(long, env = "DEFAULT_DELAY_HOURS", default_value_t = 24.0, allow_hyphen_values = true)]
    pub default_delay_hours: f64,

    /// Offset of the caregiver-local clock used for allowed hours and weekends
    #[arg(long, env = "UTC_OFFSET_MINUTES", default_value_t = 0, allow_hyphen_values = true)]
    pub utc_offset_minutes: i32,

    /// Browser origin allowed by CORS
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:8080")]
    pub cors_origin: String,

    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.program_days == 0 {
            return Err("PROGRAM_DAYS must be at least 1".to_string());
        }

        if !self.default_delay_hours.is_finite() || self.default_delay_hours < 0.0 {
            return Err("DEFAULT_DELAY_HOURS must be a non-negative number".to_string());
        }

        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(format!(
                "UTC_OFFSET_MINUTES must be between -{} and {}",
                MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES
            ));
        }

        Ok(())
    }

    pub fn to_program_settings(&self) -> Result<ProgramSettings> {
        let local_offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("Invalid UTC offset: {} minutes", self.utc_offset_minutes))?;

        Ok(ProgramSettings {
            program_days: self.program_days,
            default_delay_hours: self.default_delay_hours,
            local_offset,
        })
    }
}
