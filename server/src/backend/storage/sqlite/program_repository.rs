//! # SQLite Gating Store
//!
//! Persists each caregiver's program triple across six tables:
//!
//! ```text
//! program_progress ──┬── program_completed_days
//! program_control  ──┴── program_admin_actions   (insert-only)
//! day_gating       ───── day_gating_overrides
//! ```
//!
//! `save_program_state` rewrites the triple inside one transaction that
//! opens by bumping the stored version, so a reader never sees `current_day`
//! from one save next to a gate from another.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use super::connection::DbConnection;
use crate::backend::domain::models::{
    AdminActionRecord, CompletedDayRecord, ControlRecord, GateResult, GatingRecord, OverrideRecord,
    ProgramState, ProgressRecord,
};
use crate::backend::storage::traits::{GatingStore, VersionConflict};
use shared::{AllowedStartHours, ControlSnapshot, CustomSettings};

/// SQLite-backed [`GatingStore`]
#[derive(Clone)]
pub struct SqliteGatingStore {
    db: DbConnection,
}

impl SqliteGatingStore {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    async fn load_progress(
        tx: &mut Transaction<'_, Sqlite>,
        caregiver_id: &str,
    ) -> Result<Option<(ProgressRecord, i64)>> {
        let row = sqlx::query(
            r#"
            SELECT current_day, total_time_spent, is_completed, completed_at, version
            FROM program_progress
            WHERE caregiver_id = ?
            "#,
        )
        .bind(caregiver_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let day_rows = sqlx::query(
            r#"
            SELECT day, completed_at, notes, time_spent
            FROM program_completed_days
            WHERE caregiver_id = ?
            ORDER BY day ASC
            "#,
        )
        .bind(caregiver_id)
        .fetch_all(&mut **tx)
        .await?;

        let completed_days = day_rows
            .iter()
            .map(|day_row| {
                Ok(CompletedDayRecord {
                    day: get_day(day_row, "day")?,
                    completed_at: parse_timestamp(&day_row.try_get::<String, _>("completed_at")?)?,
                    notes: day_row.try_get("notes")?,
                    time_spent: day_row.try_get("time_spent")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let completed_at: Option<String> = row.try_get("completed_at")?;
        let progress = ProgressRecord {
            caregiver_id: caregiver_id.to_string(),
            current_day: get_day(&row, "current_day")?,
            completed_days,
            total_time_spent: row.try_get("total_time_spent")?,
            is_completed: row.try_get("is_completed")?,
            completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        };

        Ok(Some((progress, row.try_get("version")?)))
    }

    async fn load_control(
        tx: &mut Transaction<'_, Sqlite>,
        caregiver_id: &str,
    ) -> Result<ControlRecord> {
        let row = sqlx::query(
            r#"
            SELECT status, delay_hours, skip_weekends, allowed_start_hour, allowed_end_hour
            FROM program_control
            WHERE caregiver_id = ?
            "#,
        )
        .bind(caregiver_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| anyhow!("Program control record missing for caregiver {}", caregiver_id))?;

        let action_rows = sqlx::query(
            r#"
            SELECT action, admin_id, admin_name, timestamp, reason, previous_value, new_value
            FROM program_admin_actions
            WHERE caregiver_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(caregiver_id)
        .fetch_all(&mut **tx)
        .await?;

        let admin_actions = action_rows
            .iter()
            .map(|action_row| {
                let action: String = action_row.try_get("action")?;
                let previous: String = action_row.try_get("previous_value")?;
                let new: String = action_row.try_get("new_value")?;
                Ok(AdminActionRecord {
                    action: action.parse().map_err(anyhow::Error::msg)?,
                    admin_id: action_row.try_get("admin_id")?,
                    admin_name: action_row.try_get("admin_name")?,
                    timestamp: parse_timestamp(&action_row.try_get::<String, _>("timestamp")?)?,
                    reason: action_row.try_get("reason")?,
                    previous_value: serde_json::from_str::<ControlSnapshot>(&previous)
                        .context("Failed to decode previous_value of admin action")?,
                    new_value: serde_json::from_str::<ControlSnapshot>(&new)
                        .context("Failed to decode new_value of admin action")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let status: String = row.try_get("status")?;
        Ok(ControlRecord {
            caregiver_id: caregiver_id.to_string(),
            status: status.parse().map_err(anyhow::Error::msg)?,
            delay_hours: row.try_get("delay_hours")?,
            custom_settings: CustomSettings {
                skip_weekends: row.try_get("skip_weekends")?,
                allowed_start_hours: AllowedStartHours {
                    start: get_hour(&row, "allowed_start_hour")?,
                    end: get_hour(&row, "allowed_end_hour")?,
                },
            },
            admin_actions,
        })
    }

    async fn load_gating(
        tx: &mut Transaction<'_, Sqlite>,
        caregiver_id: &str,
    ) -> Result<GatingRecord> {
        let row = sqlx::query(
            r#"
            SELECT can_start_current_day, blocked_reason, next_available_at,
                   current_available_day, last_calculated_at
            FROM day_gating
            WHERE caregiver_id = ?
            "#,
        )
        .bind(caregiver_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| anyhow!("Day gating record missing for caregiver {}", caregiver_id))?;

        let override_rows = sqlx::query(
            r#"
            SELECT day, unlocked_by, unlocked_at, reason
            FROM day_gating_overrides
            WHERE caregiver_id = ?
            ORDER BY day ASC
            "#,
        )
        .bind(caregiver_id)
        .fetch_all(&mut **tx)
        .await?;

        let overrides = override_rows
            .iter()
            .map(|override_row| {
                Ok(OverrideRecord {
                    day: get_day(override_row, "day")?,
                    unlocked_by: override_row.try_get("unlocked_by")?,
                    unlocked_at: parse_timestamp(&override_row.try_get::<String, _>("unlocked_at")?)?,
                    reason: override_row.try_get("reason")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let blocked_reason: Option<String> = row.try_get("blocked_reason")?;
        let next_available_at: Option<String> = row.try_get("next_available_at")?;
        Ok(GatingRecord {
            caregiver_id: caregiver_id.to_string(),
            gate: GateResult {
                can_start_current_day: row.try_get("can_start_current_day")?,
                blocked_reason: blocked_reason
                    .map(|reason| reason.parse().map_err(anyhow::Error::msg))
                    .transpose()?,
                next_available_at: next_available_at.as_deref().map(parse_timestamp).transpose()?,
                current_available_day: get_day(&row, "current_available_day")?,
                calculated_at: parse_timestamp(&row.try_get::<String, _>("last_calculated_at")?)?,
            },
            overrides,
        })
    }

    async fn write_progress(
        tx: &mut Transaction<'_, Sqlite>,
        progress: &ProgressRecord,
        version: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO program_progress
                (caregiver_id, current_day, total_time_spent, is_completed, completed_at, version)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&progress.caregiver_id)
        .bind(i64::from(progress.current_day))
        .bind(progress.total_time_spent)
        .bind(progress.is_completed)
        .bind(progress.completed_at.map(|at| at.to_rfc3339()))
        .bind(version)
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM program_completed_days WHERE caregiver_id = ?")
            .bind(&progress.caregiver_id)
            .execute(&mut **tx)
            .await?;

        for entry in &progress.completed_days {
            sqlx::query(
                r#"
                INSERT INTO program_completed_days (caregiver_id, day, completed_at, notes, time_spent)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&progress.caregiver_id)
            .bind(i64::from(entry.day))
            .bind(entry.completed_at.to_rfc3339())
            .bind(&entry.notes)
            .bind(entry.time_spent)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn write_control(tx: &mut Transaction<'_, Sqlite>, control: &ControlRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO program_control
                (caregiver_id, status, delay_hours, skip_weekends, allowed_start_hour, allowed_end_hour)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&control.caregiver_id)
        .bind(control.status.as_str())
        .bind(control.delay_hours)
        .bind(control.custom_settings.skip_weekends)
        .bind(i64::from(control.custom_settings.allowed_start_hours.start))
        .bind(i64::from(control.custom_settings.allowed_start_hours.end))
        .execute(&mut **tx)
        .await?;

        let stored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM program_admin_actions WHERE caregiver_id = ?")
                .bind(&control.caregiver_id)
                .fetch_one(&mut **tx)
                .await?;
        let stored = usize::try_from(stored).context("Negative admin action count")?;

        if stored > control.admin_actions.len() {
            return Err(anyhow!(
                "Refusing to save caregiver {}: audit trail has {} stored entries but only {} in memory",
                control.caregiver_id,
                stored,
                control.admin_actions.len()
            ));
        }

        for action in &control.admin_actions[stored..] {
            sqlx::query(
                r#"
                INSERT INTO program_admin_actions
                    (caregiver_id, action, admin_id, admin_name, timestamp, reason, previous_value, new_value)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&control.caregiver_id)
            .bind(action.action.as_str())
            .bind(&action.admin_id)
            .bind(&action.admin_name)
            .bind(action.timestamp.to_rfc3339())
            .bind(&action.reason)
            .bind(serde_json::to_string(&action.previous_value)?)
            .bind(serde_json::to_string(&action.new_value)?)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn write_gating(tx: &mut Transaction<'_, Sqlite>, gating: &GatingRecord) -> Result<()> {
        let gate = &gating.gate;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO day_gating
                (caregiver_id, can_start_current_day, blocked_reason, next_available_at,
                 current_available_day, last_calculated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&gating.caregiver_id)
        .bind(gate.can_start_current_day)
        .bind(gate.blocked_reason.map(|reason| reason.as_str()))
        .bind(gate.next_available_at.map(|at| at.to_rfc3339()))
        .bind(i64::from(gate.current_available_day))
        .bind(gate.calculated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM day_gating_overrides WHERE caregiver_id = ?")
            .bind(&gating.caregiver_id)
            .execute(&mut **tx)
            .await?;

        for entry in &gating.overrides {
            sqlx::query(
                r#"
                INSERT INTO day_gating_overrides (caregiver_id, day, unlocked_by, unlocked_at, reason)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&gating.caregiver_id)
            .bind(i64::from(entry.day))
            .bind(&entry.unlocked_by)
            .bind(entry.unlocked_at.to_rfc3339())
            .bind(&entry.reason)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl GatingStore for SqliteGatingStore {
    async fn load_program_state(&self, caregiver_id: &str) -> Result<Option<ProgramState>> {
        let mut tx = self.db.pool().begin().await?;

        let Some((progress, version)) = Self::load_progress(&mut tx, caregiver_id).await? else {
            return Ok(None);
        };
        let control = Self::load_control(&mut tx, caregiver_id).await?;
        let gating = Self::load_gating(&mut tx, caregiver_id).await?;

        tx.commit().await?;

        Ok(Some(ProgramState {
            progress,
            control,
            gating,
            version,
        }))
    }

    async fn save_program_state(&self, state: &ProgramState) -> Result<i64> {
        let caregiver_id = &state.progress.caregiver_id;
        let mut tx = self.db.pool().begin().await?;

        // Claim the row with a write first, so the transaction takes the write
        // lock up front and never has to upgrade a read lock
        let claimed = if state.version == 0 {
            sqlx::query(
                "INSERT OR IGNORE INTO program_progress (caregiver_id, current_day, version) VALUES (?, ?, 1)",
            )
            .bind(caregiver_id)
            .bind(i64::from(state.progress.current_day))
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                "UPDATE program_progress SET version = version + 1 WHERE caregiver_id = ? AND version = ?",
            )
            .bind(caregiver_id)
            .bind(state.version)
            .execute(&mut *tx)
            .await?
        };

        if claimed.rows_affected() == 0 {
            let found: Option<i64> =
                sqlx::query_scalar("SELECT version FROM program_progress WHERE caregiver_id = ?")
                    .bind(caregiver_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            // Dropping the transaction rolls it back
            return Err(VersionConflict {
                caregiver_id: caregiver_id.clone(),
                expected: state.version,
                found: found.unwrap_or(0),
            }
            .into());
        }

        let version = state.version + 1;
        Self::write_progress(&mut tx, &state.progress, version).await?;
        Self::write_control(&mut tx, &state.control).await?;
        Self::write_gating(&mut tx, &state.gating).await?;

        tx.commit().await?;

        debug!("Saved program state for caregiver {} at version {}", caregiver_id, version);
        Ok(version)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid stored timestamp: {}", value))?
        .with_timezone(&Utc))
}

fn get_day(row: &SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).with_context(|| format!("Invalid day number {} in column {}", value, column))
}

fn get_hour(row: &SqliteRow, column: &str) -> Result<u8> {
    let value: i64 = row.try_get(column)?;
    u8::try_from(value).with_context(|| format!("Invalid hour {} in column {}", value, column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared::{AdminActionKind, BlockedReason, ProgramStatus};

    async fn setup_test() -> SqliteGatingStore {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        SqliteGatingStore::new(db)
    }

    fn default_state(caregiver_id: &str) -> ProgramState {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        ProgramState {
            progress: ProgressRecord::new(caregiver_id),
            control: ControlRecord::new(caregiver_id, 24.0),
            gating: GatingRecord {
                caregiver_id: caregiver_id.to_string(),
                gate: GateResult::open(1, now, now),
                overrides: Vec::new(),
            },
            version: 0,
        }
    }

    fn audit_entry(action: AdminActionKind, at: DateTime<Utc>) -> AdminActionRecord {
        AdminActionRecord {
            action,
            admin_id: "admin-1".to_string(),
            admin_name: "Dana".to_string(),
            timestamp: at,
            reason: Some("check-in".to_string()),
            previous_value: ControlSnapshot {
                status: ProgramStatus::Active,
                delay_hours: 24.0,
                custom_settings: CustomSettings::default(),
            },
            new_value: ControlSnapshot {
                status: ProgramStatus::Paused,
                delay_hours: 24.0,
                custom_settings: CustomSettings::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_load_missing_state_returns_none() {
        let store = setup_test().await;
        assert!(store.load_program_state("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_full_triple() {
        let store = setup_test().await;
        let mut state = default_state("cg-1");
        let completed_at = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();

        state.progress.record_completion(CompletedDayRecord {
            day: 1,
            completed_at,
            notes: Some("went well".to_string()),
            time_spent: 42.5,
        });
        state.progress.current_day = 2;
        state.control.delay_hours = 12.0;
        state.control.custom_settings.skip_weekends = true;
        state.control.custom_settings.allowed_start_hours = AllowedStartHours { start: 8, end: 20 };
        state.control.admin_actions.push(audit_entry(AdminActionKind::Pause, completed_at));
        state.gating.gate = GateResult::closed(
            2,
            BlockedReason::TimeDelay,
            Some(completed_at + Duration::hours(12)),
            completed_at,
        );
        state.gating.overrides.push(OverrideRecord {
            day: 4,
            unlocked_by: "admin-1".to_string(),
            unlocked_at: completed_at,
            reason: None,
        });

        let version = store.save_program_state(&state).await.unwrap();
        assert_eq!(version, 1);

        let loaded = store.load_program_state("cg-1").await.unwrap().unwrap();
        state.version = 1;
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected_without_writing() {
        let store = setup_test().await;
        let state = default_state("cg-1");
        store.save_program_state(&state).await.unwrap();

        // Same version 0 again: someone else already saved
        let mut stale = state.clone();
        stale.progress.current_day = 7;
        let error = store.save_program_state(&stale).await.unwrap_err();
        let conflict = error.downcast_ref::<VersionConflict>().expect("expected a version conflict");
        assert_eq!(conflict.expected, 0);
        assert_eq!(conflict.found, 1);

        let loaded = store.load_program_state("cg-1").await.unwrap().unwrap();
        assert_eq!(loaded.progress.current_day, 1);
    }

    #[tokio::test]
    async fn test_stale_version_on_missing_row_is_rejected() {
        let store = setup_test().await;
        let mut state = default_state("cg-1");
        state.version = 3;

        let error = store.save_program_state(&state).await.unwrap_err();
        let conflict = error.downcast_ref::<VersionConflict>().expect("expected a version conflict");
        assert_eq!(conflict.expected, 3);
        assert_eq!(conflict.found, 0);
        assert!(store.load_program_state("cg-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_saves_for_different_caregivers_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("program.db").display());
        let db = DbConnection::new(&url).await.expect("Failed to open file database");
        let store = SqliteGatingStore::new(db);

        let mut tasks = Vec::new();
        for index in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let caregiver_id = format!("cg-{}", index);
                let mut state = default_state(&caregiver_id);
                let mut failures = 0;
                for day in 1..=20 {
                    state.progress.current_day = day;
                    match store.save_program_state(&state).await {
                        Ok(version) => state.version = version,
                        Err(_) => failures += 1,
                    }
                }
                (caregiver_id, failures)
            }));
        }

        for task in tasks {
            let (caregiver_id, failures) = task.await.unwrap();
            assert_eq!(failures, 0, "saves failed for {}", caregiver_id);

            let loaded = store.load_program_state(&caregiver_id).await.unwrap().unwrap();
            assert_eq!(loaded.version, 20);
            assert_eq!(loaded.progress.current_day, 20);
        }
    }

    #[tokio::test]
    async fn test_admin_actions_are_appended_only() {
        let store = setup_test().await;
        let at = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut state = default_state("cg-1");
        state.control.admin_actions.push(audit_entry(AdminActionKind::Pause, at));
        state.version = store.save_program_state(&state).await.unwrap();

        state.control.admin_actions.push(audit_entry(AdminActionKind::Resume, at + Duration::minutes(5)));
        state.version = store.save_program_state(&state).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM program_admin_actions")
            .fetch_one(store.db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);

        // Dropping an entry in memory must not erase it from the trail
        state.control.admin_actions.pop();
        state.control.admin_actions.pop();
        assert!(store.save_program_state(&state).await.is_err());

        let loaded = store.load_program_state("cg-1").await.unwrap().unwrap();
        let actions: Vec<AdminActionKind> =
            loaded.control.admin_actions.iter().map(|entry| entry.action).collect();
        assert_eq!(actions, vec![AdminActionKind::Pause, AdminActionKind::Resume]);
    }

    #[tokio::test]
    async fn test_removed_completions_and_overrides_are_cleared() {
        let store = setup_test().await;
        let at = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut state = default_state("cg-1");
        state.progress.record_completion(CompletedDayRecord {
            day: 1,
            completed_at: at,
            notes: None,
            time_spent: 5.0,
        });
        state.gating.overrides.push(OverrideRecord {
            day: 2,
            unlocked_by: "admin-1".to_string(),
            unlocked_at: at,
            reason: None,
        });
        state.version = store.save_program_state(&state).await.unwrap();

        state.progress.remove_completion(1);
        state.gating.overrides.clear();
        store.save_program_state(&state).await.unwrap();

        let loaded = store.load_program_state("cg-1").await.unwrap().unwrap();
        assert!(loaded.progress.completed_days.is_empty());
        assert!(loaded.gating.overrides.is_empty());
        assert_eq!(loaded.progress.total_time_spent, 5.0);
    }
}
