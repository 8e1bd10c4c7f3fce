use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How long a connection waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS caregivers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        assigned_patient_id TEXT
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS admins (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        api_token TEXT UNIQUE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS program_progress (
        caregiver_id TEXT PRIMARY KEY,
        current_day INTEGER NOT NULL,
        total_time_spent REAL NOT NULL DEFAULT 0,
        is_completed INTEGER NOT NULL DEFAULT 0,
        completed_at TEXT,
        version INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS program_completed_days (
        caregiver_id TEXT NOT NULL,
        day INTEGER NOT NULL,
        completed_at TEXT NOT NULL,
        notes TEXT,
        time_spent REAL NOT NULL DEFAULT 0,
        PRIMARY KEY (caregiver_id, day)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS program_control (
        caregiver_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        delay_hours REAL NOT NULL,
        skip_weekends INTEGER NOT NULL DEFAULT 0,
        allowed_start_hour INTEGER NOT NULL DEFAULT 0,
        allowed_end_hour INTEGER NOT NULL DEFAULT 24
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS program_admin_actions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        caregiver_id TEXT NOT NULL,
        action TEXT NOT NULL,
        admin_id TEXT NOT NULL,
        admin_name TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        reason TEXT,
        previous_value TEXT NOT NULL,
        new_value TEXT NOT NULL
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_program_admin_actions_caregiver
    ON program_admin_actions(caregiver_id, id);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS day_gating (
        caregiver_id TEXT PRIMARY KEY,
        can_start_current_day INTEGER NOT NULL,
        blocked_reason TEXT,
        next_available_at TEXT,
        current_available_day INTEGER NOT NULL,
        last_calculated_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS day_gating_overrides (
        caregiver_id TEXT NOT NULL,
        day INTEGER NOT NULL,
        unlocked_by TEXT NOT NULL,
        unlocked_at TEXT NOT NULL,
        reason TEXT,
        PRIMARY KEY (caregiver_id, day)
    );
    "#,
];

/// DbConnection manages the SQLite pool shared by all repositories
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection, creating the database file if needed.
    ///
    /// File databases run in WAL mode so readers never block the single writer.
    pub async fn new(url: &str) -> Result<Self> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize a private in-memory database for a single test.
    ///
    /// One connection that never expires, so the database lives as long as the pool.
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok(())
    }
}
