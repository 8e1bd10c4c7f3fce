use anyhow::Result;
use async_trait::async_trait;
use sqlx::Row;

use super::connection::DbConnection;
use crate::backend::domain::models::{AdminIdentity, CaregiverRecord};
use crate::backend::storage::traits::{AdminDirectory, CaregiverDirectory};

/// Repository for caregiver lookups
#[derive(Clone)]
pub struct SqliteCaregiverDirectory {
    db: DbConnection,
}

impl SqliteCaregiverDirectory {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert or update a caregiver
    pub async fn store_caregiver(&self, caregiver: &CaregiverRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO caregivers (id, name, assigned_patient_id)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&caregiver.id)
        .bind(&caregiver.name)
        .bind(&caregiver.assigned_patient_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CaregiverDirectory for SqliteCaregiverDirectory {
    async fn get_caregiver(&self, caregiver_id: &str) -> Result<Option<CaregiverRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, assigned_patient_id
            FROM caregivers
            WHERE id = ?
            "#,
        )
        .bind(caregiver_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(r) => Ok(Some(CaregiverRecord {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                assigned_patient_id: r.try_get("assigned_patient_id")?,
            })),
            None => Ok(None),
        }
    }

    async fn list_caregivers_with_patient(&self) -> Result<Vec<CaregiverRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, assigned_patient_id
            FROM caregivers
            WHERE assigned_patient_id IS NOT NULL AND TRIM(assigned_patient_id) != ''
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CaregiverRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    assigned_patient_id: row.try_get("assigned_patient_id")?,
                })
            })
            .collect()
    }
}

/// Repository for admin identities and their API tokens
#[derive(Clone)]
pub struct SqliteAdminDirectory {
    db: DbConnection,
}

impl SqliteAdminDirectory {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert or update an admin, optionally with a bearer token
    pub async fn store_admin(&self, admin: &AdminIdentity, api_token: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO admins (id, name, api_token)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&admin.admin_id)
        .bind(&admin.admin_name)
        .bind(api_token)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AdminDirectory for SqliteAdminDirectory {
    async fn get_admin(&self, admin_id: &str) -> Result<Option<AdminIdentity>> {
        let row = sqlx::query("SELECT id, name FROM admins WHERE id = ?")
            .bind(admin_id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(r) => Ok(Some(AdminIdentity {
                admin_id: r.try_get("id")?,
                admin_name: r.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_admin_by_token(&self, token: &str) -> Result<Option<AdminIdentity>> {
        let row = sqlx::query("SELECT id, name FROM admins WHERE api_token = ?")
            .bind(token)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(r) => Ok(Some(AdminIdentity {
                admin_id: r.try_get("id")?,
                admin_name: r.try_get("name")?,
            })),
            None => Ok(None),
        }
    }
}
