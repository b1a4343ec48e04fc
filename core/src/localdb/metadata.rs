// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::SqlitePool;

/// Per-item synchronization metadata, such as entity tags of the remote copy.
#[derive(Debug, Clone)]
pub struct Metadata {
    pool: SqlitePool,
}

impl Metadata {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        calendar_id: &str,
        hash_id: &str,
        value: &str,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
INSERT INTO cal_metadata (calendar_id, hash_id, value)
VALUES (?, ?, ?)
ON CONFLICT(calendar_id, hash_id) DO UPDATE SET
    value = excluded.value;
";

        sqlx::query(SQL)
            .bind(calendar_id)
            .bind(hash_id)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get(&self, calendar_id: &str, hash_id: &str) -> Result<Option<String>, sqlx::Error> {
        const SQL: &str = "SELECT value FROM cal_metadata WHERE calendar_id = ? AND hash_id = ?;";

        let row: Option<(String,)> = sqlx::query_as(SQL)
            .bind(calendar_id)
            .bind(hash_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn delete(&self, calendar_id: &str, hash_id: &str) -> Result<(), sqlx::Error> {
        const SQL: &str = "DELETE FROM cal_metadata WHERE calendar_id = ? AND hash_id = ?;";

        sqlx::query(SQL)
            .bind(calendar_id)
            .bind(hash_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drops metadata whose item row no longer exists.
    pub async fn delete_orphans(&self, calendar_id: &str) -> Result<u64, sqlx::Error> {
        const SQL: &str = "\
DELETE FROM cal_metadata
WHERE calendar_id = ?
  AND hash_id NOT IN (SELECT hash_id FROM cal_items WHERE calendar_id = cal_metadata.calendar_id);
";

        let result = sqlx::query(SQL)
            .bind(calendar_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
