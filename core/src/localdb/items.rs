// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use jiff::Timestamp;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::item::{Item, ItemFilter, OfflineFlag};

#[derive(Debug, Clone)]
pub struct Items {
    pool: SqlitePool,
}

impl Items {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a row. The offline flag of an existing row is kept.
    pub async fn upsert(&self, record: &ItemRecord) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
INSERT INTO cal_items (calendar_id, hash_id, id, recurrence_id, title, start, end, last_modified, data, offline_flag)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(calendar_id, hash_id) DO UPDATE SET
    id            = excluded.id,
    recurrence_id = excluded.recurrence_id,
    title         = excluded.title,
    start         = excluded.start,
    end           = excluded.end,
    last_modified = excluded.last_modified,
    data          = excluded.data;
";

        sqlx::query(SQL)
            .bind(&record.calendar_id)
            .bind(&record.hash_id)
            .bind(&record.id)
            .bind(&record.recurrence_id)
            .bind(&record.title)
            .bind(&record.start)
            .bind(&record.end)
            .bind(&record.last_modified)
            .bind(&record.data)
            .bind(record.offline_flag)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get(
        &self,
        calendar_id: &str,
        hash_id: &str,
    ) -> Result<Option<ItemRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT calendar_id, hash_id, id, recurrence_id, title, start, end, last_modified, data, offline_flag
FROM cal_items
WHERE calendar_id = ? AND hash_id = ?;
";

        sqlx::query_as(SQL)
            .bind(calendar_id)
            .bind(hash_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(
        &self,
        calendar_id: &str,
        filter: ItemFilter,
    ) -> Result<Vec<ItemRecord>, sqlx::Error> {
        let mut sql = "\
SELECT calendar_id, hash_id, id, recurrence_id, title, start, end, last_modified, data, offline_flag
FROM cal_items
WHERE calendar_id = ? "
            .to_string();
        sql += match filter {
            ItemFilter::All => "AND offline_flag != ? ",
            _ => "AND offline_flag = ? ",
        };
        sql += "ORDER BY hash_id ASC;";

        let flag = match filter {
            ItemFilter::All => OfflineFlag::Deleted,
            ItemFilter::OfflineCreated => OfflineFlag::Created,
            ItemFilter::OfflineModified => OfflineFlag::Modified,
            ItemFilter::OfflineDeleted => OfflineFlag::Deleted,
        };

        sqlx::query_as(&sql)
            .bind(calendar_id)
            .bind(u8::from(flag))
            .fetch_all(&self.pool)
            .await
    }

    /// Offline flag of a row, `None` when the row does not exist.
    pub async fn flag(&self, calendar_id: &str, hash_id: &str) -> Result<Option<u8>, sqlx::Error> {
        const SQL: &str = "SELECT offline_flag FROM cal_items WHERE calendar_id = ? AND hash_id = ?;";

        let row: Option<(u8,)> = sqlx::query_as(SQL)
            .bind(calendar_id)
            .bind(hash_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(flag,)| flag))
    }

    /// Sets the flag of an existing row, returning whether a row was updated.
    pub async fn set_flag(
        &self,
        calendar_id: &str,
        hash_id: &str,
        flag: OfflineFlag,
    ) -> Result<bool, sqlx::Error> {
        const SQL: &str =
            "UPDATE cal_items SET offline_flag = ? WHERE calendar_id = ? AND hash_id = ?;";

        let result = sqlx::query(SQL)
            .bind(u8::from(flag))
            .bind(calendar_id)
            .bind(hash_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes a row, returning whether it existed.
    pub async fn delete(&self, calendar_id: &str, hash_id: &str) -> Result<bool, sqlx::Error> {
        const SQL: &str = "DELETE FROM cal_items WHERE calendar_id = ? AND hash_id = ?;";

        let result = sqlx::query(SQL)
            .bind(calendar_id)
            .bind(hash_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every unflagged row of a calendar.
    pub async fn delete_synced(&self, calendar_id: &str) -> Result<u64, sqlx::Error> {
        const SQL: &str = "DELETE FROM cal_items WHERE calendar_id = ? AND offline_flag = 0;";

        let result = sqlx::query(SQL)
            .bind(calendar_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ItemRecord {
    calendar_id: String,
    hash_id: String,
    id: String,
    recurrence_id: Option<String>,
    title: String,
    start: Option<String>,
    end: Option<String>,
    last_modified: String,
    data: String,
    offline_flag: u8,
}

impl ItemRecord {
    pub fn from_item(calendar_id: &str, item: &Item, flag: OfflineFlag) -> Self {
        Self {
            calendar_id: calendar_id.to_string(),
            hash_id: item.hash_id(),
            id: item.id.clone(),
            recurrence_id: item.recurrence_id.clone(),
            title: item.title.clone(),
            start: item.start.map(|a| a.to_string()),
            end: item.end.map(|a| a.to_string()),
            last_modified: item.last_modified.to_string(),
            data: item.data.clone(),
            offline_flag: flag.into(),
        }
    }

    pub fn flag(&self) -> OfflineFlag {
        self.offline_flag.into()
    }

    /// Converts the row back into an item, stamped with the owning calendar.
    pub fn into_item(self) -> Result<Item, StoreError> {
        Ok(Item {
            id: self.id,
            recurrence_id: self.recurrence_id,
            calendar_id: self.calendar_id,
            title: self.title,
            start: self.start.as_deref().map(parse_timestamp).transpose()?,
            end: self.end.as_deref().map(parse_timestamp).transpose()?,
            last_modified: parse_timestamp(&self.last_modified)?,
            data: self.data,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<Timestamp, StoreError> {
    s.parse()
        .map_err(|e| StoreError::Storage(format!("Invalid timestamp in cache row: {s}: {e}")))
}
