// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod items;
mod metadata;


use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{StoreError, StoreResult};
use crate::item::{DateRange, Item, ItemFilter, OfflineFlag};
use crate::localdb::items::{ItemRecord, Items};
use crate::localdb::metadata::Metadata;
use crate::observer::{CalendarObserver, ObserverBag, ObserverId};
use crate::store::CacheStore;

/// Local cache store backed by SQLite.
///
/// Several calendars may share one database file; every row is keyed by the calendar id.
#[derive(Debug)]
pub struct SqliteCache {
    calendar_id: String,
    pool: SqlitePool,
    items: Items,
    metadata: Metadata,
    observers: ObserverBag,
}

impl SqliteCache {
    /// Opens a sqlite database connection.
    /// If `filename` is `None`, it opens an in-memory database.
    #[tracing::instrument(skip(filename))]
    pub async fn open(filename: Option<&Path>, calendar_id: &str) -> StoreResult<Self> {
        let (options, pool_options) = if let Some(filename) = filename {
            tracing::info!(path = %filename.display(), "connecting to SQLite cache");
            let options = SqliteConnectOptions::new()
                .filename(filename)
                .create_if_missing(true);
            (options, SqlitePoolOptions::new())
        } else {
            tracing::info!("connecting to in-memory SQLite cache");
            // every connection to :memory: is a distinct database, so keep exactly one alive
            let pool_options = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            (SqliteConnectOptions::new().in_memory(true), pool_options)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to connect to SQLite cache: {e}")))?;

        sqlx::migrate!("src/localdb/migrations") // relative path from the crate root
            .run(&pool)
            .await?;

        tracing::debug!("cache tables ready");
        Ok(Self {
            calendar_id: calendar_id.to_string(),
            items: Items::new(pool.clone()),
            metadata: Metadata::new(pool.clone()),
            pool,
            observers: ObserverBag::new(),
        })
    }

    pub async fn close(self) {
        tracing::debug!(calendar = %self.calendar_id, "closing cache connection");
        self.pool.close().await;
    }

    async fn find(&self, hash_id: &str) -> StoreResult<Option<ItemRecord>> {
        Ok(self.items.get(&self.calendar_id, hash_id).await?)
    }

    async fn write(&self, item: &Item) -> StoreResult<Option<Item>> {
        let key = item.hash_id();
        let old = self.find(&key).await?.map(ItemRecord::into_item).transpose()?;
        let record = ItemRecord::from_item(&self.calendar_id, item, OfflineFlag::None);
        self.items.upsert(&record).await?;
        Ok(old)
    }

    fn notify_written(&self, item: &Item, old: Option<&Item>) {
        match old {
            Some(old) => self.observers.notify(|o| o.on_modify_item(item, Some(old))),
            None => self.observers.notify(|o| o.on_add_item(item)),
        }
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    async fn add_item(&self, item: &Item) -> StoreResult<Item> {
        let old = self.write(item).await?;
        self.notify_written(item, old.as_ref());
        Ok(item.clone())
    }

    async fn modify_item(&self, new_item: &Item, old_item: Option<&Item>) -> StoreResult<Item> {
        let replaced = self.write(new_item).await?;
        let old = old_item.or(replaced.as_ref());
        self.observers.notify(|o| o.on_modify_item(new_item, old));
        Ok(new_item.clone())
    }

    async fn delete_item(&self, item: &Item) -> StoreResult<()> {
        let key = item.hash_id();
        if self.items.delete(&self.calendar_id, &key).await? {
            self.metadata.delete(&self.calendar_id, &key).await?;
            self.observers.notify(|o| o.on_delete_item(item));
        }
        Ok(())
    }

    async fn get_item(&self, hash_id: &str) -> StoreResult<Option<Item>> {
        self.find(hash_id).await?.map(ItemRecord::into_item).transpose()
    }

    async fn get_items(&self, filter: ItemFilter, range: &DateRange) -> StoreResult<Vec<Item>> {
        let records = self.items.list(&self.calendar_id, filter).await?;
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let item = record.into_item()?;
            if item.in_range(range) {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn get_item_offline_flag(&self, item: &Item) -> StoreResult<OfflineFlag> {
        let flag = self.items.flag(&self.calendar_id, &item.hash_id()).await?;
        Ok(flag.map(OfflineFlag::from).unwrap_or_default())
    }

    async fn reset_item_offline_flag(&self, item: &Item) -> StoreResult<()> {
        self.items
            .set_flag(&self.calendar_id, &item.hash_id(), OfflineFlag::None)
            .await?;
        Ok(())
    }

    async fn add_offline_item(&self, item: &Item) -> StoreResult<Item> {
        let old = self.write(item).await?;
        self.items
            .set_flag(&self.calendar_id, &item.hash_id(), OfflineFlag::Created)
            .await?;
        self.notify_written(item, old.as_ref());
        Ok(item.clone())
    }

    async fn modify_offline_item(
        &self,
        new_item: &Item,
        old_item: Option<&Item>,
    ) -> StoreResult<Item> {
        let key = new_item.hash_id();
        let flag = self
            .find(&key)
            .await?
            .map(|record| record.flag())
            .unwrap_or_default();

        let replaced = self.write(new_item).await?;
        if matches!(flag, OfflineFlag::None | OfflineFlag::Modified) {
            self.items
                .set_flag(&self.calendar_id, &key, OfflineFlag::Modified)
                .await?;
        }

        let old = old_item.or(replaced.as_ref());
        self.observers.notify(|o| o.on_modify_item(new_item, old));
        Ok(new_item.clone())
    }

    async fn delete_offline_item(&self, item: &Item) -> StoreResult<()> {
        let key = item.hash_id();
        let known = match self.find(&key).await?.map(|record| record.flag()) {
            Some(OfflineFlag::Created) => {
                self.metadata.delete(&self.calendar_id, &key).await?;
                self.items.delete(&self.calendar_id, &key).await?
            }
            Some(_) => {
                self.items
                    .set_flag(&self.calendar_id, &key, OfflineFlag::Deleted)
                    .await?
            }
            None => false,
        };

        if known {
            self.observers.notify(|o| o.on_delete_item(item));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(calendar = %self.calendar_id))]
    async fn recreate(&self) -> StoreResult<()> {
        let removed = self.items.delete_synced(&self.calendar_id).await?;
        let orphans = self.metadata.delete_orphans(&self.calendar_id).await?;
        tracing::debug!(removed, orphans, "sqlite cache recreated");
        Ok(())
    }

    async fn get_metadata(&self, hash_id: &str) -> StoreResult<Option<String>> {
        Ok(self.metadata.get(&self.calendar_id, hash_id).await?)
    }

    async fn set_metadata(&self, hash_id: &str, value: &str) -> StoreResult<()> {
        Ok(self
            .metadata
            .upsert(&self.calendar_id, hash_id, value)
            .await?)
    }

    async fn delete_metadata(&self, hash_id: &str) -> StoreResult<()> {
        Ok(self.metadata.delete(&self.calendar_id, hash_id).await?)
    }

    fn add_observer(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    fn start_batch(&self) {
        self.observers.notify(|o| o.on_start_batch());
    }

    fn end_batch(&self) {
        self.observers.notify(|o| o.on_end_batch());
    }
}
