// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Entry point for local mutations, choosing between the remote and the offline path.

use crate::cached::Stores;
use crate::error::{StoreError, StoreResult};
use crate::item::{Item, OfflineFlag};

impl Stores {
    #[tracing::instrument(skip_all, fields(calendar = %self.calendar_id, item = %item.id))]
    pub(crate) async fn add_item(&self, item: &Item) -> StoreResult<Item> {
        if self.is_offline() {
            tracing::debug!("offline, adding item to the cache");
            return self.cache.add_offline_item(item).await;
        }

        match self.remote.add_item(item).await {
            Ok(added) => self.cache.add_item(&added).await,
            Err(e) if e.is_unavailable() => {
                tracing::info!(err = %e, "calendar is unavailable, adding item offline");
                self.cache.add_offline_item(item).await
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip_all, fields(calendar = %self.calendar_id, item = %new_item.id))]
    pub(crate) async fn modify_item(
        &self,
        new_item: &Item,
        old_item: Option<&Item>,
    ) -> StoreResult<Item> {
        if self.is_offline() {
            tracing::debug!("offline, modifying item in the cache");
            return self.cache.modify_offline_item(new_item, old_item).await;
        }

        let flag = self
            .cache
            .get_item_offline_flag(old_item.unwrap_or(new_item))
            .await?;
        if matches!(flag, OfflineFlag::Created | OfflineFlag::Modified) {
            tracing::debug!(%flag, "item is already offline, modifying it in the cache");
            return self.cache.modify_offline_item(new_item, old_item).await;
        }

        match self.remote.modify_item(new_item, old_item).await {
            Ok(modified) => {
                let stored = self.cache.modify_item(&modified, old_item).await?;
                if flag.is_pending() {
                    self.cache.reset_item_offline_flag(&stored).await?;
                }
                Ok(stored)
            }
            Err(e) if e.is_unavailable() => {
                tracing::info!(err = %e, "calendar is unavailable, modifying item offline");
                self.cache.modify_offline_item(new_item, old_item).await
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip_all, fields(calendar = %self.calendar_id, item = %item.id))]
    pub(crate) async fn delete_item(&self, item: &Item) -> StoreResult<()> {
        if self.is_offline() {
            tracing::debug!("offline, marking item deleted in the cache");
            return self.cache.delete_offline_item(item).await;
        }

        let flag = self.cache.get_item_offline_flag(item).await?;
        if matches!(flag, OfflineFlag::Created | OfflineFlag::Modified) {
            tracing::debug!(%flag, "item is already offline, marking it deleted in the cache");
            return self.cache.delete_offline_item(item).await;
        }

        match self.remote.delete_item(item).await {
            Ok(()) => {
                self.cache.delete_item(item).await?;
                match self.cache.delete_metadata(&item.hash_id()).await {
                    Ok(()) => {}
                    Err(StoreError::Unsupported(_)) => {
                        tracing::debug!("cache does not support metadata");
                    }
                    Err(e) => tracing::warn!(err = %e, "failed to delete item metadata"),
                }
                Ok(())
            }
            Err(e) if e.is_unavailable() => {
                tracing::info!(err = %e, "calendar is unavailable, deleting item offline");
                self.cache.delete_offline_item(item).await
            }
            Err(e) => Err(e),
        }
    }
}
