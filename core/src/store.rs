// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Collaborator interfaces consumed by the cached calendar.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{StoreError, StoreResult, SyncStatus};
use crate::item::{DateRange, Item, ItemFilter, OfflineFlag};
use crate::observer::{CalendarObserver, ObserverId};

/// Channel end receiving batches of items from [`RemoteStore::get_items`].
pub type ItemSink = mpsc::UnboundedSender<Vec<Item>>;

/// The local mirror of a calendar, including per-item offline flags.
///
/// Plain mutations (`add_item`, `modify_item`) keep the offline flag of an existing row and
/// create new rows unflagged. The `*_offline_item` family records pending local edits.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Identifier of the calendar this cache mirrors.
    fn calendar_id(&self) -> &str;

    /// Inserts or replaces an item.
    async fn add_item(&self, item: &Item) -> StoreResult<Item>;

    /// Replaces an item.
    async fn modify_item(&self, new_item: &Item, old_item: Option<&Item>) -> StoreResult<Item>;

    /// Removes an item together with its offline flag.
    async fn delete_item(&self, item: &Item) -> StoreResult<()>;

    /// Looks up an item by its hash id, which equals the item id for non-recurring items.
    async fn get_item(&self, hash_id: &str) -> StoreResult<Option<Item>>;

    async fn get_items(&self, filter: ItemFilter, range: &DateRange) -> StoreResult<Vec<Item>>;

    /// Offline flag of the item; unknown items report [`OfflineFlag::None`].
    async fn get_item_offline_flag(&self, item: &Item) -> StoreResult<OfflineFlag>;

    async fn reset_item_offline_flag(&self, item: &Item) -> StoreResult<()>;

    /// Stores the item and flags it [`OfflineFlag::Created`].
    async fn add_offline_item(&self, item: &Item) -> StoreResult<Item>;

    /// Stores the item and flags it [`OfflineFlag::Modified`], unless it is already
    /// flagged created or deleted.
    async fn modify_offline_item(
        &self,
        new_item: &Item,
        old_item: Option<&Item>,
    ) -> StoreResult<Item>;

    /// Marks the item deleted. Items the remote side never saw are removed outright.
    async fn delete_offline_item(&self, item: &Item) -> StoreResult<()>;

    /// Discards every unflagged item. Rows with pending offline edits survive.
    async fn recreate(&self) -> StoreResult<()>;

    async fn get_metadata(&self, hash_id: &str) -> StoreResult<Option<String>> {
        let _ = hash_id;
        Err(StoreError::Unsupported("item metadata".into()))
    }

    async fn set_metadata(&self, hash_id: &str, value: &str) -> StoreResult<()> {
        let _ = (hash_id, value);
        Err(StoreError::Unsupported("item metadata".into()))
    }

    async fn delete_metadata(&self, hash_id: &str) -> StoreResult<()> {
        let _ = hash_id;
        Err(StoreError::Unsupported("item metadata".into()))
    }

    fn add_observer(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId;

    fn remove_observer(&self, id: ObserverId) -> bool;

    fn start_batch(&self);

    fn end_batch(&self);
}

/// The authoritative backing store of a calendar.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    /// Adds an item, returning the stored version.
    async fn add_item(&self, item: &Item) -> StoreResult<Item>;

    /// Modifies an item, returning the stored version.
    async fn modify_item(&self, new_item: &Item, old_item: Option<&Item>) -> StoreResult<Item>;

    async fn delete_item(&self, item: &Item) -> StoreResult<()>;

    /// Streams every matching item into `sink` in one or more batches.
    ///
    /// The returned status is final once the future resolves; the sink is dropped at that
    /// point, which closes the channel.
    async fn get_items(&self, filter: ItemFilter, range: &DateRange, sink: ItemSink)
    -> SyncStatus;

    fn can_refresh(&self) -> bool {
        false
    }

    /// Reloads the store. Implementations fire `on_load` on their observers when done.
    async fn refresh(&self) -> StoreResult<()> {
        Err(StoreError::Unsupported("refresh".into()))
    }

    /// The incremental synchronization capability, if the store has one.
    fn change_log(&self) -> Option<&dyn ChangeLog> {
        None
    }

    fn property(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }

    fn add_observer(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId;

    fn remove_observer(&self, id: ObserverId) -> bool;
}

/// Incremental synchronization performed by the remote store itself.
#[async_trait]
pub trait ChangeLog: Send + Sync {
    /// Applies every remote change since the last replay to `cache`.
    async fn replay_changes_on(&self, cache: Arc<dyn CacheStore>) -> SyncStatus;

    /// Forgets the replay position so the next replay starts with a full fetch.
    async fn reset_log(&self) -> StoreResult<()>;
}

/// The local change a conflict prompt is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    Modify,
    Delete,
}

impl ConflictAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictAction::Modify => "modify",
            ConflictAction::Delete => "delete",
        }
    }
}

/// Decides conflicts between a pending local edit and the remote state.
pub trait ConflictResolver: Send + Sync {
    /// Returns `true` to apply the local change anyway.
    ///
    /// `remote` is `None` when the item no longer exists on the remote side.
    fn prompt_overwrite(&self, action: ConflictAction, local: &Item, remote: Option<&Item>) -> bool;
}

/// Connectivity predicate, re-evaluated on every mutation and synchronize call.
pub trait Connectivity: Send + Sync {
    fn is_offline(&self) -> bool;
}

/// A connectivity flag toggled by the application.
#[derive(Debug, Default)]
pub struct NetworkStatus {
    offline: AtomicBool,
}

impl NetworkStatus {
    pub fn new(offline: bool) -> Self {
        Self {
            offline: AtomicBool::new(offline),
        }
    }

    /// Sets the flag, returning the previous value.
    pub fn set_offline(&self, offline: bool) -> bool {
        self.offline.swap(offline, Ordering::SeqCst)
    }
}

impl Connectivity for NetworkStatus {
    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}
