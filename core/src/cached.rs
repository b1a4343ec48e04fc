// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{CacheType, Config};
use crate::error::{StoreError, StoreResult, SyncStatus};
use crate::fanout::{CacheFanout, RemoteFanout};
use crate::item::{DateRange, Item, ItemFilter};
use crate::observer::{CalendarObserver, ObserverBag, ObserverId};
use crate::store::{CacheStore, ConflictResolver, Connectivity, RemoteStore};
use crate::sync::{Enqueued, PlaybackReport, SyncCallback, SyncCoordinator, SyncOperation};

/// Collaborators shared by the gateway, the reconciler and the playback engine.
pub(crate) struct Stores {
    pub(crate) calendar_id: String,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) cache: Arc<dyn CacheStore>,
    pub(crate) connectivity: Arc<dyn Connectivity>,
    pub(crate) resolver: Arc<dyn ConflictResolver>,
    pub(crate) observers: Arc<ObserverBag>,
}

impl Stores {
    pub(crate) fn is_offline(&self) -> bool {
        self.connectivity.is_offline()
    }

    pub(crate) fn notify_load(&self) {
        self.observers.notify(|o| o.on_load(&self.calendar_id));
    }
}

/// A calendar whose remote store is mirrored by a local cache.
///
/// Reads are served from the cache. Mutations go to the remote store while it is reachable
/// and are recorded as offline edits otherwise; [`CachedCalendar::synchronize`] brings both
/// sides back in line.
pub struct CachedCalendar {
    stores: Stores,
    config: Config,
    coordinator: SyncCoordinator,
    cache_observer: Mutex<Option<ObserverId>>,
    remote_observer: Mutex<Option<ObserverId>>,
}

impl CachedCalendar {
    /// Wraps `remote` with `cache` and registers the observer fanout on both.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn CacheStore>,
        connectivity: Arc<dyn Connectivity>,
        resolver: Arc<dyn ConflictResolver>,
        config: Config,
    ) -> Arc<Self> {
        Arc::new_cyclic(|home| {
            let calendar_id = remote.id().to_string();
            let observers = Arc::new(ObserverBag::new());

            let cache_observer =
                cache.add_observer(Arc::new(CacheFanout::new(&calendar_id, observers.clone())));
            let remote_observer = remote.add_observer(Arc::new(RemoteFanout::new(home.clone())));

            Self {
                stores: Stores {
                    calendar_id,
                    remote,
                    cache,
                    connectivity,
                    resolver,
                    observers,
                },
                config,
                coordinator: SyncCoordinator::default(),
                cache_observer: Mutex::new(Some(cache_observer)),
                remote_observer: Mutex::new(Some(remote_observer)),
            }
        })
    }

    /// Opens the cache described by `config` and wraps `remote` with it.
    #[tracing::instrument(skip_all, fields(calendar = remote.id()))]
    pub async fn open(
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<dyn Connectivity>,
        resolver: Arc<dyn ConflictResolver>,
        config: Config,
    ) -> StoreResult<Arc<Self>> {
        let cache = config.open_cache(remote.id()).await?;
        if config.cache_type == CacheType::Memory
            && let Some(log) = remote.change_log()
        {
            // a fresh volatile cache needs a full replay
            log.reset_log().await?;
        }
        tracing::info!(cache_type = ?config.cache_type, "cached calendar opened");
        Ok(Self::new(remote, cache, connectivity, resolver, config))
    }

    pub fn id(&self) -> &str {
        &self.stores.calendar_id
    }

    pub fn name(&self) -> &str {
        self.stores.remote.name()
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.stores.cache
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.stores.remote
    }

    pub fn is_offline(&self) -> bool {
        self.stores.is_offline()
    }

    /// Whether the remote store replays its own change log.
    pub fn supports_change_log(&self) -> bool {
        self.stores.remote.change_log().is_some()
    }

    /// A disabled calendar never synchronizes.
    pub fn is_disabled(&self) -> bool {
        self.config.disabled || self.property("disabled").is_some_and(|a| a == "true")
    }

    /// Reads a calendar property. `cache.enabled` is forced on by `cache_always`.
    pub fn property(&self, name: &str) -> Option<String> {
        if name == "cache.enabled"
            && (self.config.cache_always
                || self
                    .stores
                    .remote
                    .property("cache.always")
                    .is_some_and(|a| a == "true"))
        {
            return Some("true".to_string());
        }
        self.stores.remote.property(name)
    }

    pub(crate) fn observers(&self) -> &Arc<ObserverBag> {
        &self.stores.observers
    }

    pub fn add_observer(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId {
        self.stores.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.stores.observers.remove(id)
    }

    /// Adds an item, falling back to an offline write when the remote is unreachable.
    pub async fn add_item(&self, item: &Item) -> StoreResult<Item> {
        self.stores.add_item(item).await
    }

    pub async fn modify_item(&self, new_item: &Item, old_item: Option<&Item>) -> StoreResult<Item> {
        self.stores.modify_item(new_item, old_item).await
    }

    pub async fn delete_item(&self, item: &Item) -> StoreResult<()> {
        self.stores.delete_item(item).await
    }

    pub async fn get_item(&self, hash_id: &str) -> StoreResult<Option<Item>> {
        self.stores.cache.get_item(hash_id).await
    }

    pub async fn get_items(&self, filter: ItemFilter, range: &DateRange) -> StoreResult<Vec<Item>> {
        self.stores.cache.get_items(filter, range).await
    }

    pub fn start_batch(&self) {
        self.stores.cache.start_batch();
    }

    pub fn end_batch(&self) {
        self.stores.cache.end_batch();
    }

    /// Requests a synchronization and invokes `callback` with its terminal status.
    ///
    /// Requests made while one is in flight join it. A disabled or offline calendar
    /// completes every waiting request with success right away.
    ///
    /// Must be called within a Tokio runtime.
    pub fn synchronize_with<F>(self: &Arc<Self>, callback: F) -> SyncOperation
    where
        F: FnOnce(SyncStatus) + Send + 'static,
    {
        let callback: SyncCallback = Box::new(callback);
        if self.is_disabled() || self.is_offline() {
            tracing::debug!(calendar = %self.id(), "disabled or offline, sync completes immediately");
            let status = Ok(());
            self.coordinator.drain(&status);
            callback(status);
            return self
                .coordinator
                .current()
                .unwrap_or_else(SyncOperation::completed);
        }

        match self.coordinator.enqueue(callback) {
            Enqueued::Joined(op) => op,
            Enqueued::Start(op) => {
                let this = Arc::clone(self);
                let token = op.token();
                let op_id = op.id();
                tokio::spawn(async move {
                    let status = tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(StoreError::Cancelled),
                        status = this.stores.run_sync() => status,
                    };
                    this.coordinator.complete(op_id, status);
                });
                op
            }
        }
    }

    /// Requests a synchronization and waits for its terminal status.
    pub async fn synchronize(self: &Arc<Self>) -> SyncStatus {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.synchronize_with(move |status| {
            let _ = tx.send(status);
        });
        rx.await.unwrap_or(Err(StoreError::Cancelled))
    }

    /// The synchronization in flight, if any.
    pub fn pending_sync(&self) -> Option<SyncOperation> {
        self.coordinator.current()
    }

    /// Cancels the synchronization in flight. Its waiting requests complete with
    /// [`StoreError::Cancelled`] and the next request starts a fresh one.
    pub fn cancel_sync(&self) -> bool {
        self.coordinator.cancel()
    }

    /// Replays pending offline edits against the remote store.
    pub async fn playback_offline_items(&self) -> PlaybackReport {
        self.stores.playback(&HashSet::new()).await
    }

    pub fn can_refresh(&self) -> bool {
        true
    }

    /// Reloads the calendar, pushing pending offline edits first when the remote keeps a
    /// change log.
    #[tracing::instrument(skip(self), fields(calendar = %self.id()))]
    pub async fn refresh(self: &Arc<Self>) -> StoreResult<()> {
        if !self.is_offline() && self.supports_change_log() {
            let report = self.playback_offline_items().await;
            tracing::debug!(?report, "offline items played back before refresh");
        }
        self.downstream_refresh().await
    }

    async fn downstream_refresh(self: &Arc<Self>) -> StoreResult<()> {
        if self.stores.remote.can_refresh() && !self.is_offline() {
            // the remote fires on_load when done, which starts a sync
            self.stores.remote.refresh().await
        } else {
            let status = self.synchronize().await;
            self.stores.notify_load();
            status
        }
    }

    /// Going online refreshes the calendar; going offline does nothing.
    pub async fn on_offline_status_changed(self: &Arc<Self>, offline: bool) -> StoreResult<()> {
        if offline {
            tracing::debug!(calendar = %self.id(), "going offline");
            return Ok(());
        }
        tracing::info!(calendar = %self.id(), "back online, replaying changes");
        self.refresh().await
    }

    /// Discards the cached copy and synchronizes from scratch. Pending offline edits survive.
    #[tracing::instrument(skip(self), fields(calendar = %self.id()))]
    pub async fn reset_cache(self: &Arc<Self>) -> SyncStatus {
        self.cancel_sync();
        self.stores.cache.recreate().await?;
        if let Some(log) = self.stores.remote.change_log() {
            log.reset_log().await?;
        }
        self.synchronize().await
    }

    /// Detaches the calendar from both stores and releases the cached items.
    #[tracing::instrument(skip(self), fields(calendar = %self.id()))]
    pub async fn unregister(&self) -> StoreResult<()> {
        self.cancel_sync();
        if let Some(id) = take(&self.cache_observer) {
            self.stores.cache.remove_observer(id);
        }
        if let Some(id) = take(&self.remote_observer) {
            self.stores.remote.remove_observer(id);
        }
        self.stores.cache.recreate().await
    }
}

fn take(slot: &Mutex<Option<ObserverId>>) -> Option<ObserverId> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl fmt::Debug for CachedCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCalendar")
            .field("id", &self.stores.calendar_id)
            .field("config", &self.config)
            .field("syncing", &self.coordinator.current().is_some())
            .finish_non_exhaustive()
    }
}
