// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Test data factories and a ready-wired cached calendar.

use std::sync::Arc;

use calsync_core::{
    CacheStore, CachedCalendar, Config, DateRange, Item, ItemFilter, MemoryStore, NetworkStatus,
    OfflineFlag, RemoteStore,
};
use jiff::Timestamp;

use super::{RecordingObserver, ScriptedRemote, ScriptedResolver};

pub const CALENDAR_ID: &str = "cal";

/// Timestamp `secs` seconds after the epoch.
pub fn ts(secs: i64) -> Timestamp {
    Timestamp::from_second(secs).unwrap()
}

/// Item of the test calendar, titled after its id and modified at `secs`.
pub fn item(id: &str, secs: i64) -> Item {
    Item::with_id(id, CALENDAR_ID, id).modified_at(ts(secs))
}

/// A cached calendar over a scripted remote and a memory cache, online by default.
pub struct Harness {
    pub remote: Arc<ScriptedRemote>,
    pub cache: Arc<MemoryStore>,
    pub network: Arc<NetworkStatus>,
    pub resolver: Arc<ScriptedResolver>,
    pub observer: Arc<RecordingObserver>,
    pub calendar: Arc<CachedCalendar>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ScriptedRemote::new(CALENDAR_ID), Config::default())
    }

    /// A harness for another calendar, used by composite tests.
    pub fn named(id: &str) -> Self {
        Self::build(ScriptedRemote::new(id), Config::default())
    }

    pub fn build(remote: ScriptedRemote, config: Config) -> Self {
        let remote = Arc::new(remote);
        let cache = Arc::new(MemoryStore::new(RemoteStore::id(remote.as_ref())));
        let network = Arc::new(NetworkStatus::new(false));
        let resolver = Arc::new(ScriptedResolver::new(true));
        let observer = Arc::new(RecordingObserver::default());

        let calendar = CachedCalendar::new(
            remote.clone(),
            cache.clone(),
            network.clone(),
            resolver.clone(),
            config,
        );
        calendar.add_observer(observer.clone());

        Self {
            remote,
            cache,
            network,
            resolver,
            observer,
            calendar,
        }
    }

    pub fn go_offline(&self) {
        self.network.set_offline(true);
    }

    pub fn go_online(&self) {
        self.network.set_offline(false);
    }

    /// Puts an item on both sides, unflagged.
    pub async fn seed_synced(&self, item: &Item) {
        self.remote.seed([item.clone()]).await;
        CacheStore::add_item(self.cache.as_ref(), item).await.unwrap();
    }

    /// Caches an unflagged item the remote store does not have.
    pub async fn cache_only(&self, item: &Item) {
        CacheStore::add_item(self.cache.as_ref(), item).await.unwrap();
    }

    /// Caches an item the remote store has never seen.
    pub async fn seed_created(&self, item: &Item) {
        CacheStore::add_offline_item(self.cache.as_ref(), item)
            .await
            .unwrap();
    }

    /// Caches a local modification of `local`, with `remote` as the remote copy if any.
    pub async fn seed_modified(&self, local: &Item, remote: Option<&Item>) {
        if let Some(remote) = remote {
            self.remote.seed([remote.clone()]).await;
        }
        CacheStore::add_item(self.cache.as_ref(), local).await.unwrap();
        CacheStore::modify_offline_item(self.cache.as_ref(), local, None)
            .await
            .unwrap();
    }

    /// Caches a local deletion of `local`, with `remote` as the remote copy if any.
    pub async fn seed_deleted(&self, local: &Item, remote: Option<&Item>) {
        if let Some(remote) = remote {
            self.remote.seed([remote.clone()]).await;
        }
        CacheStore::add_item(self.cache.as_ref(), local).await.unwrap();
        CacheStore::delete_offline_item(self.cache.as_ref(), local)
            .await
            .unwrap();
    }

    pub async fn flag(&self, item: &Item) -> OfflineFlag {
        CacheStore::get_item_offline_flag(self.cache.as_ref(), item)
            .await
            .unwrap()
    }

    pub async fn cached(&self, id: &str) -> Option<Item> {
        CacheStore::get_item(self.cache.as_ref(), id).await.unwrap()
    }

    /// Ids of the items visible through the calendar, deleted ones excluded.
    pub async fn visible_ids(&self) -> Vec<String> {
        self.calendar
            .get_items(ItemFilter::All, &DateRange::all())
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect()
    }

    /// Ids of the cached items carrying `flag`.
    pub async fn flagged_ids(&self, flag: OfflineFlag) -> Vec<String> {
        CacheStore::get_items(
            self.cache.as_ref(),
            ItemFilter::offline(flag),
            &DateRange::all(),
        )
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect()
    }
}
