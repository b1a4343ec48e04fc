// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Scripted remote store recording every call it receives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calsync_core::{
    CacheStore, CalendarObserver, ChangeLog, DateRange, Item, ItemFilter, ItemSink, MemoryStore,
    ObserverId, RemoteStore, StoreError, StoreResult, SyncStatus,
};
use tokio::sync::{Notify, Semaphore};

type Hook = Box<dyn Fn() + Send + Sync>;

/// Remote store backed by a [`MemoryStore`], with failure injection and a call trace.
///
/// Trace entries look like `add:e1`, `modify:e1`, `delete:e1`, `get_items` and `refresh`.
pub struct ScriptedRemote {
    store: MemoryStore,
    trace: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, StoreError>>,
    hooks: Mutex<HashMap<String, Hook>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    fetch_started: Notify,
    batch_size: usize,
    refreshable: bool,
    change_log: Option<ScriptedChangeLog>,
}

impl ScriptedRemote {
    pub fn new(id: &str) -> Self {
        Self {
            store: MemoryStore::new(id),
            trace: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            hooks: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
            fetch_started: Notify::new(),
            batch_size: 2,
            refreshable: false,
            change_log: None,
        }
    }

    /// A remote that can reload itself and fires `on_load` when done.
    pub fn refreshable(mut self) -> Self {
        self.refreshable = true;
        self
    }

    /// A remote that synchronizes through its own change log.
    pub fn with_change_log(mut self, log: ScriptedChangeLog) -> Self {
        self.change_log = Some(log);
        self
    }

    /// Puts items on the remote side without recording a call.
    pub async fn seed(&self, items: impl IntoIterator<Item = Item>) {
        for item in items {
            CacheStore::add_item(&self.store, &item).await.unwrap();
        }
    }

    pub async fn get(&self, id: &str) -> Option<Item> {
        CacheStore::get_item(&self.store, id).await.unwrap()
    }

    pub fn trace(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }

    pub fn clear_trace(&self) {
        self.trace.lock().unwrap().clear();
    }

    /// Number of trace entries starting with `prefix`.
    pub fn calls(&self, prefix: &str) -> usize {
        self.trace
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.starts_with(prefix))
            .count()
    }

    /// Makes every call with the given trace key fail until cleared.
    pub fn fail(&self, key: &str, error: StoreError) {
        self.failures.lock().unwrap().insert(key.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Runs `hook` right after a call with the given trace key succeeds.
    pub fn after(&self, key: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .insert(key.to_string(), Box::new(hook));
    }

    /// Blocks fetches until a permit is added to the returned semaphore.
    pub fn hold_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a fetch has started.
    pub async fn fetch_started(&self) {
        self.fetch_started.notified().await;
    }

    fn call(&self, key: String) -> StoreResult<()> {
        let failure = self.failures.lock().unwrap().get(&key).cloned();
        self.trace.lock().unwrap().push(key);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn succeeded(&self, key: &str) {
        if let Some(hook) = self.hooks.lock().unwrap().get(key) {
            hook();
        }
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    fn id(&self) -> &str {
        CacheStore::calendar_id(&self.store)
    }

    async fn add_item(&self, item: &Item) -> StoreResult<Item> {
        let key = format!("add:{}", item.id);
        self.call(key.clone())?;
        let added = RemoteStore::add_item(&self.store, item).await?;
        self.succeeded(&key);
        Ok(added)
    }

    async fn modify_item(&self, new_item: &Item, old_item: Option<&Item>) -> StoreResult<Item> {
        let key = format!("modify:{}", new_item.id);
        self.call(key.clone())?;
        let modified = RemoteStore::modify_item(&self.store, new_item, old_item).await?;
        self.succeeded(&key);
        Ok(modified)
    }

    async fn delete_item(&self, item: &Item) -> StoreResult<()> {
        let key = format!("delete:{}", item.id);
        self.call(key.clone())?;
        RemoteStore::delete_item(&self.store, item).await?;
        self.succeeded(&key);
        Ok(())
    }

    async fn get_items(&self, filter: ItemFilter, range: &DateRange, sink: ItemSink) -> SyncStatus {
        self.fetch_started.notify_one();
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }

        self.call("get_items".to_string())?;
        let items = CacheStore::get_items(&self.store, filter, range).await?;
        for batch in items.chunks(self.batch_size) {
            if sink.send(batch.to_vec()).is_err() {
                break;
            }
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    fn can_refresh(&self) -> bool {
        self.refreshable
    }

    async fn refresh(&self) -> StoreResult<()> {
        self.call("refresh".to_string())?;
        self.store.notify_load();
        Ok(())
    }

    fn change_log(&self) -> Option<&dyn ChangeLog> {
        self.change_log.as_ref().map(|a| a as &dyn ChangeLog)
    }

    fn property(&self, name: &str) -> Option<String> {
        RemoteStore::property(&self.store, name)
    }

    fn add_observer(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId {
        RemoteStore::add_observer(&self.store, observer)
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        RemoteStore::remove_observer(&self.store, id)
    }
}

impl ScriptedRemote {
    pub fn log(&self) -> &ScriptedChangeLog {
        self.change_log.as_ref().expect("remote has no change log")
    }

    /// Sets a remote property, notifying observers.
    pub fn set_property(&self, name: &str, value: &str) {
        self.store.set_property(name, value);
    }
}

/// Change log applying a fixed list of remote changes on every replay.
#[derive(Default)]
pub struct ScriptedChangeLog {
    changes: Vec<Item>,
    failure: Option<StoreError>,
    replays: AtomicUsize,
    resets: AtomicUsize,
}

impl ScriptedChangeLog {
    pub fn new(changes: Vec<Item>) -> Self {
        Self {
            changes,
            ..Default::default()
        }
    }

    pub fn failing(error: StoreError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    pub fn replays(&self) -> usize {
        self.replays.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeLog for ScriptedChangeLog {
    async fn replay_changes_on(&self, cache: Arc<dyn CacheStore>) -> SyncStatus {
        self.replays.fetch_add(1, Ordering::SeqCst);
        for item in &self.changes {
            cache.add_item(item).await?;
        }
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn reset_log(&self) -> StoreResult<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
