// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult, SyncStatus};
use crate::item::{DateRange, Item, ItemFilter, OfflineFlag};
use crate::observer::{CalendarObserver, ObserverBag, ObserverId};
use crate::store::{CacheStore, ItemSink, RemoteStore};

/// Volatile item store.
///
/// Serves as the `memory` cache type and as a simple remote store for tests and demos.
#[derive(Debug)]
pub struct MemoryStore {
    calendar_id: String,
    inner: Mutex<Inner>,
    observers: ObserverBag,
}

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<String, Item>,
    flags: HashMap<String, OfflineFlag>,
    metadata: HashMap<String, String>,
    properties: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            inner: Mutex::default(),
            observers: ObserverBag::new(),
        }
    }

    /// Creates a store holding `items`, all unflagged.
    pub fn with_items(calendar_id: impl Into<String>, items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new(calendar_id);
        {
            let mut inner = store.lock();
            for item in items {
                inner.items.insert(item.hash_id(), item);
            }
        }
        store
    }

    /// Sets a property reported through [`RemoteStore::property`].
    pub fn set_property(&self, name: &str, value: &str) {
        let old = self
            .lock()
            .properties
            .insert(name.to_string(), value.to_string());
        self.observers.notify(|o| {
            o.on_property_changed(&self.calendar_id, name, Some(value), old.as_deref())
        });
    }

    /// Removes a property.
    pub fn delete_property(&self, name: &str) {
        self.observers
            .notify(|o| o.on_property_deleting(&self.calendar_id, name));
        self.lock().properties.remove(name);
    }

    /// Number of items held, regardless of their flags.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Fires `on_load` on the observers.
    pub fn notify_load(&self) {
        self.observers.notify(|o| o.on_load(&self.calendar_id));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flag_of(inner: &Inner, hash_id: &str) -> OfflineFlag {
        inner.flags.get(hash_id).copied().unwrap_or_default()
    }

    fn set_flag(inner: &mut Inner, hash_id: String, flag: OfflineFlag) {
        if flag.is_pending() {
            inner.flags.insert(hash_id, flag);
        } else {
            inner.flags.remove(&hash_id);
        }
    }

    /// Inserts or replaces, returning the replaced item.
    fn upsert(&self, item: &Item) -> Option<Item> {
        self.lock().items.insert(item.hash_id(), item.clone())
    }

    fn remove(&self, hash_id: &str) -> Option<Item> {
        let mut inner = self.lock();
        inner.flags.remove(hash_id);
        inner.metadata.remove(hash_id);
        inner.items.remove(hash_id)
    }

    fn select(&self, filter: ItemFilter, range: &DateRange) -> Vec<Item> {
        let inner = self.lock();
        inner
            .items
            .iter()
            .filter(|(key, _)| filter.matches(Self::flag_of(&inner, key)))
            .filter(|(_, item)| item.in_range(range))
            .map(|(_, item)| item.clone())
            .collect()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    async fn add_item(&self, item: &Item) -> StoreResult<Item> {
        match self.upsert(item) {
            Some(old) => self.observers.notify(|o| o.on_modify_item(item, Some(&old))),
            None => self.observers.notify(|o| o.on_add_item(item)),
        }
        Ok(item.clone())
    }

    async fn modify_item(&self, new_item: &Item, old_item: Option<&Item>) -> StoreResult<Item> {
        let replaced = self.upsert(new_item);
        let old = old_item.or(replaced.as_ref());
        self.observers.notify(|o| o.on_modify_item(new_item, old));
        Ok(new_item.clone())
    }

    async fn delete_item(&self, item: &Item) -> StoreResult<()> {
        if self.remove(&item.hash_id()).is_some() {
            self.observers.notify(|o| o.on_delete_item(item));
        }
        Ok(())
    }

    async fn get_item(&self, hash_id: &str) -> StoreResult<Option<Item>> {
        Ok(self.lock().items.get(hash_id).cloned())
    }

    async fn get_items(&self, filter: ItemFilter, range: &DateRange) -> StoreResult<Vec<Item>> {
        Ok(self.select(filter, range))
    }

    async fn get_item_offline_flag(&self, item: &Item) -> StoreResult<OfflineFlag> {
        Ok(Self::flag_of(&self.lock(), &item.hash_id()))
    }

    async fn reset_item_offline_flag(&self, item: &Item) -> StoreResult<()> {
        self.lock().flags.remove(&item.hash_id());
        Ok(())
    }

    async fn add_offline_item(&self, item: &Item) -> StoreResult<Item> {
        let replaced = {
            let mut inner = self.lock();
            let key = item.hash_id();
            Self::set_flag(&mut inner, key.clone(), OfflineFlag::Created);
            inner.items.insert(key, item.clone())
        };
        match replaced {
            Some(old) => self.observers.notify(|o| o.on_modify_item(item, Some(&old))),
            None => self.observers.notify(|o| o.on_add_item(item)),
        }
        Ok(item.clone())
    }

    async fn modify_offline_item(
        &self,
        new_item: &Item,
        old_item: Option<&Item>,
    ) -> StoreResult<Item> {
        let replaced = {
            let mut inner = self.lock();
            let key = new_item.hash_id();
            match Self::flag_of(&inner, &key) {
                OfflineFlag::Created | OfflineFlag::Deleted => {}
                OfflineFlag::None | OfflineFlag::Modified => {
                    Self::set_flag(&mut inner, key.clone(), OfflineFlag::Modified)
                }
            }
            inner.items.insert(key, new_item.clone())
        };
        let old = old_item.or(replaced.as_ref());
        self.observers.notify(|o| o.on_modify_item(new_item, old));
        Ok(new_item.clone())
    }

    async fn delete_offline_item(&self, item: &Item) -> StoreResult<()> {
        let key = item.hash_id();
        let known = {
            let mut inner = self.lock();
            if Self::flag_of(&inner, &key) == OfflineFlag::Created {
                inner.flags.remove(&key);
                inner.metadata.remove(&key);
                inner.items.remove(&key).is_some()
            } else if inner.items.contains_key(&key) {
                Self::set_flag(&mut inner, key, OfflineFlag::Deleted);
                true
            } else {
                false
            }
        };
        if known {
            self.observers.notify(|o| o.on_delete_item(item));
        }
        Ok(())
    }

    async fn recreate(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        let Inner {
            items,
            flags,
            metadata,
            ..
        } = &mut *inner;
        items.retain(|key, _| flags.contains_key(key));
        metadata.retain(|key, _| items.contains_key(key));
        tracing::debug!(calendar = %self.calendar_id, kept = items.len(), "memory cache recreated");
        Ok(())
    }

    async fn get_metadata(&self, hash_id: &str) -> StoreResult<Option<String>> {
        Ok(self.lock().metadata.get(hash_id).cloned())
    }

    async fn set_metadata(&self, hash_id: &str, value: &str) -> StoreResult<()> {
        self.lock()
            .metadata
            .insert(hash_id.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_metadata(&self, hash_id: &str) -> StoreResult<()> {
        self.lock().metadata.remove(hash_id);
        Ok(())
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

#[async_trait]
impl RemoteStore for MemoryStore {
    fn id(&self) -> &str {
        &self.calendar_id
    }

    async fn add_item(&self, item: &Item) -> StoreResult<Item> {
        let key = item.hash_id();
        {
            let mut inner = self.lock();
            if inner.items.contains_key(&key) {
                return Err(StoreError::Rejected(format!("item {key} already exists")));
            }
            inner.items.insert(key, item.clone());
        }
        self.observers.notify(|o| o.on_add_item(item));
        Ok(item.clone())
    }

    async fn modify_item(&self, new_item: &Item, old_item: Option<&Item>) -> StoreResult<Item> {
        let key = new_item.hash_id();
        let replaced = {
            let mut inner = self.lock();
            if !inner.items.contains_key(&key) {
                return Err(StoreError::NotFound(key));
            }
            inner.items.insert(key, new_item.clone())
        };
        let old = old_item.or(replaced.as_ref());
        self.observers.notify(|o| o.on_modify_item(new_item, old));
        Ok(new_item.clone())
    }

    async fn delete_item(&self, item: &Item) -> StoreResult<()> {
        let key = item.hash_id();
        if self.remove(&key).is_none() {
            return Err(StoreError::NotFound(key));
        }
        self.observers.notify(|o| o.on_delete_item(item));
        Ok(())
    }

    async fn get_items(
        &self,
        filter: ItemFilter,
        range: &DateRange,
        sink: ItemSink,
    ) -> SyncStatus {
        let items = self.select(filter, range);
        if !items.is_empty() && sink.send(items).is_err() {
            tracing::debug!(calendar = %self.calendar_id, "item receiver dropped");
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Option<String> {
        self.lock().properties.get(name).cloned()
    }

    fn add_observer(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }
}
