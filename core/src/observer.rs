// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::item::Item;

/// Receives change notifications from a calendar.
///
/// All methods default to doing nothing, so observers only implement what they need.
#[allow(unused_variables)]
pub trait CalendarObserver: Send + Sync {
    /// A batch of changes starts.
    fn on_start_batch(&self) {}

    /// A batch of changes ends.
    fn on_end_batch(&self) {}

    /// The calendar finished (re)loading its contents.
    fn on_load(&self, calendar_id: &str) {}

    /// An item was added.
    fn on_add_item(&self, item: &Item) {}

    /// An item was modified.
    fn on_modify_item(&self, new_item: &Item, old_item: Option<&Item>) {}

    /// An item was deleted.
    fn on_delete_item(&self, item: &Item) {}

    /// The calendar reported an error.
    fn on_error(&self, calendar_id: &str, error: &StoreError) {}

    /// A calendar property changed.
    fn on_property_changed(
        &self,
        calendar_id: &str,
        name: &str,
        value: Option<&str>,
        old_value: Option<&str>,
    ) {
    }

    /// A calendar property is about to be removed.
    fn on_property_deleting(&self, calendar_id: &str, name: &str) {}
}

/// Token returned by [`ObserverBag::add`], used to remove the observer again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registry of observers owned by a single calendar or store.
#[derive(Default)]
pub struct ObserverBag {
    next_id: AtomicU64,
    observers: Mutex<Vec<(ObserverId, Arc<dyn CalendarObserver>)>>,
}

impl ObserverBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. The same observer may be registered more than once.
    pub fn add(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    /// Removes an observer, returning whether it was registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|(a, _)| *a != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invokes `f` on every observer, in registration order.
    ///
    /// The registry is snapshotted first, so observers may add or remove observers
    /// while being notified.
    pub fn notify(&self, f: impl Fn(&dyn CalendarObserver)) {
        let observers: Vec<_> = self.lock().iter().map(|(_, o)| o.clone()).collect();
        for observer in observers {
            f(observer.as_ref());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ObserverId, Arc<dyn CalendarObserver>)>> {
        // a poisoned registry still holds a consistent list
        self.observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl fmt::Debug for ObserverBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverBag")
            .field("len", &self.len())
            .finish()
    }
}
