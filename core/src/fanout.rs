// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Re-emits cache and remote events to the observers of a cached calendar.
//!
//! The cache is authoritative for item changes. The remote store only contributes load,
//! error and property events; its item changes reach the application once the cache
//! mirrors them.

use std::sync::{Arc, Weak};

use crate::cached::CachedCalendar;
use crate::error::StoreError;
use crate::item::Item;
use crate::observer::{CalendarObserver, ObserverBag};

/// Observer registered on the local cache store.
pub(crate) struct CacheFanout {
    calendar_id: String,
    observers: Arc<ObserverBag>,
}

impl CacheFanout {
    pub(crate) fn new(calendar_id: impl Into<String>, observers: Arc<ObserverBag>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            observers,
        }
    }
}

impl CalendarObserver for CacheFanout {
    fn on_start_batch(&self) {
        self.observers.notify(|o| o.on_start_batch());
    }

    fn on_end_batch(&self) {
        self.observers.notify(|o| o.on_end_batch());
    }

    fn on_load(&self, _calendar_id: &str) {
        self.observers.notify(|o| o.on_load(&self.calendar_id));
    }

    fn on_add_item(&self, item: &Item) {
        self.observers.notify(|o| o.on_add_item(item));
    }

    fn on_modify_item(&self, new_item: &Item, old_item: Option<&Item>) {
        self.observers.notify(|o| o.on_modify_item(new_item, old_item));
    }

    fn on_delete_item(&self, item: &Item) {
        self.observers.notify(|o| o.on_delete_item(item));
    }

    fn on_error(&self, _calendar_id: &str, error: &StoreError) {
        self.observers
            .notify(|o| o.on_error(&self.calendar_id, error));
    }
}

/// Observer registered on the remote store.
pub(crate) struct RemoteFanout {
    home: Weak<CachedCalendar>,
}

impl RemoteFanout {
    pub(crate) fn new(home: Weak<CachedCalendar>) -> Self {
        Self { home }
    }

    fn with_home(&self, f: impl FnOnce(&Arc<CachedCalendar>)) {
        if let Some(home) = self.home.upgrade() {
            f(&home);
        }
    }
}

impl CalendarObserver for RemoteFanout {
    fn on_start_batch(&self) {
        self.with_home(|home| home.observers().notify(|o| o.on_start_batch()));
    }

    fn on_end_batch(&self) {
        self.with_home(|home| home.observers().notify(|o| o.on_end_batch()));
    }

    /// Starts a synchronize pass once the remote store has loaded, then fires a completing
    /// `on_load` for the cached calendar.
    fn on_load(&self, _calendar_id: &str) {
        self.with_home(|home| {
            let observers = home.observers().clone();
            let id = home.id().to_string();
            home.synchronize_with(move |status| {
                if let Err(e) = &status {
                    tracing::debug!(calendar = %id, err = %e, "sync after remote load failed");
                }
                observers.notify(|o| o.on_load(&id));
            });
        });
    }

    fn on_error(&self, _calendar_id: &str, error: &StoreError) {
        self.with_home(|home| {
            home.observers()
                .notify(|o| o.on_error(home.id(), error))
        });
    }

    fn on_property_changed(
        &self,
        _calendar_id: &str,
        name: &str,
        value: Option<&str>,
        old_value: Option<&str>,
    ) {
        self.with_home(|home| {
            home.observers()
                .notify(|o| o.on_property_changed(home.id(), name, value, old_value))
        });
    }

    fn on_property_deleting(&self, _calendar_id: &str, name: &str) {
        self.with_home(|home| {
            home.observers()
                .notify(|o| o.on_property_deleting(home.id(), name))
        });
    }
}
