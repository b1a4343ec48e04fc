// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;

use crate::cached::CachedCalendar;
use crate::error::{StoreError, StoreResult, SyncStatus};
use crate::item::{DateRange, Item, ItemFilter};
use crate::observer::{CalendarObserver, ObserverBag, ObserverId};

/// Aggregate view over several cached calendars.
///
/// Synchronizing the composite supersedes every member's own synchronization.
pub struct CompositeCalendar {
    id: String,
    members: Mutex<Vec<Member>>,
    observers: Arc<ObserverBag>,
}

struct Member {
    calendar: Arc<CachedCalendar>,
    observer: ObserverId,
}

impl CompositeCalendar {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            members: Mutex::default(),
            observers: Arc::new(ObserverBag::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds a member, returning `false` if a calendar with the same id is already present.
    pub fn add_calendar(&self, calendar: Arc<CachedCalendar>) -> bool {
        let mut members = self.lock();
        if members.iter().any(|a| a.calendar.id() == calendar.id()) {
            return false;
        }

        let observer = calendar.add_observer(Arc::new(MemberFanout {
            observers: self.observers.clone(),
        }));
        tracing::debug!(composite = %self.id, calendar = %calendar.id(), "calendar added");
        members.push(Member { calendar, observer });
        true
    }

    pub fn remove_calendar(&self, id: &str) -> Option<Arc<CachedCalendar>> {
        let mut members = self.lock();
        let index = members.iter().position(|a| a.calendar.id() == id)?;
        let member = members.remove(index);
        member.calendar.remove_observer(member.observer);
        tracing::debug!(composite = %self.id, calendar = %id, "calendar removed");
        Some(member.calendar)
    }

    pub fn calendars(&self) -> Vec<Arc<CachedCalendar>> {
        self.lock().iter().map(|a| a.calendar.clone()).collect()
    }

    pub fn add_observer(&self, observer: Arc<dyn CalendarObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Cancels every member's synchronization in flight, then synchronizes all members.
    ///
    /// Reports the first failure in member order.
    #[tracing::instrument(skip(self), fields(composite = %self.id))]
    pub async fn synchronize(&self) -> SyncStatus {
        let calendars = self.calendars();
        for calendar in &calendars {
            if calendar.cancel_sync() {
                tracing::debug!(calendar = %calendar.id(), "superseded member sync cancelled");
            }
        }

        let results = join_all(calendars.iter().map(|a| a.synchronize())).await;
        first_error(results)
    }

    /// Refreshes every enabled member and fires one `on_load` for the composite.
    #[tracing::instrument(skip(self), fields(composite = %self.id))]
    pub async fn refresh(&self) -> StoreResult<()> {
        let calendars: Vec<_> = self
            .calendars()
            .into_iter()
            .filter(|a| !a.is_disabled())
            .collect();

        let results = join_all(calendars.iter().map(|a| a.refresh())).await;
        self.observers.notify(|o| o.on_load(&self.id));
        first_error(results)
    }

    /// Items of every member, in member order.
    pub async fn get_items(&self, filter: ItemFilter, range: &DateRange) -> StoreResult<Vec<Item>> {
        let calendars = self.calendars();
        let results = join_all(calendars.iter().map(|a| a.get_items(filter, range))).await;

        let mut items = Vec::new();
        for result in results {
            items.extend(result?);
        }
        Ok(items)
    }

    pub fn start_batch(&self) {
        self.observers.notify(|o| o.on_start_batch());
    }

    pub fn end_batch(&self) {
        self.observers.notify(|o| o.on_end_batch());
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Member>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn first_error(results: Vec<SyncStatus>) -> SyncStatus {
    results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
}

impl fmt::Debug for CompositeCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<String> = self
            .lock()
            .iter()
            .map(|a| a.calendar.id().to_string())
            .collect();
        f.debug_struct("CompositeCalendar")
            .field("id", &self.id)
            .field("members", &members)
            .finish()
    }
}

/// Forwards member batch and item events to the composite observers.
struct MemberFanout {
    observers: Arc<ObserverBag>,
}

impl CalendarObserver for MemberFanout {
    fn on_start_batch(&self) {
        self.observers.notify(|o| o.on_start_batch());
    }

    fn on_end_batch(&self) {
        self.observers.notify(|o| o.on_end_batch());
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

    fn on_error(&self, calendar_id: &str, error: &StoreError) {
        self.observers.notify(|o| o.on_error(calendar_id, error));
    }
}
