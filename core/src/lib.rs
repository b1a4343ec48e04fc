// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Offline cache and synchronization engine for calendar stores.
//!
//! A [`CachedCalendar`] wraps an authoritative [`RemoteStore`] with a local
//! [`CacheStore`]. Reads are served from the cache, mutations go to the remote store
//! while it is reachable and are journaled as offline edits while it is not, and
//! [`CachedCalendar::synchronize`] reconciles the journal against the remote side.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_debug_implementations,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro
)]

mod cached;
mod composite;
mod config;
mod error;
mod fanout;
mod gateway;
mod item;
mod journal;
mod localdb;
mod memory;
mod observer;
mod store;
mod sync;

pub use crate::cached::CachedCalendar;
pub use crate::composite::CompositeCalendar;
pub use crate::config::{APP_NAME, CacheType, Config};
pub use crate::error::{ConfigError, StoreError, StoreResult, SyncStatus};
pub use crate::item::{DateRange, Item, ItemFilter, OfflineFlag};
pub use crate::localdb::SqliteCache;
pub use crate::memory::MemoryStore;
pub use crate::observer::{CalendarObserver, ObserverBag, ObserverId};
pub use crate::store::{
    CacheStore, ChangeLog, ConflictAction, ConflictResolver, Connectivity, ItemSink,
    NetworkStatus, RemoteStore,
};
pub use crate::sync::{PlaybackReport, SyncOperation};
