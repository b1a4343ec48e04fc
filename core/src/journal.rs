// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use crate::error::StoreResult;
use crate::item::{DateRange, Item, ItemFilter, OfflineFlag};
use crate::store::CacheStore;

/// Pass order shared by reconciliation and playback.
pub const PASS_ORDER: [OfflineFlag; 3] = [
    OfflineFlag::Created,
    OfflineFlag::Modified,
    OfflineFlag::Deleted,
];

/// Snapshot of the items carrying a pending offline flag.
///
/// The flags themselves live in the cache; the journal is loaded right before a full sync
/// and dropped once every entry has been classified.
#[derive(Debug, Default, Clone)]
pub struct OfflineJournal {
    entries: Vec<(OfflineFlag, Item)>,
    keys: HashSet<String>,
}

impl OfflineJournal {
    /// Loads every flagged item, created items first, then modified, then deleted.
    pub async fn load(cache: &dyn CacheStore) -> StoreResult<Self> {
        let mut journal = Self::default();
        for flag in PASS_ORDER {
            let items = cache
                .get_items(ItemFilter::offline(flag), &DateRange::all())
                .await?;
            for item in items {
                journal.push(flag, item);
            }
        }
        tracing::debug!(
            calendar = cache.calendar_id(),
            entries = journal.len(),
            "offline journal loaded"
        );
        Ok(journal)
    }

    pub fn push(&mut self, flag: OfflineFlag, item: Item) {
        if flag.is_pending() && self.keys.insert(item.hash_id()) {
            self.entries.push((flag, item));
        }
    }

    /// Whether the item with the given hash id has a pending edit.
    pub fn contains(&self, hash_id: &str) -> bool {
        self.keys.contains(hash_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OfflineFlag, &Item)> {
        self.entries.iter().map(|(flag, item)| (*flag, item))
    }
}
