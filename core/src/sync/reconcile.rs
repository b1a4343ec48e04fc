// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;

use crate::cached::Stores;
use crate::error::{StoreResult, SyncStatus};
use crate::item::{DateRange, Item, ItemFilter, OfflineFlag};
use crate::journal::OfflineJournal;
use crate::store::{ConflictAction, ConflictResolver};

/// Remote items seen during one full fetch, keyed by item id.
///
/// When several occurrences share an id the most recently modified one wins.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    items: HashMap<String, Item>,
    recreated: bool,
    received: usize,
}

impl Snapshot {
    fn record(&mut self, item: &Item) {
        self.received += 1;
        match self.items.get(&item.id) {
            Some(seen) if seen.last_modified >= item.last_modified => {}
            _ => {
                self.items.insert(item.id.clone(), item.clone());
            }
        }
    }

    fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }
}

/// What reconciliation does with one journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Keep the flag; playback pushes the local change.
    Replay,

    /// The remote copy is gone but the local edit should win; flag the item created.
    Recreate,

    /// Nothing left to do remotely; drop the cached copy and its flag.
    Forget,

    /// A declined conflict; keep the flag and skip the item until the next sync.
    Defer,

    /// A created item the remote store already holds, left behind by an interrupted
    /// playback; clear the flag instead of adding it again.
    Adopt,
}

/// Classifies a journal entry against the fetched remote state.
pub(crate) fn classify(
    flag: OfflineFlag,
    local: &Item,
    snapshot: &Snapshot,
    resolver: &dyn ConflictResolver,
) -> Decision {
    let prompt = |action: ConflictAction, remote: Option<&Item>| {
        if resolver.prompt_overwrite(action, local, remote) {
            Decision::Replay
        } else {
            tracing::info!(item = %local, action = action.as_str(), "conflict declined, deferring");
            Decision::Defer
        }
    };

    match flag {
        OfflineFlag::Created => match snapshot.get(&local.id) {
            Some(remote) if remote.hash_id() == local.hash_id() => Decision::Adopt,
            _ => Decision::Replay,
        },
        OfflineFlag::None => Decision::Replay,
        OfflineFlag::Modified => match snapshot.get(&local.id) {
            Some(remote) if local.last_modified < remote.last_modified => {
                tracing::warn!(item = %local, "item on the server seems to be modified recently");
                prompt(ConflictAction::Modify, Some(remote))
            }
            Some(_) => Decision::Replay,
            None => {
                tracing::warn!(item = %local, "item has been deleted from the server");
                match prompt(ConflictAction::Modify, None) {
                    Decision::Replay => Decision::Recreate,
                    other => other,
                }
            }
        },
        OfflineFlag::Deleted => match snapshot.get(&local.id) {
            Some(remote) if local.last_modified < remote.last_modified => {
                tracing::warn!(item = %local, "item on the server seems to be modified recently");
                prompt(ConflictAction::Delete, Some(remote))
            }
            Some(_) => Decision::Replay,
            None => Decision::Forget,
        },
    }
}

impl Stores {
    /// Refetches the remote calendar, reconciles the offline journal against it and plays
    /// back whatever is still pending.
    #[tracing::instrument(skip_all, fields(calendar = %self.calendar_id))]
    pub(crate) async fn full_sync(&self) -> SyncStatus {
        let journal = OfflineJournal::load(self.cache.as_ref()).await?;

        let range = DateRange::all();
        let (sink, batches) = mpsc::unbounded_channel();
        let (fetched, ingested) = tokio::join!(
            self.remote.get_items(ItemFilter::All, &range, sink),
            self.ingest(batches, &journal),
        );
        // both the fetch and every delivered batch are done past this point
        let snapshot = ingested?;

        if let Err(e) = fetched {
            tracing::error!(err = %e, "fetching remote items failed, replaying offline items only");
            let report = self.playback(&HashSet::new()).await;
            tracing::debug!(?report, "playback after failed fetch finished");
            self.notify_load();
            return Err(e);
        }

        if !snapshot.recreated {
            // an empty remote calendar still invalidates the cached copy
            self.cache.recreate().await?;
        }
        tracing::debug!(
            received = snapshot.received,
            pending = journal.len(),
            "remote items fetched"
        );

        let late = self.late_edits(&journal).await?;
        let mut deferred = self.reconcile(&journal, &snapshot).await;
        if !late.is_empty() {
            tracing::info!(
                count = late.len(),
                "items edited during the fetch wait for the next sync"
            );
            deferred.extend(late);
        }
        drop(journal);

        let report = self.playback(&deferred).await;
        tracing::info!(
            replayed = report.replayed,
            failed = report.failed,
            deferred = report.deferred,
            aborted = report.aborted,
            "full sync finished"
        );
        Ok(())
    }

    /// Mirrors fetched batches into the cache until the remote closes the channel.
    async fn ingest(
        &self,
        mut batches: mpsc::UnboundedReceiver<Vec<Item>>,
        journal: &OfflineJournal,
    ) -> StoreResult<Snapshot> {
        let mut snapshot = Snapshot::default();
        while let Some(batch) = batches.recv().await {
            if !snapshot.recreated {
                self.cache.recreate().await?;
                snapshot.recreated = true;
                self.cache.start_batch();
            }

            for item in batch {
                snapshot.record(&item);
                if journal.contains(&item.hash_id()) {
                    // the pending local copy is reconciled below
                    continue;
                }
                // edits made after the journal was loaded must not be overwritten either
                match self.cache.get_item_offline_flag(&item).await {
                    Ok(OfflineFlag::None) => {}
                    Ok(flag) => {
                        tracing::debug!(
                            item = %item,
                            %flag,
                            "item edited during the fetch, keeping local copy"
                        );
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(
                            err = %e,
                            item = %item,
                            "failed to read offline flag, keeping cached copy"
                        );
                        continue;
                    }
                }
                if let Err(e) = self.cache.add_item(&item).await {
                    tracing::warn!(err = %e, item = %item, "failed to cache fetched item");
                }
            }
        }

        if snapshot.recreated {
            self.cache.end_batch();
        }
        Ok(snapshot)
    }

    /// Hash ids of the items flagged since `journal` was loaded.
    async fn late_edits(&self, journal: &OfflineJournal) -> StoreResult<HashSet<String>> {
        let current = OfflineJournal::load(self.cache.as_ref()).await?;
        Ok(current
            .iter()
            .map(|(_, item)| item.hash_id())
            .filter(|key| !journal.contains(key))
            .collect())
    }

    async fn reconcile(&self, journal: &OfflineJournal, snapshot: &Snapshot) -> HashSet<String> {
        let mut deferred = HashSet::new();
        for (flag, item) in journal.iter() {
            let decision = classify(flag, item, snapshot, self.resolver.as_ref());
            tracing::debug!(item = %item, %flag, ?decision, "journal entry classified");

            let applied = match decision {
                Decision::Replay => Ok(()),
                Decision::Recreate => self.cache.add_offline_item(item).await.map(|_| ()),
                Decision::Forget => self.cache.delete_item(item).await,
                Decision::Defer => {
                    deferred.insert(item.hash_id());
                    Ok(())
                }
                Decision::Adopt => self.adopt(item, snapshot.get(&item.id)).await,
            };
            if let Err(e) = applied {
                tracing::warn!(err = %e, item = %item, "failed to apply reconciliation decision");
            }
        }
        deferred
    }

    /// Takes over a created item the remote store already holds. A newer local copy is
    /// pushed as a modification; otherwise the remote copy is mirrored.
    async fn adopt(&self, local: &Item, remote: Option<&Item>) -> StoreResult<()> {
        self.cache.reset_item_offline_flag(local).await?;
        match remote {
            Some(remote) if local.last_modified > remote.last_modified => {
                self.cache.modify_offline_item(local, Some(remote)).await?;
            }
            Some(remote) => {
                self.cache.add_item(remote).await?;
            }
            None => {}
        }
        tracing::debug!(item = %local, "created item already on the server, adopted");
        Ok(())
    }
}
