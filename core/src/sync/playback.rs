// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use crate::cached::Stores;
use crate::error::StoreResult;
use crate::item::{DateRange, Item, ItemFilter, OfflineFlag};
use crate::journal::PASS_ORDER;

/// Counters of one playback run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Items whose remote operation succeeded and whose flag was cleared.
    pub replayed: usize,

    /// Items whose remote operation failed; they stay flagged for the next pass.
    pub failed: usize,

    /// Items skipped because a conflict was declined during reconciliation.
    pub deferred: usize,

    /// Whether playback stopped early because the calendar went offline.
    pub aborted: bool,
}

impl Stores {
    /// Replays pending offline edits against the remote store.
    ///
    /// Runs a created pass, then a modified pass, then a deleted pass. Each pass queries the
    /// cache afresh. Items whose hash id is in `deferred` are left alone.
    #[tracing::instrument(skip_all, fields(calendar = %self.calendar_id))]
    pub(crate) async fn playback(&self, deferred: &HashSet<String>) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        for flag in PASS_ORDER {
            if self.is_offline() {
                tracing::info!("back to offline mode, playback aborted");
                report.aborted = true;
                break;
            }

            let items = match self
                .cache
                .get_items(ItemFilter::offline(flag), &DateRange::all())
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(err = %e, op = flag.operation(), "failed to load offline items");
                    continue;
                }
            };

            tracing::debug!(
                op = flag.operation(),
                count = items.len(),
                "performing playback operation"
            );
            for item in items {
                if deferred.contains(&item.hash_id()) {
                    report.deferred += 1;
                    continue;
                }
                if self.is_offline() {
                    tracing::info!("back to offline mode, playback aborted");
                    report.aborted = true;
                    return report;
                }

                match self.replay(flag, &item).await {
                    Ok(()) => report.replayed += 1,
                    Err(e) => {
                        tracing::warn!(
                            err = %e,
                            op = flag.operation(),
                            item = %item,
                            "unable to perform playback action, will try again next time"
                        );
                        report.failed += 1;
                    }
                }
            }
        }
        report
    }

    async fn replay(&self, flag: OfflineFlag, item: &Item) -> StoreResult<()> {
        match flag {
            OfflineFlag::Created => {
                self.remote.add_item(item).await?;
                self.cache.reset_item_offline_flag(item).await
            }
            OfflineFlag::Modified => {
                self.remote.modify_item(item, Some(item)).await?;
                self.cache.reset_item_offline_flag(item).await
            }
            OfflineFlag::Deleted => {
                self.remote.delete_item(item).await?;
                self.cache.delete_item(item).await
            }
            OfflineFlag::None => Ok(()),
        }
    }
}
