// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Synchronization between the local cache and the remote store.
//!
//! A calendar runs at most one synchronization at a time. Requests arriving while one is in
//! flight join it and all complete, in registration order, with its terminal status.

mod playback;
mod reconcile;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

pub use playback::PlaybackReport;

use crate::cached::Stores;
use crate::error::{StoreError, SyncStatus};

/// Completion callback of a synchronize request.
pub type SyncCallback = Box<dyn FnOnce(SyncStatus) + Send + 'static>;

/// Handle of a synchronization, shared by every request coalesced into it.
#[derive(Debug, Clone)]
pub struct SyncOperation {
    id: u64,
    token: CancellationToken,
    done: Arc<AtomicBool>,
}

impl SyncOperation {
    fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle for a request that completed without starting an operation.
    pub(crate) fn completed() -> Self {
        let op = Self::new(0);
        op.done.store(true, Ordering::SeqCst);
        op
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stops the operation at its next suspension point. Every waiting request completes
    /// with [`StoreError::Cancelled`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_pending(&self) -> bool {
        !self.done.load(Ordering::SeqCst)
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

struct InFlight {
    op: SyncOperation,
    waiters: Vec<SyncCallback>,
}

/// Outcome of [`SyncCoordinator::enqueue`].
pub(crate) enum Enqueued {
    /// No operation was running; the caller must drive this one.
    Start(SyncOperation),

    /// The request joined the operation already in flight.
    Joined(SyncOperation),
}

/// Idle/Syncing state machine with the queue of waiting requests.
#[derive(Default)]
pub(crate) struct SyncCoordinator {
    next_id: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
}

impl SyncCoordinator {
    pub(crate) fn enqueue(&self, callback: SyncCallback) -> Enqueued {
        let mut state = self.lock();
        match state.as_mut() {
            Some(in_flight) => {
                in_flight.waiters.push(callback);
                tracing::debug!(
                    op = in_flight.op.id,
                    waiters = in_flight.waiters.len(),
                    "sync in progress, request queued"
                );
                Enqueued::Joined(in_flight.op.clone())
            }
            None => {
                let op = SyncOperation::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
                *state = Some(InFlight {
                    op: op.clone(),
                    waiters: vec![callback],
                });
                Enqueued::Start(op)
            }
        }
    }

    /// Completes the operation `op_id` if it is still the one in flight.
    pub(crate) fn complete(&self, op_id: u64, status: SyncStatus) {
        let in_flight = {
            let mut state = self.lock();
            if state.as_ref().is_some_and(|a| a.op.id == op_id) {
                state.take()
            } else {
                None
            }
        };

        if let Some(in_flight) = in_flight {
            in_flight.op.done.store(true, Ordering::SeqCst);
            run_callbacks(in_flight.waiters, &status);
        }
    }

    /// Completes every waiting request with `status`, leaving a running operation in place.
    pub(crate) fn drain(&self, status: &SyncStatus) {
        let waiters = match self.lock().as_mut() {
            Some(in_flight) => std::mem::take(&mut in_flight.waiters),
            None => Vec::new(),
        };
        run_callbacks(waiters, status);
    }

    /// Detaches and cancels the running operation, completing its requests with
    /// [`StoreError::Cancelled`]. Returns whether an operation was running.
    pub(crate) fn cancel(&self) -> bool {
        let in_flight = self.lock().take();
        match in_flight {
            Some(in_flight) => {
                tracing::debug!(op = in_flight.op.id, "cancelling sync");
                in_flight.op.cancel();
                in_flight.op.done.store(true, Ordering::SeqCst);
                run_callbacks(in_flight.waiters, &Err(StoreError::Cancelled));
                true
            }
            None => false,
        }
    }

    pub(crate) fn current(&self) -> Option<SyncOperation> {
        self.lock().as_ref().map(|a| a.op.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_callbacks(waiters: Vec<SyncCallback>, status: &SyncStatus) {
    let count = waiters.len();
    for callback in waiters {
        callback(status.clone());
    }
    tracing::debug!(count, "sync queue empty");
}

impl Stores {
    /// Runs one synchronization, picking the strategy from the remote's capabilities.
    #[tracing::instrument(skip_all, fields(calendar = %self.calendar_id))]
    pub(crate) async fn run_sync(&self) -> SyncStatus {
        match self.remote.change_log() {
            Some(log) => {
                tracing::info!("changelog based sync");
                let status = log.replay_changes_on(self.cache.clone()).await;
                if let Err(e) = &status {
                    tracing::error!(err = %e, "replaying remote changes failed");
                }
                status
            }
            None => {
                tracing::info!("full sync");
                self.full_sync().await
            }
        }
    }
}
