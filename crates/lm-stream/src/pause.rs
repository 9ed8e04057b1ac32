//! Batch-wide pause/resume coordination.
//!
//! The controller is a two-state machine (Running ⇄ Paused) on a watch
//! channel, plus a registry of the streams currently bound to it. Streams
//! check the state before each line and park while paused; `resume` wakes
//! every parked stream with one broadcast.

use crate::cancel::CancellationToken;
use crate::error::{Result, StreamError};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Identifier of a bound stream.
pub type StreamId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Running,
    Paused,
}

/// Shared pause state for the streams of one job.
#[derive(Debug)]
pub struct PauseController {
    state: watch::Sender<PauseState>,
    bound: Mutex<BTreeSet<StreamId>>,
    next_id: AtomicU64,
}

impl Default for PauseController {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseController {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(PauseState::Running);
        Self {
            state,
            bound: Mutex::new(BTreeSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> PauseState {
        *self.state.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PauseState::Paused
    }

    /// Enter Paused. Returns false if already paused.
    pub fn pause(&self) -> bool {
        let changed = self.transition(PauseState::Paused);
        if changed {
            tracing::debug!(streams = self.bound_count(), "paused");
        }
        changed
    }

    /// Enter Running, releasing every parked stream. Returns false if
    /// already running.
    pub fn resume(&self) -> bool {
        let changed = self.transition(PauseState::Running);
        if changed {
            tracing::debug!(streams = self.bound_count(), "resumed");
        }
        changed
    }

    fn transition(&self, to: PauseState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == to {
                false
            } else {
                *state = to;
                true
            }
        })
    }

    /// Bind a stream. The binding detaches on drop. A stream bound while
    /// paused observes the paused state on its first check.
    pub fn attach(self: &Arc<Self>) -> StreamBinding {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry().insert(id);
        StreamBinding {
            controller: Arc::clone(self),
            id,
        }
    }

    /// Ids of currently bound streams.
    pub fn bound_streams(&self) -> Vec<StreamId> {
        self.registry().iter().copied().collect()
    }

    pub fn bound_count(&self) -> usize {
        self.registry().len()
    }

    /// Park while paused. Returns `Err(Cancelled)` if the token fires first.
    pub async fn wait_if_paused(&self, cancel: &CancellationToken) -> Result<()> {
        let mut rx = self.state.subscribe();
        if *rx.borrow_and_update() == PauseState::Running {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        tokio::select! {
            _ = rx.wait_for(|s| *s == PauseState::Running) => Ok(()),
            _ = cancel.cancelled() => Err(StreamError::Cancelled),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, BTreeSet<StreamId>> {
        self.bound.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A stream's registration with a [`PauseController`].
#[derive(Debug)]
pub struct StreamBinding {
    controller: Arc<PauseController>,
    id: StreamId,
}

impl StreamBinding {
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn is_paused(&self) -> bool {
        self.controller.is_paused()
    }

    pub async fn wait_if_paused(&self, cancel: &CancellationToken) -> Result<()> {
        self.controller.wait_if_paused(cancel).await
    }
}

impl Drop for StreamBinding {
    fn drop(&mut self) {
        self.controller.registry().remove(&self.id);
    }
}
