//! One-shot timers that report back through the engine's channel.
//!
//! A timer is a tokio task that sleeps until its deadline and then sends a
//! [`TimerFired`] message. The task never touches engine state; the owning
//! context drains the channel and decides whether the fire still matters by
//! comparing epochs. Cancelling a [`TimerHandle`] stops the task early, and a
//! fire that raced the cancellation is dropped by the epoch check.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Which state machine a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// Chord prefix idle reset.
    Chord,
    /// Tap/hold threshold for the modifier remapper.
    Hold,
    /// Snippet buffer idle reset.
    Snippet,
}

/// Message sent when a timer's deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Owner of the timer.
    pub slot: TimerSlot,
    /// Epoch of the handle that scheduled it.
    pub epoch: u64,
}

/// Owned handle to a scheduled timer.
#[derive(Debug)]
pub struct TimerHandle {
    slot: TimerSlot,
    epoch: u64,
    token: CancellationToken,
}

impl TimerHandle {
    /// Epoch this handle's fire message will carry.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True when `fired` was produced by this handle.
    pub fn matches(&self, fired: TimerFired) -> bool {
        self.slot == fired.slot && self.epoch == fired.epoch
    }

    /// Stop the timer task.
    pub fn cancel(self) {
        trace!(slot = ?self.slot, epoch = self.epoch, "timer_cancel");
        self.token.cancel();
    }
}

/// Schedules timers onto the current tokio runtime.
#[derive(Clone)]
pub struct TimerQueue {
    tx: UnboundedSender<TimerFired>,
    next_epoch: Arc<AtomicU64>,
}

impl TimerQueue {
    /// Create a queue and the receiver its fires arrive on.
    pub fn new() -> (Self, UnboundedReceiver<TimerFired>) {
        let (tx, rx) = unbounded_channel();
        let queue = Self {
            tx,
            next_epoch: Arc::new(AtomicU64::new(1)),
        };
        (queue, rx)
    }

    /// Schedule a one-shot timer for `slot` after `delay`.
    ///
    /// Outside a tokio runtime the handle is still returned but never fires.
    pub fn schedule(&self, slot: TimerSlot, delay: Duration) -> TimerHandle {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let handle = TimerHandle {
            slot,
            epoch,
            token: token.clone(),
        };

        let Ok(rt) = Handle::try_current() else {
            warn!(?slot, "timer_without_runtime");
            return handle;
        };

        let deadline = Instant::now() + delay;
        let tx = self.tx.clone();
        trace!(?slot, epoch, delay_ms = delay.as_millis(), "timer_schedule");
        rt.spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline) => {
                    if tx.send(TimerFired { slot, epoch }).is_err() {
                        trace!(?slot, epoch, "timer_receiver_gone");
                    }
                }
                _ = token.cancelled() => {}
            }
        });
        handle
    }
}
