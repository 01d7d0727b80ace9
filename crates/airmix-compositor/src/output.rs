//! The queue finished frames wait in until the caller pops them.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use airmix_core::SystemFrame;

use crate::stats::Stats;

/// Unbounded unless a bound is configured, in which case the oldest
/// waiting frame is discarded to make room for a new one.
#[derive(Clone)]
pub(crate) struct OutputQueue {
    tx: Sender<Arc<SystemFrame>>,
    rx: Receiver<Arc<SystemFrame>>,
    stats: Arc<Stats>,
}

impl OutputQueue {
    pub(crate) fn new(bound: Option<usize>, stats: Arc<Stats>) -> Self {
        let (tx, rx) = match bound {
            Some(n) => crossbeam_channel::bounded(n.max(1)),
            None => crossbeam_channel::unbounded(),
        };
        Self { tx, rx, stats }
    }

    pub(crate) fn push(&self, frame: Arc<SystemFrame>) {
        let mut frame = frame;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => {
                    self.stats.outputs_produced.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(TrySendError::Full(rejected)) => {
                    frame = rejected;
                    if self.rx.try_recv().is_ok() {
                        let dropped = self.stats.outputs_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::warn!("output queue full, dropped oldest frame ({} total)", dropped);
                    }
                }
                // Both ends live in this struct.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub(crate) fn try_pop(&self) -> Option<Arc<SystemFrame>> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
