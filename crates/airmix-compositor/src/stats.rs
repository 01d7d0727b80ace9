use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by the facade, the pool and the worker.
#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub ticks: AtomicU64,
    pub empty_ticks: AtomicU64,
    pub zero_copy_inputs: AtomicU64,
    pub copied_inputs: AtomicU64,
    pub outputs_produced: AtomicU64,
    pub outputs_dropped: AtomicU64,
    pub frames_allocated: AtomicU64,
}

impl Stats {
    pub(crate) fn snapshot(&self) -> CompositorStats {
        CompositorStats {
            ticks_composited: self.ticks.load(Ordering::Relaxed),
            empty_ticks: self.empty_ticks.load(Ordering::Relaxed),
            zero_copy_inputs: self.zero_copy_inputs.load(Ordering::Relaxed),
            copied_inputs: self.copied_inputs.load(Ordering::Relaxed),
            outputs_produced: self.outputs_produced.load(Ordering::Relaxed),
            outputs_dropped: self.outputs_dropped.load(Ordering::Relaxed),
            frames_allocated: self.frames_allocated.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the compositor's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompositorStats {
    /// Ticks that went through the device pipeline.
    pub ticks_composited: u64,
    /// Ticks pushed with no input frames.
    pub empty_ticks: u64,
    /// Inputs drawn straight from their pooled frame.
    pub zero_copy_inputs: u64,
    /// Inputs copied into a pooled frame first.
    pub copied_inputs: u64,
    pub outputs_produced: u64,
    /// Outputs discarded because the output queue was full.
    pub outputs_dropped: u64,
    pub frames_allocated: u64,
}
