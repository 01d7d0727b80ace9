//! The double-buffered composite pipeline run by the worker.
//!
//! Each call advances three stages at once: the frames staged by the
//! previous call are locked and promoted for drawing, this call's inputs are
//! staged, and the render target drawn by the previous call is read back and
//! emitted. Stage storage lives in [`SlotPair`]s addressed by a [`Slot`]
//! that flips every call, so a slot is never filled and drawn in the same
//! call.

use std::ops::{Index, IndexMut};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use airmix_core::{AirmixResult, Frame, FormatDesc, SystemFrame};
use airmix_gpu::{GraphicsDevice, ReadbackBuffer, RenderTarget};

use crate::frame::{FrameKey, InputFrame, PooledFrame};
use crate::output::OutputQueue;
use crate::pool::FramePool;
use crate::stats::Stats;

/// Composite calls between submitting a set of frames and popping the
/// output that shows them.
///
/// Inputs are staged by call N, uploaded and locked by call N+1, drawn and
/// sent to readback by call N+2, and collected into an output by call N+3.
/// The first `PIPELINE_DELAY` outputs of a compositor are transparent black.
pub const PIPELINE_DELAY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    A,
    B,
}

impl Slot {
    pub(crate) fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// One value per [`Slot`].
#[derive(Debug, Default)]
pub(crate) struct SlotPair<T>([T; 2]);

impl<T> SlotPair<T> {
    pub(crate) fn new(a: T, b: T) -> Self {
        Self([a, b])
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T> Index<Slot> for SlotPair<T> {
    type Output = T;

    fn index(&self, slot: Slot) -> &T {
        &self.0[slot.index()]
    }
}

impl<T> IndexMut<Slot> for SlotPair<T> {
    fn index_mut(&mut self, slot: Slot) -> &mut T {
        &mut self.0[slot.index()]
    }
}

pub(crate) struct Pipeline {
    current: Slot,
    /// Frames adopted from a tick's inputs, waiting to be uploaded.
    staging: SlotPair<Vec<PooledFrame>>,
    /// Locked frames waiting for, or taking part in, a draw.
    drawing: SlotPair<Vec<PooledFrame>>,
    reading: SlotPair<ReadbackBuffer>,
    target: RenderTarget,
    /// Receives the next readback and the audio that belongs with it.
    output_frame: SystemFrame,
    format: FormatDesc,
    pool: Arc<FramePool>,
    output: OutputQueue,
    stats: Arc<Stats>,
}

impl Pipeline {
    pub(crate) fn new(
        device: &mut dyn GraphicsDevice,
        format: FormatDesc,
        pool: Arc<FramePool>,
        output: OutputQueue,
        stats: Arc<Stats>,
    ) -> AirmixResult<Self> {
        let target = RenderTarget::new(device, format.width, format.height)?;
        let reading = SlotPair::new(
            ReadbackBuffer::new(device, format.width, format.height)?,
            ReadbackBuffer::new(device, format.width, format.height)?,
        );
        Ok(Self {
            current: Slot::B,
            staging: SlotPair::default(),
            drawing: SlotPair::default(),
            reading,
            target,
            output_frame: SystemFrame::for_format(&format),
            format,
            pool,
            output,
            stats,
        })
    }

    /// Run one tick. Emits exactly one output frame.
    pub(crate) fn composite(
        &mut self,
        device: &mut dyn GraphicsDevice,
        inputs: Vec<InputFrame>,
    ) -> AirmixResult<()> {
        self.current = self.current.other();
        let cur = self.current;
        let next = cur.other();

        // Promote what the previous call staged.
        let mut promoted = std::mem::take(&mut self.staging[cur]);
        for frame in promoted.iter_mut() {
            frame.lock(device)?;
        }
        self.drawing[cur] = promoted;

        let mut staged = Vec::with_capacity(inputs.len());
        for input in inputs {
            staged.push(self.adopt(device, input)?);
        }
        self.staging[next] = staged;

        // Collect the readback issued by the previous call before drawing.
        self.reading[cur].collect(device, self.output_frame.data_mut())?;
        let finished = std::mem::replace(
            &mut self.output_frame,
            SystemFrame::for_format(&self.format),
        );
        self.output.push(Arc::new(finished));

        self.target.clear(device)?;
        for frame in &self.drawing[next] {
            frame.draw(device, &self.target)?;
        }
        self.reading[next].begin(device, &self.target)?;

        for frame in self.drawing[next].iter_mut() {
            frame.unlock();
        }
        for frame in &self.drawing[next] {
            self.output_frame.audio.mix_from(frame.audio());
        }
        self.drawing[next].clear();

        let ticks = self.stats.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!("composite tick {} done, slot {:?}", ticks, cur);
        Ok(())
    }

    /// Turn an input into a pooled frame on this device, copying only when
    /// the input is not already one of ours.
    fn adopt(
        &self,
        device: &mut dyn GraphicsDevice,
        input: InputFrame,
    ) -> AirmixResult<PooledFrame> {
        match input {
            InputFrame::Pooled(frame) if frame.owner() == self.pool.owner() => {
                self.stats.zero_copy_inputs.fetch_add(1, Ordering::Relaxed);
                Ok(frame)
            }
            other => {
                let src = other.as_frame();
                let key = FrameKey::new(src.width(), src.height());
                let mut frame = self.pool.acquire_local(device, key)?;
                frame.copy_from(src);
                self.stats.copied_inputs.fetch_add(1, Ordering::Relaxed);
                Ok(frame)
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Frames promoted but never drawn go back to the pool unlocked.
        for stage in self.drawing.iter_mut() {
            for frame in stage.iter_mut() {
                frame.unlock();
            }
            stage.clear();
        }
    }
}
