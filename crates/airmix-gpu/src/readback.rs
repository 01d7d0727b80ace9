//! Staging buffers that move rendered pixels back into host memory.

use airmix_core::AirmixResult;

use crate::device::{GraphicsDevice, ReadbackId};
use crate::render_target::RenderTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackState {
    /// Nothing has been copied into the buffer since it was last collected.
    Idle,
    /// A copy has been issued and not yet collected.
    Pending,
}

/// One of the alternating readback buffers.
///
/// [`begin`](Self::begin) issues an asynchronous copy of the render target;
/// [`collect`](Self::collect), normally one tick later, waits for it and
/// writes the pixels into host memory.
#[derive(Debug)]
pub struct ReadbackBuffer {
    id: ReadbackId,
    width: u32,
    height: u32,
    state: ReadbackState,
}

impl ReadbackBuffer {
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> AirmixResult<Self> {
        let id = device.create_readback(width, height)?;
        Ok(Self {
            id,
            width,
            height,
            state: ReadbackState::Idle,
        })
    }

    pub fn state(&self) -> ReadbackState {
        self.state
    }

    pub fn begin(
        &mut self,
        device: &mut dyn GraphicsDevice,
        target: &RenderTarget,
    ) -> AirmixResult<()> {
        if self.state == ReadbackState::Pending {
            tracing::warn!(
                "readback {} re-issued before collection, discarding previous copy",
                self.id.raw()
            );
            let mut discard = vec![0u8; (self.width as usize) * (self.height as usize) * 4];
            device.finish_readback(self.id, &mut discard)?;
        }
        device.begin_readback(target.id(), self.id)?;
        self.state = ReadbackState::Pending;
        Ok(())
    }

    /// Write the pending copy into `out`. An idle buffer yields transparent black.
    pub fn collect(&mut self, device: &mut dyn GraphicsDevice, out: &mut [u8]) -> AirmixResult<()> {
        match self.state {
            ReadbackState::Idle => out.fill(0),
            ReadbackState::Pending => {
                self.state = ReadbackState::Idle;
                device.finish_readback(self.id, out)?;
            }
        }
        Ok(())
    }
}
