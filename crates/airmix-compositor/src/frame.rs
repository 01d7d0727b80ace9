//! Frames as seen by the compositor: device-backed [`GpuFrame`]s, the
//! [`PooledFrame`] guard that recycles them, and the [`InputFrame`] a tick
//! is made of.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use airmix_core::{AirmixResult, AudioBuffer, Frame, OwnerTag, SystemFrame};
use airmix_gpu::{GraphicsDevice, RenderTarget, TextureId};

use crate::pool::FramePool;

/// Pool key: frames are only interchangeable with frames of the same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub width: u32,
    pub height: u32,
}

impl FrameKey {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn byte_size(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A frame with a texture on the compositor's device and host-side staging
/// pixels that producers write into.
///
/// While locked the staging pixels have been handed to the device and must
/// not change; the pipeline locks a frame when it is promoted for drawing
/// and unlocks it once the draw has been issued.
pub struct GpuFrame {
    key: FrameKey,
    texture: TextureId,
    pixels: Vec<u8>,
    audio: AudioBuffer,
    locked: bool,
    owner: OwnerTag,
}

impl GpuFrame {
    /// Allocate the texture and staging memory. New frames start locked.
    pub(crate) fn allocate(
        device: &mut dyn GraphicsDevice,
        key: FrameKey,
        owner: OwnerTag,
    ) -> AirmixResult<Self> {
        let texture = device.create_texture(key.width, key.height)?;
        Ok(Self {
            key,
            texture,
            pixels: vec![0u8; key.byte_size()],
            audio: AudioBuffer::new(),
            locked: true,
            owner,
        })
    }

    pub fn key(&self) -> FrameKey {
        self.key
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// The compositor whose device holds this frame's texture.
    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Staging pixels, straight-alpha RGBA8.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        debug_assert!(!self.locked, "pixels of a locked frame must not be mutated");
        &mut self.pixels
    }

    pub fn audio_mut(&mut self) -> &mut AudioBuffer {
        &mut self.audio
    }

    /// Upload the staging pixels and mark the frame GPU-visible.
    pub(crate) fn lock(&mut self, device: &mut dyn GraphicsDevice) -> AirmixResult<()> {
        device.write_texture(self.texture, &self.pixels)?;
        self.locked = true;
        Ok(())
    }

    pub(crate) fn unlock(&mut self) {
        self.locked = false;
    }

    pub(crate) fn draw(
        &self,
        device: &mut dyn GraphicsDevice,
        target: &RenderTarget,
    ) -> AirmixResult<()> {
        target.draw(device, self.texture)
    }

    /// Copy pixels and audio out of a producer frame of the same size.
    pub(crate) fn copy_from(&mut self, src: &dyn Frame) {
        let src_pixels = src.pixels();
        if src_pixels.len() != self.pixels.len() {
            tracing::warn!(
                "input frame carries {} pixel bytes, expected {} for {}",
                src_pixels.len(),
                self.pixels.len(),
                self.key
            );
        }
        let n = src_pixels.len().min(self.pixels.len());
        self.pixels[..n].copy_from_slice(&src_pixels[..n]);
        self.audio.copy_from(src.audio());
    }
}

impl Frame for GpuFrame {
    fn width(&self) -> u32 {
        self.key.width
    }

    fn height(&self) -> u32 {
        self.key.height
    }

    fn tag(&self) -> Option<OwnerTag> {
        Some(self.owner)
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn audio(&self) -> &[i16] {
        self.audio.samples()
    }
}

impl fmt::Debug for GpuFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuFrame")
            .field("key", &self.key)
            .field("texture", &self.texture)
            .field("locked", &self.locked)
            .field("audio_samples", &self.audio.len())
            .finish()
    }
}

/// A [`GpuFrame`] on loan from a [`FramePool`].
///
/// Dropping the guard returns the frame to its pool, whatever path the drop
/// happens on.
pub struct PooledFrame {
    frame: Option<GpuFrame>,
    pool: Arc<FramePool>,
}

impl PooledFrame {
    pub(crate) fn new(frame: GpuFrame, pool: Arc<FramePool>) -> Self {
        Self {
            frame: Some(frame),
            pool,
        }
    }
}

impl Deref for PooledFrame {
    type Target = GpuFrame;

    fn deref(&self) -> &GpuFrame {
        self.frame.as_ref().expect("pooled frame accessed after release")
    }
}

impl DerefMut for PooledFrame {
    fn deref_mut(&mut self) -> &mut GpuFrame {
        self.frame.as_mut().expect("pooled frame accessed after release")
    }
}

impl Drop for PooledFrame {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.pool.release(frame);
        }
    }
}

impl Frame for PooledFrame {
    fn width(&self) -> u32 {
        self.deref().width()
    }

    fn height(&self) -> u32 {
        self.deref().height()
    }

    fn tag(&self) -> Option<OwnerTag> {
        self.deref().tag()
    }

    fn pixels(&self) -> &[u8] {
        self.deref().pixels()
    }

    fn audio(&self) -> &[i16] {
        self.deref().audio()
    }
}

impl fmt::Debug for PooledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledFrame").field(&self.frame).finish()
    }
}

/// One layer of a tick's input.
pub enum InputFrame {
    /// A frame obtained from [`Compositor::create_frame`](crate::Compositor::create_frame).
    /// Used without a copy when it belongs to the compositor it is pushed to.
    Pooled(PooledFrame),
    /// Any other producer frame; its pixels are copied into a pooled frame.
    Shared(Arc<dyn Frame>),
}

impl InputFrame {
    pub fn as_frame(&self) -> &dyn Frame {
        match self {
            InputFrame::Pooled(frame) => frame,
            InputFrame::Shared(frame) => frame.as_ref(),
        }
    }
}

impl From<PooledFrame> for InputFrame {
    fn from(frame: PooledFrame) -> Self {
        InputFrame::Pooled(frame)
    }
}

impl From<Arc<dyn Frame>> for InputFrame {
    fn from(frame: Arc<dyn Frame>) -> Self {
        InputFrame::Shared(frame)
    }
}

impl From<Arc<SystemFrame>> for InputFrame {
    fn from(frame: Arc<SystemFrame>) -> Self {
        InputFrame::Shared(frame)
    }
}

impl From<SystemFrame> for InputFrame {
    fn from(frame: SystemFrame) -> Self {
        InputFrame::Shared(Arc::new(frame))
    }
}

impl fmt::Debug for InputFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.as_frame();
        let kind = match self {
            InputFrame::Pooled(_) => "Pooled",
            InputFrame::Shared(_) => "Shared",
        };
        write!(f, "{}({}x{})", kind, frame.width(), frame.height())
    }
}
