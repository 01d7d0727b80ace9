use airmix_core::AirmixResult;

use crate::device::{GraphicsDevice, TargetId, TextureId};

/// The offscreen surface every composited draw lands in.
///
/// Sized once to the output format; owned by the compositor worker.
#[derive(Debug)]
pub struct RenderTarget {
    id: TargetId,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> AirmixResult<Self> {
        let id = device.create_render_target(width, height)?;
        Ok(Self { id, width, height })
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&self, device: &mut dyn GraphicsDevice) -> AirmixResult<()> {
        device.clear(self.id)
    }

    pub fn draw(&self, device: &mut dyn GraphicsDevice, texture: TextureId) -> AirmixResult<()> {
        device.draw(self.id, texture)
    }
}
