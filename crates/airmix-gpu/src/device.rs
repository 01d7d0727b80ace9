//! The device abstraction every compositor backend implements.

use airmix_core::{AirmixResult, DeviceBackend};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

resource_id!(
    /// Handle to a sampled RGBA8 texture living on the device.
    TextureId
);
resource_id!(
    /// Handle to an offscreen render target (framebuffer + backing texture).
    TargetId
);
resource_id!(
    /// Handle to a staging buffer used to transfer pixels back to the host.
    ReadbackId
);

/// A graphics context and everything allocated from it.
///
/// Implementations are not required to be `Send`: a device is opened on the
/// compositor worker thread and stays there. All pixel data crossing this
/// interface is straight-alpha RGBA8, tightly packed.
pub trait GraphicsDevice {
    /// Human readable adapter name, for logs.
    fn name(&self) -> &str;

    fn create_texture(&mut self, width: u32, height: u32) -> AirmixResult<TextureId>;

    /// Upload `pixels` (exactly `width * height * 4` bytes) into `texture`.
    fn write_texture(&mut self, texture: TextureId, pixels: &[u8]) -> AirmixResult<()>;

    fn create_render_target(&mut self, width: u32, height: u32) -> AirmixResult<TargetId>;

    /// Reset every pixel of `target` to transparent black.
    fn clear(&mut self, target: TargetId) -> AirmixResult<()>;

    /// Draw `texture` over the whole of `target`, scaled to fit, blending
    /// color with source-alpha / one-minus-source-alpha and alpha with "over".
    fn draw(&mut self, target: TargetId, texture: TextureId) -> AirmixResult<()>;

    fn create_readback(&mut self, width: u32, height: u32) -> AirmixResult<ReadbackId>;

    /// Start copying `target` into `readback`. Returns before the copy is done.
    fn begin_readback(&mut self, target: TargetId, readback: ReadbackId) -> AirmixResult<()>;

    /// Wait for the copy started by [`begin_readback`](Self::begin_readback)
    /// and write the pixels into `out`.
    fn finish_readback(&mut self, readback: ReadbackId, out: &mut [u8]) -> AirmixResult<()>;
}

/// Open a device for the configured backend on the calling thread.
pub fn open_device(backend: DeviceBackend) -> AirmixResult<Box<dyn GraphicsDevice>> {
    match backend {
        DeviceBackend::Software => Ok(Box::new(crate::SoftwareDevice::new())),
        DeviceBackend::Wgpu => Ok(Box::new(crate::WgpuDevice::init()?)),
    }
}
