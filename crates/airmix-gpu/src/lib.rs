//! # airmix-gpu
//!
//! Graphics devices for the Airmix compositor. A [`GraphicsDevice`] owns all
//! device-side resources (textures, the render target, readback buffers) and
//! is only ever touched from the thread that opened it.
//!
//! Two implementations ship: [`SoftwareDevice`], a CPU rasterizer that is
//! always available, and [`WgpuDevice`], a headless wgpu device.

pub mod device;
pub mod gpu;
pub mod readback;
pub mod render_target;
pub mod software;

pub use device::{open_device, GraphicsDevice, ReadbackId, TargetId, TextureId};
pub use gpu::WgpuDevice;
pub use readback::{ReadbackBuffer, ReadbackState};
pub use render_target::RenderTarget;
pub use software::SoftwareDevice;
