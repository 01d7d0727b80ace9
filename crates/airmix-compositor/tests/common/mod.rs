#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use airmix_compositor::{Compositor, CompositorConfig, InputFrame};
use airmix_core::{AirmixError, AirmixResult, AudioBuffer, Color, FormatDesc, FrameBuffer, SystemFrame};
use airmix_gpu::{GraphicsDevice, ReadbackId, SoftwareDevice, TargetId, TextureId};

pub const W: u32 = 64;
pub const H: u32 = 36;

/// Upper bound on any wait in these tests, so a bug fails instead of hanging.
pub const PATIENCE: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn format() -> FormatDesc {
    FormatDesc::custom(W, H, 50)
}

pub fn software() -> Compositor {
    init_tracing();
    Compositor::new(format()).expect("software compositor should start")
}

pub fn solid(color: Color, audio: &[i16]) -> InputFrame {
    SystemFrame::from_parts(
        FrameBuffer::solid(W, H, color),
        AudioBuffer::from_samples(audio.to_vec()),
    )
    .into()
}

pub fn drain(compositor: &Compositor) -> Vec<Arc<SystemFrame>> {
    std::iter::from_fn(|| compositor.try_pop()).collect()
}

pub fn is_transparent(frame: &SystemFrame) -> bool {
    frame.data().iter().all(|&b| b == 0)
}

/// Test side of a device gate: hands out passes and sees when the worker
/// is waiting for one. Dropping it opens the gate for good.
pub struct Gate {
    passes: Sender<()>,
    entered: Receiver<()>,
}

impl Gate {
    pub fn open(&self, passes: usize) {
        for _ in 0..passes {
            let _ = self.passes.send(());
        }
    }

    /// Wait until the worker has reached the gated call.
    pub fn wait_entered(&self) -> bool {
        self.entered.recv_timeout(PATIENCE).is_ok()
    }
}

struct GateHook {
    passes: Receiver<()>,
    entered: Sender<()>,
}

impl GateHook {
    fn pass(&self) {
        let _ = self.entered.send(());
        let _ = self.passes.recv_timeout(PATIENCE);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedCall {
    /// Every render-target clear, once per composite.
    Clear,
    /// Every texture allocation, once per new pooled frame.
    CreateTexture,
}

/// A software device that stalls on one kind of call until the test lets
/// it through.
struct GatedDevice {
    inner: SoftwareDevice,
    hook: GateHook,
    call: GatedCall,
}

impl GraphicsDevice for GatedDevice {
    fn name(&self) -> &str {
        "gated"
    }

    fn create_texture(&mut self, width: u32, height: u32) -> AirmixResult<TextureId> {
        if self.call == GatedCall::CreateTexture {
            self.hook.pass();
        }
        self.inner.create_texture(width, height)
    }

    fn write_texture(&mut self, texture: TextureId, pixels: &[u8]) -> AirmixResult<()> {
        self.inner.write_texture(texture, pixels)
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> AirmixResult<TargetId> {
        self.inner.create_render_target(width, height)
    }

    fn clear(&mut self, target: TargetId) -> AirmixResult<()> {
        if self.call == GatedCall::Clear {
            self.hook.pass();
        }
        self.inner.clear(target)
    }

    fn draw(&mut self, target: TargetId, texture: TextureId) -> AirmixResult<()> {
        self.inner.draw(target, texture)
    }

    fn create_readback(&mut self, width: u32, height: u32) -> AirmixResult<ReadbackId> {
        self.inner.create_readback(width, height)
    }

    fn begin_readback(&mut self, target: TargetId, readback: ReadbackId) -> AirmixResult<()> {
        self.inner.begin_readback(target, readback)
    }

    fn finish_readback(&mut self, readback: ReadbackId, out: &mut [u8]) -> AirmixResult<()> {
        self.inner.finish_readback(readback, out)
    }
}

pub fn gated(call: GatedCall) -> (Compositor, Gate) {
    init_tracing();
    let (passes_tx, passes_rx) = crossbeam_channel::unbounded();
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let hook = GateHook {
        passes: passes_rx,
        entered: entered_tx,
    };
    let compositor = Compositor::with_device(format(), CompositorConfig::default(), move || {
        Ok(Box::new(GatedDevice {
            inner: SoftwareDevice::new(),
            hook,
            call,
        }) as Box<dyn GraphicsDevice>)
    })
    .expect("gated compositor should start");
    let gate = Gate {
        passes: passes_tx,
        entered: entered_rx,
    };
    (compositor, gate)
}

/// A software device whose draws fail, as a lost device would.
struct BrokenDevice {
    inner: SoftwareDevice,
}

impl GraphicsDevice for BrokenDevice {
    fn name(&self) -> &str {
        "broken"
    }

    fn create_texture(&mut self, width: u32, height: u32) -> AirmixResult<TextureId> {
        self.inner.create_texture(width, height)
    }

    fn write_texture(&mut self, texture: TextureId, pixels: &[u8]) -> AirmixResult<()> {
        self.inner.write_texture(texture, pixels)
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> AirmixResult<TargetId> {
        self.inner.create_render_target(width, height)
    }

    fn clear(&mut self, target: TargetId) -> AirmixResult<()> {
        self.inner.clear(target)
    }

    fn draw(&mut self, _target: TargetId, _texture: TextureId) -> AirmixResult<()> {
        Err(AirmixError::device("device lost"))
    }

    fn create_readback(&mut self, width: u32, height: u32) -> AirmixResult<ReadbackId> {
        self.inner.create_readback(width, height)
    }

    fn begin_readback(&mut self, target: TargetId, readback: ReadbackId) -> AirmixResult<()> {
        self.inner.begin_readback(target, readback)
    }

    fn finish_readback(&mut self, readback: ReadbackId, out: &mut [u8]) -> AirmixResult<()> {
        self.inner.finish_readback(readback, out)
    }
}

pub fn broken() -> Compositor {
    init_tracing();
    Compositor::with_device(format(), CompositorConfig::default(), || {
        Ok(Box::new(BrokenDevice {
            inner: SoftwareDevice::new(),
        }) as Box<dyn GraphicsDevice>)
    })
    .expect("broken device still opens")
}
