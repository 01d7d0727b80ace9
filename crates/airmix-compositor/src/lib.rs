//! # airmix-compositor
//!
//! The real-time frame compositor. Once per output tick a caller pushes the
//! tick's input frames; a dedicated worker thread, the only thread that ever
//! touches the graphics device, blends them into a render target and reads
//! the result back. Finished frames are drained with a non-blocking
//! [`Compositor::try_pop`].
//!
//! Device work is pipelined across ticks: upload, draw and readback of one
//! tick overlap with the preparation of the next, which costs a constant
//! [`PIPELINE_DELAY`] ticks of latency.

pub mod compositor;
pub mod frame;
pub mod pool;

mod output;
mod pipeline;
mod stats;
mod worker;

pub use compositor::Compositor;
pub use frame::{FrameKey, GpuFrame, InputFrame, PooledFrame};
pub use pipeline::PIPELINE_DELAY;
pub use pool::FramePool;
pub use stats::CompositorStats;

pub use airmix_core::{
    AirmixError, AirmixResult, CompositorConfig, DeviceBackend, Frame, FormatDesc, OwnerTag,
    SystemFrame,
};
