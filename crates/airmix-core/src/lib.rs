//! # airmix-core
//!
//! Core types and primitives for the Airmix compositor.
//! This crate contains foundational types shared across all Airmix crates:
//! frames, audio buffers, video format descriptors, configuration and error types.

pub mod audio;
pub mod color;
pub mod config;
pub mod error;
pub mod format;
pub mod frame;
pub mod hash;

pub use config::*;

pub use audio::AudioBuffer;
pub use color::Color;
pub use error::{AirmixError, AirmixResult};
pub use format::{FieldMode, FormatDesc, VideoFormat};
pub use frame::{Frame, FrameBuffer, OwnerTag, SystemFrame};
