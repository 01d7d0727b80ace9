//! CPU rasterizer implementing [`GraphicsDevice`].
//!
//! Rows are blended in parallel with rayon. Readbacks are staged on
//! `begin_readback` so that later draws into the target do not leak into a
//! copy that is still in flight, mirroring the behaviour of a real device.

use rayon::prelude::*;
use std::collections::HashMap;

use airmix_core::{AirmixError, AirmixResult, FrameBuffer};

use crate::device::{GraphicsDevice, ReadbackId, TargetId, TextureId};

struct Readback {
    width: u32,
    height: u32,
    staged: Option<Vec<u8>>,
}

/// A device whose "video memory" is host memory.
pub struct SoftwareDevice {
    next_id: u64,
    textures: HashMap<TextureId, FrameBuffer>,
    targets: HashMap<TargetId, FrameBuffer>,
    readbacks: HashMap<ReadbackId, Readback>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            textures: HashMap::new(),
            targets: HashMap::new(),
            readbacks: HashMap::new(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Number of textures allocated so far.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn target(&self, id: TargetId) -> AirmixResult<&FrameBuffer> {
        self.targets
            .get(&id)
            .ok_or_else(|| AirmixError::device(format!("unknown render target {}", id.raw())))
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn check_len(what: &str, got: usize, width: u32, height: u32) -> AirmixResult<()> {
    let expected = (width as usize) * (height as usize) * 4;
    if got != expected {
        return Err(AirmixError::device(format!(
            "{} expects {} bytes for {}x{}, got {}",
            what, expected, width, height, got
        )));
    }
    Ok(())
}

/// Blend one straight-alpha RGBA8 pixel over another.
///
/// Color channels use `src * a + dst * (1 - a)`, alpha uses "over".
#[inline]
pub fn blend_pixel(dst: &mut [u8], src: &[u8]) {
    let sa = src[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        dst[..4].copy_from_slice(&src[..4]);
        return;
    }
    let inv = 255 - sa;
    for c in 0..3 {
        dst[c] = ((src[c] as u32 * sa + dst[c] as u32 * inv + 127) / 255) as u8;
    }
    dst[3] = (sa + (dst[3] as u32 * inv + 127) / 255) as u8;
}

/// Blend `src` over `dst`, both RGBA8, scaling `src` to `dst`'s size with
/// nearest-neighbour sampling.
pub fn blend_scaled(dst: &mut FrameBuffer, src: &FrameBuffer) {
    if src.width == 0 || src.height == 0 || dst.width == 0 || dst.height == 0 {
        return;
    }
    let dst_stride = dst.width as usize * 4;
    let src_stride = src.width as usize * 4;

    if src.width == dst.width && src.height == dst.height {
        dst.data
            .par_chunks_mut(dst_stride)
            .zip(src.data.par_chunks(src_stride))
            .for_each(|(d_row, s_row)| {
                for (d, s) in d_row.chunks_exact_mut(4).zip(s_row.chunks_exact(4)) {
                    blend_pixel(d, s);
                }
            });
        return;
    }

    let (dw, dh) = (dst.width as u64, dst.height as u64);
    let (sw, sh) = (src.width as u64, src.height as u64);
    dst.data
        .par_chunks_mut(dst_stride)
        .enumerate()
        .for_each(|(y, d_row)| {
            let sy = (y as u64 * sh / dh) as usize;
            let s_row = &src.data[sy * src_stride..(sy + 1) * src_stride];
            for (x, d) in d_row.chunks_exact_mut(4).enumerate() {
                let sx = (x as u64 * sw / dw) as usize * 4;
                blend_pixel(d, &s_row[sx..sx + 4]);
            }
        });
}

impl GraphicsDevice for SoftwareDevice {
    fn name(&self) -> &str {
        "software"
    }

    fn create_texture(&mut self, width: u32, height: u32) -> AirmixResult<TextureId> {
        let id = TextureId::new(self.allocate_id());
        self.textures.insert(id, FrameBuffer::new(width, height));
        Ok(id)
    }

    fn write_texture(&mut self, texture: TextureId, pixels: &[u8]) -> AirmixResult<()> {
        let tex = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| AirmixError::device(format!("unknown texture {}", texture.raw())))?;
        check_len("texture upload", pixels.len(), tex.width, tex.height)?;
        tex.data.copy_from_slice(pixels);
        Ok(())
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> AirmixResult<TargetId> {
        let id = TargetId::new(self.allocate_id());
        self.targets.insert(id, FrameBuffer::new(width, height));
        Ok(id)
    }

    fn clear(&mut self, target: TargetId) -> AirmixResult<()> {
        self.targets
            .get_mut(&target)
            .ok_or_else(|| AirmixError::device(format!("unknown render target {}", target.raw())))?
            .clear();
        Ok(())
    }

    fn draw(&mut self, target: TargetId, texture: TextureId) -> AirmixResult<()> {
        let src = self
            .textures
            .get(&texture)
            .ok_or_else(|| AirmixError::device(format!("unknown texture {}", texture.raw())))?;
        let dst = self
            .targets
            .get_mut(&target)
            .ok_or_else(|| AirmixError::device(format!("unknown render target {}", target.raw())))?;
        blend_scaled(dst, src);
        Ok(())
    }

    fn create_readback(&mut self, width: u32, height: u32) -> AirmixResult<ReadbackId> {
        let id = ReadbackId::new(self.allocate_id());
        self.readbacks.insert(
            id,
            Readback {
                width,
                height,
                staged: None,
            },
        );
        Ok(id)
    }

    fn begin_readback(&mut self, target: TargetId, readback: ReadbackId) -> AirmixResult<()> {
        let pixels = self.target(target)?.data.clone();
        let rb = self
            .readbacks
            .get_mut(&readback)
            .ok_or_else(|| AirmixError::device(format!("unknown readback {}", readback.raw())))?;
        check_len("readback", pixels.len(), rb.width, rb.height)?;
        rb.staged = Some(pixels);
        Ok(())
    }

    fn finish_readback(&mut self, readback: ReadbackId, out: &mut [u8]) -> AirmixResult<()> {
        let rb = self
            .readbacks
            .get_mut(&readback)
            .ok_or_else(|| AirmixError::device(format!("unknown readback {}", readback.raw())))?;
        check_len("readback destination", out.len(), rb.width, rb.height)?;
        let staged = rb
            .staged
            .take()
            .ok_or_else(|| AirmixError::device("readback finished before it was begun"))?;
        out.copy_from_slice(&staged);
        Ok(())
    }
}
