use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::AudioBuffer;
use crate::format::FormatDesc;
use crate::Color;

/// Identity of the compositor instance that created a frame.
///
/// Frames carrying the tag of the compositor they are pushed to are already
/// device-resident and are consumed without a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerTag(uuid::Uuid);

impl OwnerTag {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for OwnerTag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque video/audio frame as handed over by a producer.
///
/// Pixels are straight-alpha RGBA8, row-major, `width * height * 4` bytes.
/// Audio is interleaved signed 16-bit PCM.
pub trait Frame: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Compositor that owns the device-side storage of this frame, if any.
    fn tag(&self) -> Option<OwnerTag>;
    fn pixels(&self) -> &[u8];
    fn audio(&self) -> &[i16];
}

/// A single video frame as a raw RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer filled with zeros (transparent black).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width as usize) * (height as usize) * 4],
            width,
            height,
        }
    }

    /// Create a frame buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Total byte size of the pixel data.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = self.offset(x, y);
        let px = &self.data[offset..offset + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        self.data[offset..offset + 4].copy_from_slice(&rgba);
    }

    pub fn fill(&mut self, color: Color) {
        let px = color.to_rgba8();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Fill the rectangle at (x, y) of size w×h, clipped to the buffer.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color) {
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x.saturating_add(w as i32)).clamp(0, self.width as i32) as u32;
        let y1 = (y.saturating_add(h as i32)).clamp(0, self.height as i32) as u32;
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let px = color.to_rgba8();
        for row in y0..y1 {
            let start = self.offset(x0, row);
            let end = self.offset(x1, row);
            for chunk in self.data[start..end].chunks_exact_mut(4) {
                chunk.copy_from_slice(&px);
            }
        }
    }

    /// Reset to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }
}

/// A host-memory frame: pixels plus the audio that accompanies them.
///
/// This is the type of every frame a compositor outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFrame {
    pub image: FrameBuffer,
    pub audio: AudioBuffer,
}

impl SystemFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: FrameBuffer::new(width, height),
            audio: AudioBuffer::new(),
        }
    }

    /// A silent, transparent frame sized to the output format.
    pub fn for_format(desc: &FormatDesc) -> Self {
        Self::new(desc.width, desc.height)
    }

    pub fn from_parts(image: FrameBuffer, audio: AudioBuffer) -> Self {
        Self { image, audio }
    }

    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        Self::from_parts(FrameBuffer::solid(width, height, color), AudioBuffer::new())
    }

    /// Clear pixels to transparent black and drop all audio.
    pub fn clear(&mut self) {
        self.image.clear();
        self.audio.clear();
    }

    pub fn data(&self) -> &[u8] {
        &self.image.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.image.data
    }
}

impl Frame for SystemFrame {
    fn width(&self) -> u32 {
        self.image.width
    }

    fn height(&self) -> u32 {
        self.image.height
    }

    fn tag(&self) -> Option<OwnerTag> {
        None
    }

    fn pixels(&self) -> &[u8] {
        &self.image.data
    }

    fn audio(&self) -> &[i16] {
        self.audio.samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_new() {
        let fb = FrameBuffer::new(1920, 1080);
        assert_eq!(fb.byte_size(), 1920 * 1080 * 4);
        assert_eq!(fb.pixel_count(), 1920 * 1080);
        assert_eq!(fb.get_pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_frame_buffer_get_set_pixel() {
        let mut fb = FrameBuffer::new(10, 10);
        fb.set_pixel(5, 5, [128, 64, 32, 255]);
        assert_eq!(fb.get_pixel(5, 5), Some([128, 64, 32, 255]));
        assert_eq!(fb.get_pixel(10, 0), None);
        assert_eq!(fb.get_pixel(0, 10), None);
    }

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.fill_rect(-1, 2, 3, 10, Color::RED);
        assert_eq!(fb.get_pixel(0, 3), Some([255, 0, 0, 255]));
        assert_eq!(fb.get_pixel(1, 2), Some([255, 0, 0, 255]));
        assert_eq!(fb.get_pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(fb.get_pixel(0, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_fill_rect_fully_outside() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.fill_rect(10, 10, 2, 2, Color::RED);
        assert!(fb.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_system_frame_clear() {
        let mut frame = SystemFrame::solid(2, 2, Color::WHITE);
        frame.audio.extend_from_slice(&[1, 2, 3]);
        frame.clear();
        assert!(frame.data().iter().all(|&b| b == 0));
        assert!(frame.audio.is_empty());
    }

    #[test]
    fn test_system_frame_is_untagged() {
        let frame = SystemFrame::new(2, 2);
        assert_eq!(frame.tag(), None);
        assert_eq!(Frame::width(&frame), 2);
    }

    #[test]
    fn test_owner_tags_are_unique() {
        assert_ne!(OwnerTag::new(), OwnerTag::new());
    }
}
