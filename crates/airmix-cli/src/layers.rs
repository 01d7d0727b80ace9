//! Synthetic producers: each layer is a box bouncing across the frame with
//! a tone underneath it.

use std::f32::consts::TAU;

use airmix_core::{AudioBuffer, Color, FormatDesc, FrameBuffer, SystemFrame};

const TONE_AMPLITUDE: f32 = 3000.0;

pub struct LayerSource {
    width: u32,
    height: u32,
    box_size: u32,
    color: Color,
    speed: (i64, i64),
    tone_hz: f32,
    phase: f32,
    sample_rate: u32,
    channels: u16,
    samples_per_frame: usize,
}

impl LayerSource {
    pub fn new(index: usize, count: usize, desc: &FormatDesc) -> Self {
        let hue = 360.0 * index as f32 / count.max(1) as f32;
        // Translucent above the bottom layer so blending shows.
        let alpha = if index == 0 { 255 } else { 192 };
        Self {
            width: desc.width,
            height: desc.height,
            box_size: (desc.height / 4).max(1),
            color: Color::from_hue(hue).with_alpha(alpha),
            speed: (7 + 3 * index as i64, 5 + 2 * index as i64),
            tone_hz: 220.0 * (index + 1) as f32,
            phase: 0.0,
            sample_rate: desc.audio_sample_rate,
            channels: desc.audio_channels.max(1),
            samples_per_frame: desc.audio_samples_per_frame(),
        }
    }

    pub fn render(&mut self, tick: u64) -> SystemFrame {
        let mut image = FrameBuffer::new(self.width, self.height);
        let (x, y) = self.position(tick);
        image.fill_rect(x, y, self.box_size, self.box_size, self.color);
        SystemFrame::from_parts(image, self.tone())
    }

    fn position(&self, tick: u64) -> (i32, i32) {
        let span_x = (self.width.saturating_sub(self.box_size)).max(1) as i64;
        let span_y = (self.height.saturating_sub(self.box_size)).max(1) as i64;
        (
            bounce(tick as i64 * self.speed.0, span_x) as i32,
            bounce(tick as i64 * self.speed.1, span_y) as i32,
        )
    }

    fn tone(&mut self) -> AudioBuffer {
        let channels = self.channels as usize;
        let step = TAU * self.tone_hz / self.sample_rate.max(1) as f32;
        let mut samples = Vec::with_capacity(self.samples_per_frame);
        for _ in 0..self.samples_per_frame / channels {
            let value = (self.phase.sin() * TONE_AMPLITUDE) as i16;
            samples.extend(std::iter::repeat(value).take(channels));
            self.phase = (self.phase + step) % TAU;
        }
        AudioBuffer::from_samples(samples)
    }
}

/// Triangle wave: position along a segment of length `span` after moving
/// `distance`, reflecting at both ends.
fn bounce(distance: i64, span: i64) -> i64 {
    let period = 2 * span;
    let d = distance.rem_euclid(period);
    if d <= span {
        d
    } else {
        period - d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounce_reflects() {
        assert_eq!(bounce(0, 10), 0);
        assert_eq!(bounce(10, 10), 10);
        assert_eq!(bounce(13, 10), 7);
        assert_eq!(bounce(20, 10), 0);
    }

    #[test]
    fn test_layer_fills_a_frame_of_audio() {
        let desc = FormatDesc::custom(64, 32, 50);
        let mut layer = LayerSource::new(1, 3, &desc);
        let frame = layer.render(4);
        assert_eq!((frame.image.width, frame.image.height), (64, 32));
        assert_eq!(frame.audio.len(), desc.audio_samples_per_frame());
        assert!(frame.data().chunks_exact(4).any(|px| px[3] == 192));
    }
}
