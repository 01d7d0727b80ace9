//! Video format descriptors.
//!
//! A [`FormatDesc`] is supplied once when a compositor is built and never
//! changes afterwards. It fixes the output resolution, the tick rate and the
//! audio layout carried by each output frame.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AirmixError;

/// Audio sample rate used by every broadcast preset.
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Interleaved channel count used by every broadcast preset.
pub const DEFAULT_AUDIO_CHANNELS: u16 = 2;

/// Scan mode of a video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    Progressive,
    /// Interlaced, upper field first.
    Upper,
    /// Interlaced, lower field first.
    Lower,
}

/// Broadcast output format presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFormat {
    #[serde(rename = "pal")]
    Pal,
    #[serde(rename = "ntsc")]
    Ntsc,
    #[serde(rename = "576p2500")]
    X576p2500,
    #[serde(rename = "720p2500")]
    X720p2500,
    #[serde(rename = "720p5000")]
    X720p5000,
    #[serde(rename = "720p5994")]
    X720p5994,
    #[serde(rename = "720p6000")]
    X720p6000,
    #[serde(rename = "1080i5000")]
    X1080i5000,
    #[serde(rename = "1080i5994")]
    X1080i5994,
    #[serde(rename = "1080i6000")]
    X1080i6000,
    #[serde(rename = "1080p2398")]
    X1080p2398,
    #[serde(rename = "1080p2400")]
    X1080p2400,
    #[serde(rename = "1080p2500")]
    X1080p2500,
    #[serde(rename = "1080p2997")]
    X1080p2997,
    #[serde(rename = "1080p3000")]
    X1080p3000,
    #[serde(rename = "1080p5000")]
    X1080p5000,
    #[serde(rename = "1080p5994")]
    X1080p5994,
    #[serde(rename = "1080p6000")]
    X1080p6000,
    /// Any resolution/rate not covered by a preset.
    #[serde(rename = "custom")]
    Custom,
}

impl VideoFormat {
    /// Every named preset, in display order.
    pub const PRESETS: [VideoFormat; 18] = [
        VideoFormat::Pal,
        VideoFormat::Ntsc,
        VideoFormat::X576p2500,
        VideoFormat::X720p2500,
        VideoFormat::X720p5000,
        VideoFormat::X720p5994,
        VideoFormat::X720p6000,
        VideoFormat::X1080i5000,
        VideoFormat::X1080i5994,
        VideoFormat::X1080i6000,
        VideoFormat::X1080p2398,
        VideoFormat::X1080p2400,
        VideoFormat::X1080p2500,
        VideoFormat::X1080p2997,
        VideoFormat::X1080p3000,
        VideoFormat::X1080p5000,
        VideoFormat::X1080p5994,
        VideoFormat::X1080p6000,
    ];

    /// Canonical lowercase name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            VideoFormat::Pal => "pal",
            VideoFormat::Ntsc => "ntsc",
            VideoFormat::X576p2500 => "576p2500",
            VideoFormat::X720p2500 => "720p2500",
            VideoFormat::X720p5000 => "720p5000",
            VideoFormat::X720p5994 => "720p5994",
            VideoFormat::X720p6000 => "720p6000",
            VideoFormat::X1080i5000 => "1080i5000",
            VideoFormat::X1080i5994 => "1080i5994",
            VideoFormat::X1080i6000 => "1080i6000",
            VideoFormat::X1080p2398 => "1080p2398",
            VideoFormat::X1080p2400 => "1080p2400",
            VideoFormat::X1080p2500 => "1080p2500",
            VideoFormat::X1080p2997 => "1080p2997",
            VideoFormat::X1080p3000 => "1080p3000",
            VideoFormat::X1080p5000 => "1080p5000",
            VideoFormat::X1080p5994 => "1080p5994",
            VideoFormat::X1080p6000 => "1080p6000",
            VideoFormat::Custom => "custom",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoFormat {
    type Err = AirmixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        VideoFormat::PRESETS
            .iter()
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| AirmixError::format(format!("unknown video format '{}'", s)))
    }
}

/// Immutable description of the compositor's output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDesc {
    pub format: VideoFormat,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    pub field_mode: FieldMode,
    /// Frame rate numerator.
    pub time_scale: u32,
    /// Frame rate denominator.
    pub duration: u32,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
}

impl FormatDesc {
    /// Descriptor for a named preset.
    pub fn preset(format: VideoFormat) -> Result<Self, AirmixError> {
        use FieldMode::*;
        let (width, height, field_mode, time_scale, duration) = match format {
            VideoFormat::Pal => (720, 576, Upper, 25, 1),
            VideoFormat::Ntsc => (720, 486, Lower, 30000, 1001),
            VideoFormat::X576p2500 => (720, 576, Progressive, 25, 1),
            VideoFormat::X720p2500 => (1280, 720, Progressive, 25, 1),
            VideoFormat::X720p5000 => (1280, 720, Progressive, 50, 1),
            VideoFormat::X720p5994 => (1280, 720, Progressive, 60000, 1001),
            VideoFormat::X720p6000 => (1280, 720, Progressive, 60, 1),
            VideoFormat::X1080i5000 => (1920, 1080, Upper, 25, 1),
            VideoFormat::X1080i5994 => (1920, 1080, Upper, 30000, 1001),
            VideoFormat::X1080i6000 => (1920, 1080, Upper, 30, 1),
            VideoFormat::X1080p2398 => (1920, 1080, Progressive, 24000, 1001),
            VideoFormat::X1080p2400 => (1920, 1080, Progressive, 24, 1),
            VideoFormat::X1080p2500 => (1920, 1080, Progressive, 25, 1),
            VideoFormat::X1080p2997 => (1920, 1080, Progressive, 30000, 1001),
            VideoFormat::X1080p3000 => (1920, 1080, Progressive, 30, 1),
            VideoFormat::X1080p5000 => (1920, 1080, Progressive, 50, 1),
            VideoFormat::X1080p5994 => (1920, 1080, Progressive, 60000, 1001),
            VideoFormat::X1080p6000 => (1920, 1080, Progressive, 60, 1),
            VideoFormat::Custom => {
                return Err(AirmixError::format(
                    "custom formats need explicit dimensions, use FormatDesc::custom",
                ))
            }
        };
        Ok(Self {
            format,
            width,
            height,
            field_mode,
            time_scale,
            duration,
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
        })
    }

    /// Progressive descriptor with an arbitrary size and integer frame rate.
    pub fn custom(width: u32, height: u32, fps: u32) -> Self {
        Self {
            format: VideoFormat::Custom,
            width,
            height,
            field_mode: FieldMode::Progressive,
            time_scale: fps.max(1),
            duration: 1,
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
        }
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.time_scale as f64 / self.duration as f64
    }

    /// Wall-clock length of one tick.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps())
    }

    /// Byte size of one RGBA8 output frame.
    pub fn frame_size(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }

    /// Interleaved samples (all channels) carried by one output frame.
    pub fn audio_samples_per_frame(&self) -> usize {
        let per_channel = (self.audio_sample_rate as u64 * self.duration as u64
            + self.time_scale as u64 / 2)
            / self.time_scale as u64;
        per_channel as usize * self.audio_channels as usize
    }
}

impl FromStr for FormatDesc {
    type Err = AirmixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatDesc::preset(s.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_roundtrips_through_name() {
        for preset in VideoFormat::PRESETS {
            assert_eq!(preset.name().parse::<VideoFormat>().unwrap(), preset);
        }
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = "4320p12000".parse::<VideoFormat>().unwrap_err();
        assert!(err.to_string().contains("unknown video format"));
    }

    #[test]
    fn test_custom_preset_needs_dimensions() {
        assert!(FormatDesc::preset(VideoFormat::Custom).is_err());
    }

    #[test]
    fn test_1080p5000_desc() {
        let desc: FormatDesc = "1080p5000".parse().unwrap();
        assert_eq!((desc.width, desc.height), (1920, 1080));
        assert_eq!(desc.fps(), 50.0);
        assert_eq!(desc.frame_size(), 1920 * 1080 * 4);
        assert_eq!(desc.audio_samples_per_frame(), 960 * 2);
    }

    #[test]
    fn test_ntsc_rate_is_fractional() {
        let desc = FormatDesc::preset(VideoFormat::Ntsc).unwrap();
        assert!((desc.fps() - 29.97).abs() < 0.01);
        assert_eq!(desc.field_mode, FieldMode::Lower);
        // 48000 * 1001 / 30000 = 1601.6, rounded.
        assert_eq!(desc.audio_samples_per_frame(), 1602 * 2);
    }

    #[test]
    fn test_custom_desc() {
        let desc = FormatDesc::custom(64, 32, 25);
        assert_eq!(desc.format, VideoFormat::Custom);
        assert_eq!(desc.frame_size(), 64 * 32 * 4);
        assert_eq!(desc.frame_interval().as_millis(), 40);
    }
}
