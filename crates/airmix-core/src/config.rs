use serde::{Deserialize, Serialize};

use crate::error::{AirmixError, AirmixResult};
use crate::format::{FormatDesc, VideoFormat};

/// Task queue bound used when none is configured.
pub const DEFAULT_TASK_QUEUE_CAPACITY: usize = 6;

/// Which graphics device the compositor worker opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackend {
    /// CPU rasterizer, always available.
    #[default]
    Software,
    /// Headless wgpu device (Metal, Vulkan, DX12, GL).
    Wgpu,
}

impl std::str::FromStr for DeviceBackend {
    type Err = AirmixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software" | "cpu" => Ok(DeviceBackend::Software),
            "wgpu" | "gpu" => Ok(DeviceBackend::Wgpu),
            other => Err(AirmixError::InvalidArgument(format!(
                "unknown device backend '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FormatConfig {
    /// A preset name such as `1080p5000`, or `custom`.
    pub name: String,
    /// Only read when `name = "custom"`.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            name: VideoFormat::X1080p5000.name().to_string(),
            width: None,
            height: None,
            fps: None,
        }
    }
}

impl FormatConfig {
    pub fn to_desc(&self) -> AirmixResult<FormatDesc> {
        let format: VideoFormat = if self.name.eq_ignore_ascii_case("custom") {
            VideoFormat::Custom
        } else {
            self.name.parse()?
        };
        match format {
            VideoFormat::Custom => match (self.width, self.height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => {
                    Ok(FormatDesc::custom(w, h, self.fps.unwrap_or(25)))
                }
                _ => Err(AirmixError::format(
                    "custom format requires non-zero width and height",
                )),
            },
            preset => FormatDesc::preset(preset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub backend: DeviceBackend,
    /// Pending closures allowed before `push` blocks.
    pub task_queue_capacity: usize,
    /// Finished frames kept for consumers; 0 means unbounded, otherwise the
    /// oldest frame is dropped when a new one arrives at capacity.
    pub output_capacity: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            backend: DeviceBackend::Software,
            task_queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            output_capacity: 0,
        }
    }
}

impl CompositorConfig {
    /// The output channel bound, `None` when unbounded.
    pub fn output_bound(&self) -> Option<usize> {
        (self.output_capacity > 0).then_some(self.output_capacity)
    }

    pub fn with_backend(mut self, backend: DeviceBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AirmixConfig {
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AirmixConfig {
    pub fn from_toml(contents: &str) -> AirmixResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> AirmixResult<String> {
        toml::to_string_pretty(self).map_err(|e| AirmixError::Other(e.to_string()))
    }

    pub fn load_from_file(path: &std::path::Path) -> AirmixResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> AirmixResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
