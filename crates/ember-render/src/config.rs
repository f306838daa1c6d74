// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Renderer configuration, resolved once at initialization.

use ember_core::renderer::{RenderError, TextureFormat, MAX_BACK_BUFFERS, MIN_BACK_BUFFERS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// An error raised while loading or validating a [`RendererConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read renderer config '{path}': {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid RON.
    #[error("failed to parse renderer config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A field holds a value the renderer cannot work with.
    #[error("invalid renderer config field `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        RenderError::InitializationFailed(err.to_string())
    }
}

/// Settings of a [`Renderer`](crate::Renderer).
///
/// Every field can be omitted from a RON file; missing fields keep their
/// default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of swap chain back buffers, which is also the number of frames in flight.
    pub back_buffer_count: u32,
    /// Presents with a sync interval of 1 when enabled, 0 otherwise.
    pub vsync: bool,
    /// Enables the debug layer of the device.
    pub enable_debug_layer: bool,
    /// Enables GPU-based validation.
    pub enable_gpu_validation: bool,
    /// Breaks into the debugger on validation errors.
    pub enable_break_on_error: bool,
    /// Number of per-object constant slots available to one frame.
    pub max_objects: u32,
    /// Capacity of the shader-visible CBV/SRV/UAV heap.
    pub srv_heap_capacity: u32,
    /// Capacity of the shader-visible sampler heap.
    pub sampler_heap_capacity: u32,
    /// Upper bound of a single fence wait. `None` waits forever.
    pub gpu_wait_timeout_ms: Option<u64>,
    /// Format of the swap chain back buffers.
    pub back_buffer_format: TextureFormat,
    /// Format of the depth buffer.
    pub depth_format: TextureFormat,
    /// Whether software adapters may be picked during bootstrap.
    pub allow_software_adapter: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            back_buffer_count: 2,
            vsync: true,
            enable_debug_layer: cfg!(debug_assertions),
            enable_gpu_validation: cfg!(debug_assertions),
            enable_break_on_error: cfg!(debug_assertions),
            max_objects: 256,
            srv_heap_capacity: 1024,
            sampler_heap_capacity: 256,
            gpu_wait_timeout_ms: None,
            back_buffer_format: TextureFormat::Rgba8Unorm,
            depth_format: TextureFormat::D32Float,
            allow_software_adapter: false,
        }
    }
}

impl RendererConfig {
    /// Parses and validates a configuration written in RON.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a RON configuration file.
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&source)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_BACK_BUFFERS..=MAX_BACK_BUFFERS).contains(&self.back_buffer_count) {
            return Err(ConfigError::Invalid {
                field: "back_buffer_count",
                reason: format!(
                    "{} is outside {MIN_BACK_BUFFERS}..={MAX_BACK_BUFFERS}",
                    self.back_buffer_count
                ),
            });
        }
        if self.max_objects == 0 {
            return Err(ConfigError::Invalid {
                field: "max_objects",
                reason: "at least one object slot is required".to_string(),
            });
        }
        // Index 0 of each heap is taken by the renderer's own fallback descriptors.
        if self.srv_heap_capacity < 2 {
            return Err(ConfigError::Invalid {
                field: "srv_heap_capacity",
                reason: format!("{} leaves no room for textures", self.srv_heap_capacity),
            });
        }
        if self.sampler_heap_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "sampler_heap_capacity",
                reason: "the default sampler needs one slot".to_string(),
            });
        }
        if self.gpu_wait_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "gpu_wait_timeout_ms",
                reason: "a zero timeout fails every wait; use None to wait forever".to_string(),
            });
        }
        if self.back_buffer_format.is_depth() {
            return Err(ConfigError::Invalid {
                field: "back_buffer_format",
                reason: format!("{:?} is a depth format", self.back_buffer_format),
            });
        }
        if !self.depth_format.is_depth() {
            return Err(ConfigError::Invalid {
                field: "depth_format",
                reason: format!("{:?} is not a depth format", self.depth_format),
            });
        }
        Ok(())
    }

    /// The fence wait bound.
    pub fn gpu_wait_timeout(&self) -> Option<Duration> {
        self.gpu_wait_timeout_ms.map(Duration::from_millis)
    }

    /// The swap chain sync interval.
    pub fn sync_interval(&self) -> u32 {
        u32::from(self.vsync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.back_buffer_count, 2);
        assert_eq!(config.max_objects, 256);
        assert_eq!(config.sync_interval(), 1);
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = RendererConfig::from_ron_str(
            "(back_buffer_count: 3, vsync: false, gpu_wait_timeout_ms: Some(2000))",
        )
        .unwrap();
        assert_eq!(config.back_buffer_count, 3);
        assert_eq!(config.sync_interval(), 0);
        assert_eq!(config.gpu_wait_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.srv_heap_capacity, 1024);
    }

    #[test]
    fn out_of_range_buffer_count_is_rejected() {
        let err = RendererConfig::from_ron_str("(back_buffer_count: 5)").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "back_buffer_count",
                ..
            }
        ));
    }

    #[test]
    fn swapped_formats_are_rejected() {
        let config = RendererConfig {
            back_buffer_format: TextureFormat::D32Float,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_ron_reports_a_parse_error() {
        let err = RendererConfig::from_ron_str("(vsync: maybe)").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
