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

//! Common enums, constants and small helper types shared by the rendering API.

use serde::{Deserialize, Serialize};

/// A value of a GPU fence counter. Fences only ever move forward.
pub type FenceValue = u64;

/// The value a fence reports once the device that owns it has been removed.
pub const FENCE_VALUE_DEVICE_REMOVED: FenceValue = u64::MAX;

/// Placement alignment of constant buffer views, in bytes.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Row pitch alignment of texture data inside a buffer, in bytes.
pub const TEXTURE_DATA_PITCH_ALIGNMENT: u64 = 256;

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// The physical type of a graphics adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterDeviceType {
    /// A GPU integrated with the CPU.
    IntegratedGpu,
    /// A dedicated GPU.
    DiscreteGpu,
    /// A virtualized GPU.
    VirtualGpu,
    /// A CPU rasterizer.
    Cpu,
    /// Unknown adapter type.
    #[default]
    Unknown,
}

/// Description of an adapter as reported by the graphics instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Human-readable adapter name.
    pub name: String,
    /// PCI vendor id.
    pub vendor_id: u32,
    /// PCI device id.
    pub device_id: u32,
    /// The physical type of the adapter.
    pub device_type: AdapterDeviceType,
    /// Dedicated video memory in bytes.
    pub dedicated_video_memory: u64,
    /// Whether this is a software (CPU) rasterizer.
    pub is_software: bool,
}

/// Debugging switches passed to the device at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceOptions {
    /// Enables the API validation layer.
    pub debug_layer: bool,
    /// Enables GPU-based validation on top of the debug layer.
    pub gpu_validation: bool,
    /// Break into the debugger when the validation layer reports an error.
    pub break_on_error: bool,
}

/// Pixel formats used by render targets, depth buffers and textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit BGRA, normalized.
    Bgra8Unorm,
    /// 32-bit float red channel.
    R32Float,
    /// 32-bit float depth.
    D32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Bgra8Unorm
            | TextureFormat::R32Float
            | TextureFormat::D32Float => 4,
        }
    }

    /// Whether the format is a depth format.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::D32Float)
    }
}

/// The format of index buffer elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Independent lines.
    LineList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_boundaries() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
