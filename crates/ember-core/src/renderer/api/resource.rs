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

//! GPU resources: buffers and 2D textures living in one of the memory heaps.

use super::common::{align_up, IndexFormat, TextureFormat, TEXTURE_DATA_PITCH_ALIGNMENT};
use std::borrow::Cow;

/// An opaque handle to a GPU resource created by a [`GraphicsDevice`].
///
/// [`GraphicsDevice`]: crate::renderer::traits::GraphicsDevice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

/// A GPU virtual address, as bound into root constant buffer views and buffer views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GpuVirtualAddress(pub u64);

impl GpuVirtualAddress {
    /// Returns the address `bytes` further into the same allocation.
    #[inline]
    pub fn offset(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

/// The memory pool a resource is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// GPU-resident memory. Not CPU-accessible; filled through copies.
    Default,
    /// CPU-writable memory the GPU can read. Stays mapped for its lifetime.
    Upload,
    /// GPU-writable memory the CPU can read back.
    Readback,
}

impl HeapKind {
    /// Whether the CPU may write into resources of this heap.
    pub fn is_cpu_writable(self) -> bool {
        matches!(self, HeapKind::Upload)
    }

    /// Whether the CPU may read resources of this heap.
    pub fn is_cpu_readable(self) -> bool {
        matches!(self, HeapKind::Upload | HeapKind::Readback)
    }
}

/// The usage state of a resource on the GPU timeline.
///
/// Every transition between states must be declared explicitly with a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// The neutral state resources are created in.
    Common,
    /// Ready to be handed to the presentation engine.
    Present,
    /// Read as vertex or constant buffer.
    VertexAndConstantBuffer,
    /// Read as index buffer.
    IndexBuffer,
    /// Written as a color render target.
    RenderTarget,
    /// Written as a depth buffer.
    DepthWrite,
    /// Sampled by pixel shaders.
    PixelShaderResource,
    /// Destination of a copy.
    CopyDest,
    /// Source of a copy.
    CopySource,
    /// The required state of upload heap resources.
    GenericRead,
}

/// What kind of resource to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A linear buffer of `size` bytes.
    Buffer {
        /// Size in bytes.
        size: u64,
    },
    /// A single-mip 2D texture.
    Texture2D {
        /// Width in texels.
        width: u32,
        /// Height in texels.
        height: u32,
        /// Texel format.
        format: TextureFormat,
    },
}

impl ResourceKind {
    /// The number of bytes the resource occupies.
    pub fn byte_size(&self) -> u64 {
        match *self {
            ResourceKind::Buffer { size } => size,
            ResourceKind::Texture2D {
                width,
                height,
                format,
            } => width as u64 * height as u64 * format.bytes_per_pixel() as u64,
        }
    }
}

/// An optimized clear value supplied at creation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color for render targets.
    Color([f32; 4]),
    /// Clear depth and stencil for depth buffers.
    DepthStencil {
        /// Depth value.
        depth: f32,
        /// Stencil value.
        stencil: u8,
    },
}

/// A descriptor used to create a GPU resource.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor<'a> {
    /// Debug name, shown by validation messages and graphics debuggers.
    pub label: Option<Cow<'a, str>>,
    /// Buffer or texture.
    pub kind: ResourceKind,
    /// Where the resource lives.
    pub heap: HeapKind,
    /// The state the resource starts in.
    pub initial_state: ResourceState,
    /// Optional optimized clear value.
    pub clear_value: Option<ClearValue>,
}

impl<'a> ResourceDescriptor<'a> {
    /// Describes a buffer.
    pub fn buffer(
        label: impl Into<Cow<'a, str>>,
        size: u64,
        heap: HeapKind,
        initial_state: ResourceState,
    ) -> Self {
        Self {
            label: Some(label.into()),
            kind: ResourceKind::Buffer { size },
            heap,
            initial_state,
            clear_value: None,
        }
    }

    /// Describes a GPU-resident 2D texture.
    pub fn texture_2d(
        label: impl Into<Cow<'a, str>>,
        width: u32,
        height: u32,
        format: TextureFormat,
        initial_state: ResourceState,
    ) -> Self {
        Self {
            label: Some(label.into()),
            kind: ResourceKind::Texture2D {
                width,
                height,
                format,
            },
            heap: HeapKind::Default,
            initial_state,
            clear_value: None,
        }
    }

    /// Sets the optimized clear value.
    pub fn with_clear_value(mut self, clear_value: ClearValue) -> Self {
        self.clear_value = Some(clear_value);
        self
    }
}

/// How a 2D texture's texels are laid out inside a buffer for copies.
///
/// Rows are padded to [`TEXTURE_DATA_PITCH_ALIGNMENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFootprint {
    /// Byte offset of the first row inside the buffer.
    pub offset: u64,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Distance in bytes between the starts of two consecutive rows.
    pub row_pitch: u64,
}

impl TextureFootprint {
    /// Computes the placed footprint of a texture at offset 0.
    pub fn for_texture(width: u32, height: u32, format: TextureFormat) -> Self {
        let tight = width as u64 * format.bytes_per_pixel() as u64;
        Self {
            offset: 0,
            width,
            height,
            format,
            row_pitch: align_up(tight, TEXTURE_DATA_PITCH_ALIGNMENT),
        }
    }

    /// Bytes of actual texel data in one row.
    #[inline]
    pub fn tight_row_size(&self) -> u64 {
        self.width as u64 * self.format.bytes_per_pixel() as u64
    }

    /// Size of the buffer needed to hold the footprint.
    #[inline]
    pub fn total_size(&self) -> u64 {
        self.offset + self.row_pitch * self.height as u64
    }
}

/// A view of a vertex buffer bound to the input assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferView {
    /// The buffer the view points into.
    pub resource: ResourceId,
    /// Start address.
    pub address: GpuVirtualAddress,
    /// Size in bytes.
    pub size: u32,
    /// Distance in bytes between two vertices.
    pub stride: u32,
}

/// A view of an index buffer bound to the input assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    /// The buffer the view points into.
    pub resource: ResourceId,
    /// Start address.
    pub address: GpuVirtualAddress,
    /// Size in bytes.
    pub size: u32,
    /// Index element format.
    pub format: IndexFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_pads_rows_to_pitch_alignment() {
        let fp = TextureFootprint::for_texture(3, 2, TextureFormat::Rgba8Unorm);
        assert_eq!(fp.tight_row_size(), 12);
        assert_eq!(fp.row_pitch, 256);
        assert_eq!(fp.total_size(), 512);

        let wide = TextureFootprint::for_texture(64, 1, TextureFormat::Rgba8Unorm);
        assert_eq!(wide.row_pitch, 256);
        let wider = TextureFootprint::for_texture(65, 1, TextureFormat::Rgba8Unorm);
        assert_eq!(wider.row_pitch, 512);
    }
}
