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

//! Descriptor heaps, descriptor handles and sampler descriptions.

use std::borrow::Cow;

/// An opaque handle to a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHeapId(pub usize);

/// The type of descriptors a heap stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Constant buffer, shader resource and unordered access views.
    CbvSrvUav,
    /// Samplers.
    Sampler,
    /// Render target views. Never shader visible.
    Rtv,
    /// Depth stencil views. Never shader visible.
    Dsv,
}

/// A descriptor used to create a descriptor heap.
#[derive(Debug, Clone)]
pub struct DescriptorHeapDescriptor<'a> {
    /// Debug name.
    pub label: Option<Cow<'a, str>>,
    /// Descriptor type.
    pub kind: DescriptorHeapKind,
    /// Fixed number of descriptors.
    pub capacity: u32,
    /// Whether shaders can reference the heap through descriptor tables.
    pub shader_visible: bool,
}

/// A CPU-side descriptor handle, written by view creation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuDescriptorHandle(pub u64);

/// A GPU-side descriptor handle, bound into descriptor tables at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuDescriptorHandle(pub u64);

/// Placement information of a created descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapInfo {
    /// The heap handle.
    pub id: DescriptorHeapId,
    /// Descriptor type.
    pub kind: DescriptorHeapKind,
    /// Number of descriptors.
    pub capacity: u32,
    /// Handle of descriptor 0 on the CPU side.
    pub cpu_base: CpuDescriptorHandle,
    /// Handle of descriptor 0 on the GPU side, when the heap is shader visible.
    pub gpu_base: Option<GpuDescriptorHandle>,
    /// Size in bytes of one descriptor.
    pub stride: u32,
}

impl DescriptorHeapInfo {
    /// CPU handle of descriptor `index`: `cpu_base + index * stride`.
    ///
    /// Returns `None` for indices past the capacity.
    pub fn cpu_handle(&self, index: u32) -> Option<CpuDescriptorHandle> {
        (index < self.capacity)
            .then(|| CpuDescriptorHandle(self.cpu_base.0 + index as u64 * self.stride as u64))
    }

    /// GPU handle of descriptor `index`: `gpu_base + index * stride`.
    ///
    /// Returns `None` for indices past the capacity or for heaps that are not
    /// shader visible.
    pub fn gpu_handle(&self, index: u32) -> Option<GpuDescriptorHandle> {
        let base = self.gpu_base?;
        (index < self.capacity)
            .then(|| GpuDescriptorHandle(base.0 + index as u64 * self.stride as u64))
    }
}

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Point,
    /// Bilinear.
    #[default]
    Linear,
}

/// Texture addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Repeat the texture.
    #[default]
    Wrap,
    /// Clamp to the edge texel.
    Clamp,
    /// Mirror on every repetition.
    Mirror,
}

/// Describes a sampler, either in a sampler heap or baked into a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDescriptor {
    /// Filtering for minification, magnification and mips.
    pub filter: FilterMode,
    /// Addressing on all three axes.
    pub address_mode: AddressMode,
}

impl SamplerDescriptor {
    /// Linear filtering with wrap addressing.
    pub const LINEAR_WRAP: Self = Self {
        filter: FilterMode::Linear,
        address_mode: AddressMode::Wrap,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_base_plus_index_times_stride() {
        let info = DescriptorHeapInfo {
            id: DescriptorHeapId(1),
            kind: DescriptorHeapKind::CbvSrvUav,
            capacity: 4,
            cpu_base: CpuDescriptorHandle(0x1000),
            gpu_base: Some(GpuDescriptorHandle(0x9000)),
            stride: 32,
        };
        assert_eq!(info.cpu_handle(3), Some(CpuDescriptorHandle(0x1000 + 96)));
        assert_eq!(info.gpu_handle(3), Some(GpuDescriptorHandle(0x9000 + 96)));
        assert_eq!(info.cpu_handle(4), None);

        let cpu_only = DescriptorHeapInfo {
            gpu_base: None,
            ..info
        };
        assert_eq!(cpu_only.gpu_handle(0), None);
    }
}
