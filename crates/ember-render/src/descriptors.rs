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

//! Append-only allocators over the shader-visible descriptor heaps.

use ember_core::renderer::*;
use std::fmt;

/// Index of a descriptor inside a shader-visible heap.
///
/// [`DescriptorIndex::INVALID`] is returned once a heap is exhausted and must
/// be treated as "skip this binding".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorIndex(u32);

impl DescriptorIndex {
    /// The exhaustion sentinel.
    pub const INVALID: Self = Self(u32::MAX);

    /// Wraps a raw index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Whether the index points at a real descriptor.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// The raw index, or `None` for the sentinel.
    #[inline]
    pub fn get(self) -> Option<u32> {
        self.is_valid().then_some(self.0)
    }
}

impl fmt::Debug for DescriptorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(index) => write!(f, "DescriptorIndex({index})"),
            None => f.write_str("DescriptorIndex(INVALID)"),
        }
    }
}

/// Hands out the descriptors of one fixed-capacity heap, in order, without reuse.
#[derive(Debug)]
pub struct DescriptorAllocator {
    heap: DescriptorHeapInfo,
    next: u32,
    exhausted: bool,
}

impl DescriptorAllocator {
    /// Creates a shader-visible heap of `capacity` descriptors.
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        kind: DescriptorHeapKind,
        capacity: u32,
    ) -> Result<Self, ResourceError> {
        let heap = device.create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some(label.into()),
            kind,
            capacity,
            shader_visible: true,
        })?;
        Ok(Self::from_heap(heap))
    }

    /// Allocates over an existing heap.
    pub fn from_heap(heap: DescriptorHeapInfo) -> Self {
        Self {
            heap,
            next: 0,
            exhausted: false,
        }
    }

    /// Returns the next free descriptor, or [`DescriptorIndex::INVALID`] once the
    /// heap is full.
    pub fn allocate(&mut self) -> DescriptorIndex {
        if self.next >= self.heap.capacity {
            if !self.exhausted {
                log::warn!(
                    "{:?} descriptor heap exhausted ({} descriptors).",
                    self.heap.kind,
                    self.heap.capacity
                );
                self.exhausted = true;
            }
            return DescriptorIndex::INVALID;
        }
        let index = DescriptorIndex(self.next);
        self.next += 1;
        index
    }

    /// CPU handle of `index`, written by view creation.
    pub fn cpu_handle(&self, index: DescriptorIndex) -> Option<CpuDescriptorHandle> {
        self.heap.cpu_handle(index.get()?)
    }

    /// GPU handle of `index`, bound into descriptor tables.
    pub fn gpu_handle(&self, index: DescriptorIndex) -> Option<GpuDescriptorHandle> {
        self.heap.gpu_handle(index.get()?)
    }

    /// Number of descriptors handed out.
    pub fn allocated(&self) -> u32 {
        self.next.min(self.heap.capacity)
    }

    /// Heap capacity.
    pub fn capacity(&self) -> u32 {
        self.heap.capacity
    }

    /// The underlying heap.
    pub fn heap(&self) -> &DescriptorHeapInfo {
        &self.heap
    }
}

/// The two shader-visible heaps bound for every frame.
///
/// Index 0 of the sampler heap holds a linear-wrap sampler.
#[derive(Debug)]
pub struct ShaderVisibleDescriptors {
    /// CBV/SRV/UAV heap.
    pub srv: DescriptorAllocator,
    /// Sampler heap.
    pub sampler: DescriptorAllocator,
    default_sampler: DescriptorIndex,
}

impl ShaderVisibleDescriptors {
    /// Creates both heaps and the default sampler.
    pub fn new(
        device: &dyn GraphicsDevice,
        srv_capacity: u32,
        sampler_capacity: u32,
    ) -> Result<Self, ResourceError> {
        let srv = DescriptorAllocator::new(
            device,
            "Shader Visible SRV Heap",
            DescriptorHeapKind::CbvSrvUav,
            srv_capacity,
        )?;
        let mut sampler = DescriptorAllocator::new(
            device,
            "Shader Visible Sampler Heap",
            DescriptorHeapKind::Sampler,
            sampler_capacity,
        )?;
        let default_sampler = sampler.allocate();
        let handle = sampler
            .cpu_handle(default_sampler)
            .ok_or(ResourceError::OutOfBounds)?;
        device.create_sampler(&SamplerDescriptor::LINEAR_WRAP, handle)?;
        log::debug!(
            "Descriptor heaps created: {srv_capacity} SRV, {sampler_capacity} sampler descriptors."
        );
        Ok(Self {
            srv,
            sampler,
            default_sampler,
        })
    }

    /// The linear-wrap sampler created with the heaps.
    pub fn default_sampler(&self) -> DescriptorIndex {
        self.default_sampler
    }

    /// The heaps to bind with `SetDescriptorHeaps`.
    pub fn heaps(&self) -> Vec<DescriptorHeapId> {
        vec![self.srv.heap().id, self.sampler.heap().id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap(capacity: u32) -> DescriptorHeapInfo {
        DescriptorHeapInfo {
            id: DescriptorHeapId(1),
            kind: DescriptorHeapKind::CbvSrvUav,
            capacity,
            cpu_base: CpuDescriptorHandle(0x1000),
            gpu_base: Some(GpuDescriptorHandle(0x9000)),
            stride: 32,
        }
    }

    #[test]
    fn indices_are_handed_out_in_order() {
        let mut allocator = DescriptorAllocator::from_heap(heap(3));
        let indices: Vec<_> = (0..3).map(|_| allocator.allocate().get()).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn handles_follow_the_stride() {
        let mut allocator = DescriptorAllocator::from_heap(heap(4));
        allocator.allocate();
        let second = allocator.allocate();
        assert_eq!(allocator.cpu_handle(second), Some(CpuDescriptorHandle(0x1000 + 32)));
        assert_eq!(allocator.gpu_handle(second), Some(GpuDescriptorHandle(0x9000 + 32)));
    }

    #[test]
    fn sentinel_has_no_handles() {
        let allocator = DescriptorAllocator::from_heap(heap(4));
        assert!(!DescriptorIndex::INVALID.is_valid());
        assert_eq!(allocator.cpu_handle(DescriptorIndex::INVALID), None);
        assert_eq!(allocator.gpu_handle(DescriptorIndex::INVALID), None);
    }

    #[test]
    fn exhaustion_is_sticky_and_harmless() {
        let mut allocator = DescriptorAllocator::from_heap(heap(2));
        let first = allocator.allocate();
        allocator.allocate();
        for _ in 0..5 {
            assert_eq!(allocator.allocate(), DescriptorIndex::INVALID);
        }
        assert_eq!(allocator.allocated(), 2);
        assert_eq!(allocator.cpu_handle(first), Some(CpuDescriptorHandle(0x1000)));
    }
}
