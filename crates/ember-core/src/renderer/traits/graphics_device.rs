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

use super::{CommandQueue, Fence, SwapChain};
use crate::renderer::api::*;
use crate::renderer::error::{PipelineError, RenderError, ResourceError, ShaderError};
use std::fmt::Debug;
use std::sync::Arc;

/// The logical device: exclusive owner of every GPU object.
///
/// The device is created once, shared by the whole renderer, and destroyed last,
/// after all in-flight work has been waited for.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Returns the adapter the device was created on.
    fn adapter_info(&self) -> AdapterInfo;

    /// Returns the removal reason if the device was removed or reset.
    fn removed_reason(&self) -> Option<String>;

    /// Creates a direct command queue.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was removed.
    fn create_command_queue(&self) -> Result<Arc<dyn CommandQueue>, RenderError>;

    /// Creates a fence starting at `initial_value`.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was removed.
    fn create_fence(&self, initial_value: FenceValue) -> Result<Arc<dyn Fence>, RenderError>;

    /// Creates a command allocator backing the memory of recorded command lists.
    /// ## Arguments
    /// * `label` - A debug name for the allocator.
    fn create_command_allocator(&self, label: &str) -> Result<CommandAllocatorId, ResourceError>;

    /// Reclaims the memory of every list recorded from the allocator.
    ///
    /// The caller must guarantee the GPU finished executing those lists.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was removed.
    /// * `RenderError::ResourceError` - If the allocator is unknown.
    fn reset_command_allocator(&self, id: CommandAllocatorId) -> Result<(), RenderError>;

    /// Creates a swap chain presenting through the direct queue.
    /// ## Arguments
    /// * `descriptor` - Size, buffer count and format of the back buffers.
    /// ## Returns
    /// The swap chain. Its back buffers start in [`ResourceState::Present`].
    fn create_swap_chain(
        &self,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Box<dyn SwapChain>, RenderError>;

    /// Creates a buffer or texture.
    /// ## Arguments
    /// * `descriptor` - Kind, heap and initial state of the resource.
    /// ## Returns
    /// The ID of the created resource.
    /// ## Errors
    /// * `ResourceError::OutOfMemory` - If the device memory budget is exhausted.
    /// * `ResourceError::InvalidDescriptor` - If the descriptor is malformed.
    fn create_resource(&self, descriptor: &ResourceDescriptor) -> Result<ResourceId, ResourceError>;

    /// Releases a resource.
    ///
    /// The caller must guarantee no submitted work still references it.
    fn destroy_resource(&self, id: ResourceId) -> Result<(), ResourceError>;

    /// Maps a CPU-writable resource, copies `data` at `offset`, and unmaps it.
    /// ## Errors
    /// * `ResourceError::NotCpuAccessible` - If the resource is not in an upload heap.
    /// * `ResourceError::OutOfBounds` - If the range exceeds the resource.
    fn write_resource(&self, id: ResourceId, offset: u64, data: &[u8])
        -> Result<(), ResourceError>;

    /// Maps a CPU-readable resource and copies `len` bytes from `offset`.
    /// ## Errors
    /// * `ResourceError::NotCpuAccessible` - If the resource is in the default heap.
    /// * `ResourceError::OutOfBounds` - If the range exceeds the resource.
    fn read_resource(&self, id: ResourceId, offset: u64, len: u64)
        -> Result<Vec<u8>, ResourceError>;

    /// Returns the GPU virtual address of a buffer.
    fn gpu_virtual_address(&self, id: ResourceId) -> Result<GpuVirtualAddress, ResourceError>;

    /// Returns the number of bytes currently allocated by live resources.
    fn memory_usage(&self) -> u64;

    /// Creates a descriptor heap with a fixed capacity.
    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapInfo, ResourceError>;

    /// Writes a shader resource view of a texture at `dest`.
    fn create_shader_resource_view(
        &self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError>;

    /// Writes a sampler at `dest`.
    fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError>;

    /// Writes a render target view of a color texture at `dest`.
    fn create_render_target_view(
        &self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError>;

    /// Writes a depth stencil view of a depth texture at `dest`.
    fn create_depth_stencil_view(
        &self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError>;

    /// Compiles HLSL source into a shader module.
    /// ## Errors
    /// * `ShaderError::CompilationError` - If the compiler rejects the source.
    /// * `ShaderError::InvalidEntryPoint` - If the entry point does not exist.
    fn compile_shader(&self, source: &ShaderSource) -> Result<ShaderModuleId, ShaderError>;

    /// Creates a root signature.
    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<RootSignatureId, PipelineError>;

    /// Creates an immutable pipeline state object.
    fn create_pipeline_state(
        &self,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, PipelineError>;
}
