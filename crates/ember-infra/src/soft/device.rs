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

use super::fence::{FenceShared, SoftFence};
use super::gpu::{DescriptorContent, GpuState, SoftDeviceConfig};
use super::journal::JournalEvent;
use super::queue::SoftQueue;
use super::swap_chain::SoftSwapChain;
use super::timeline::Timeline;
use ember_core::renderer::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_FENCE_LABEL: AtomicUsize = AtomicUsize::new(0);

/// A logical device of the soft backend.
///
/// Besides implementing [`GraphicsDevice`], it exposes the inspection hooks a
/// graphics debugger would: the event journal, the validation messages, the
/// GPU-side state of resources, and fault injection.
#[derive(Debug, Clone)]
pub struct SoftDevice {
    gpu: Arc<GpuState>,
    timeline: Arc<Timeline>,
}

impl SoftDevice {
    pub(crate) fn new(
        adapter: AdapterInfo,
        options: DeviceOptions,
        config: SoftDeviceConfig,
    ) -> Result<Self, RenderError> {
        let gpu = Arc::new(GpuState::new(adapter, options, config));
        let timeline = Timeline::spawn(gpu.clone()).map_err(|e| {
            RenderError::InitializationFailed(format!("failed to start the GPU timeline: {e}"))
        })?;
        if options.debug_layer {
            log::info!(
                "Debug layer enabled (GPU-based validation: {}, break on error: {}).",
                options.gpu_validation,
                options.break_on_error
            );
        }
        Ok(Self {
            gpu,
            timeline: Arc::new(timeline),
        })
    }

    /// Returns a copy of every event recorded so far.
    pub fn journal(&self) -> Vec<JournalEvent> {
        self.gpu.journal()
    }

    /// Forgets the recorded events.
    pub fn clear_journal(&self) {
        self.gpu.clear_journal();
    }

    /// Returns every message the validation layer produced.
    pub fn validation_errors(&self) -> Vec<String> {
        self.gpu.validation_errors()
    }

    /// Simulates a device removal (TDR, driver update, unplugged GPU).
    pub fn remove_device(&self, reason: &str) {
        self.gpu.remove(reason);
    }

    /// Makes every later compilation of a shader whose label contains
    /// `pattern` fail.
    pub fn fail_shader_compilation(&self, pattern: &str) {
        self.gpu.fail_shaders_matching(pattern.to_string());
    }

    /// Sets the artificial latency of each command list execution.
    pub fn set_execution_delay(&self, delay: Duration) {
        self.gpu.set_execution_delay(delay);
    }

    /// Returns the state of a resource as seen by the GPU timeline.
    pub fn resource_state(&self, id: ResourceId) -> Option<ResourceState> {
        self.gpu.resource_state(id)
    }

    /// Returns the raw contents of any resource, bypassing heap rules.
    pub fn capture_resource(&self, id: ResourceId) -> Option<Vec<u8>> {
        self.gpu.capture_resource(id)
    }

    /// Returns the number of resources that are still alive.
    pub fn live_resource_count(&self) -> usize {
        self.gpu.live_resource_count()
    }

    /// Returns `true` once the GPU timeline caught up with every submission.
    pub fn is_idle(&self) -> bool {
        self.gpu.is_idle()
    }
}

impl GraphicsDevice for SoftDevice {
    fn adapter_info(&self) -> AdapterInfo {
        self.gpu.adapter.clone()
    }

    fn removed_reason(&self) -> Option<String> {
        self.gpu.removed_reason()
    }

    fn create_command_queue(&self) -> Result<Arc<dyn CommandQueue>, RenderError> {
        self.gpu.check_removed()?;
        Ok(Arc::new(SoftQueue {
            gpu: self.gpu.clone(),
            timeline: self.timeline.clone(),
        }))
    }

    fn create_fence(&self, initial_value: FenceValue) -> Result<Arc<dyn Fence>, RenderError> {
        self.gpu.check_removed()?;
        let label = format!("Fence {}", NEXT_FENCE_LABEL.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(FenceShared::new(label, initial_value));
        self.gpu.register_fence(&shared);
        Ok(Arc::new(SoftFence { shared }))
    }

    fn create_command_allocator(&self, label: &str) -> Result<CommandAllocatorId, ResourceError> {
        if let Some(reason) = self.gpu.removed_reason() {
            return Err(ResourceError::BackendError(format!("device removed: {reason}")));
        }
        Ok(self.gpu.create_allocator(label))
    }

    fn reset_command_allocator(&self, id: CommandAllocatorId) -> Result<(), RenderError> {
        self.gpu.reset_allocator(id)
    }

    fn create_swap_chain(
        &self,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Box<dyn SwapChain>, RenderError> {
        self.gpu.check_removed()?;
        let swap_chain = SoftSwapChain::new(self.gpu.clone(), self.timeline.clone(), descriptor)?;
        log::info!(
            "Created a {}x{} swap chain with {} back buffers ({:?}).",
            descriptor.width,
            descriptor.height,
            descriptor.buffer_count,
            descriptor.format
        );
        Ok(Box::new(swap_chain))
    }

    fn create_resource(&self, descriptor: &ResourceDescriptor) -> Result<ResourceId, ResourceError> {
        self.gpu.create_resource(descriptor)
    }

    fn destroy_resource(&self, id: ResourceId) -> Result<(), ResourceError> {
        self.gpu.destroy_resource(id)
    }

    fn write_resource(&self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.gpu.write_resource(id, offset, data)
    }

    fn read_resource(&self, id: ResourceId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError> {
        self.gpu.read_resource(id, offset, len)
    }

    fn gpu_virtual_address(&self, id: ResourceId) -> Result<GpuVirtualAddress, ResourceError> {
        self.gpu.gpu_virtual_address(id)
    }

    fn memory_usage(&self) -> u64 {
        self.gpu.memory_usage()
    }

    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapInfo, ResourceError> {
        self.gpu.create_descriptor_heap(descriptor)
    }

    fn create_shader_resource_view(
        &self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        match self.gpu.resource_kind(resource)? {
            ResourceKind::Texture2D { format, .. } if !format.is_depth() => self.gpu.write_descriptor(
                dest,
                DescriptorHeapKind::CbvSrvUav,
                DescriptorContent::ShaderResource(resource),
            ),
            kind => Err(ResourceError::InvalidDescriptor(format!(
                "cannot create a shader resource view of {kind:?}"
            ))),
        }
    }

    fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        self.gpu.write_descriptor(
            dest,
            DescriptorHeapKind::Sampler,
            DescriptorContent::Sampler(*descriptor),
        )
    }

    fn create_render_target_view(
        &self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        match self.gpu.resource_kind(resource)? {
            ResourceKind::Texture2D { format, .. } if !format.is_depth() => self.gpu.write_descriptor(
                dest,
                DescriptorHeapKind::Rtv,
                DescriptorContent::RenderTarget(resource),
            ),
            kind => Err(ResourceError::InvalidDescriptor(format!(
                "cannot create a render target view of {kind:?}"
            ))),
        }
    }

    fn create_depth_stencil_view(
        &self,
        resource: ResourceId,
        dest: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        match self.gpu.resource_kind(resource)? {
            ResourceKind::Texture2D { format, .. } if format.is_depth() => self.gpu.write_descriptor(
                dest,
                DescriptorHeapKind::Dsv,
                DescriptorContent::DepthStencil(resource),
            ),
            kind => Err(ResourceError::InvalidDescriptor(format!(
                "cannot create a depth stencil view of {kind:?}"
            ))),
        }
    }

    fn compile_shader(&self, source: &ShaderSource) -> Result<ShaderModuleId, ShaderError> {
        self.gpu.compile_shader(source)
    }

    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<RootSignatureId, PipelineError> {
        self.gpu.create_root_signature(descriptor)
    }

    fn create_pipeline_state(
        &self,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, PipelineError> {
        self.gpu.create_pipeline_state(descriptor)
    }
}
