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

//! Object tables shared by the soft device, its queue and its GPU timeline.

use super::fence::FenceShared;
use super::journal::JournalEvent;
use ember_core::renderer::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Locks a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bits reserved for the byte offset inside a resource's GPU virtual address.
const ADDRESS_OFFSET_BITS: u32 = 32;
/// Bits reserved for the descriptor offset inside a descriptor handle.
const HANDLE_OFFSET_BITS: u32 = 40;
/// Marks GPU descriptor handles so they never alias CPU handles.
const GPU_HANDLE_TAG: u64 = 1 << 63;

#[derive(Debug)]
pub(crate) struct SoftResourceEntry {
    pub(crate) label: String,
    pub(crate) kind: ResourceKind,
    pub(crate) heap: HeapKind,
    /// State on the GPU timeline, updated as barriers execute.
    pub(crate) state: ResourceState,
    pub(crate) data: Vec<u8>,
    /// Serial of the last submission referencing the resource.
    pub(crate) last_use: u64,
}

#[derive(Debug)]
struct SoftAllocatorEntry {
    label: String,
    last_submission: u64,
}

/// What a descriptor slot was written with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DescriptorContent {
    ShaderResource(ResourceId),
    Sampler(SamplerDescriptor),
    RenderTarget(ResourceId),
    DepthStencil(ResourceId),
}

#[derive(Debug)]
struct SoftHeapEntry {
    info: DescriptorHeapInfo,
    slots: Vec<Option<DescriptorContent>>,
}

#[derive(Debug)]
struct SoftShaderEntry {
    label: String,
    stage: ShaderStage,
}

#[derive(Debug)]
pub(crate) struct SoftRootSignatureEntry {
    pub(crate) label: String,
    pub(crate) parameters: Vec<RootParameter>,
}

#[derive(Debug)]
pub(crate) struct SoftPipelineEntry {
    pub(crate) label: String,
    pub(crate) root_signature: RootSignatureId,
}

/// Tunables of a soft device.
#[derive(Debug, Clone)]
pub struct SoftDeviceConfig {
    /// Artificial latency of every command list execution on the GPU timeline.
    pub execution_delay: Duration,
    /// Bytes of device memory available to resources.
    pub memory_budget: u64,
    /// Shaders whose label contains one of these patterns fail to compile.
    pub failing_shaders: Vec<String>,
}

impl Default for SoftDeviceConfig {
    fn default() -> Self {
        Self {
            execution_delay: Duration::ZERO,
            memory_budget: 512 * 1024 * 1024,
            failing_shaders: Vec::new(),
        }
    }
}

/// The internal state of a soft device.
#[derive(Debug)]
pub(crate) struct GpuState {
    pub(crate) adapter: AdapterInfo,
    pub(crate) options: DeviceOptions,

    pub(crate) resources: Mutex<HashMap<ResourceId, SoftResourceEntry>>,
    allocators: Mutex<HashMap<CommandAllocatorId, SoftAllocatorEntry>>,
    heaps: Mutex<HashMap<DescriptorHeapId, SoftHeapEntry>>,
    shaders: Mutex<HashMap<ShaderModuleId, SoftShaderEntry>>,
    pub(crate) root_signatures: Mutex<HashMap<RootSignatureId, SoftRootSignatureEntry>>,
    pub(crate) pipelines: Mutex<HashMap<PipelineStateId, SoftPipelineEntry>>,
    fences: Mutex<Vec<Weak<FenceShared>>>,

    next_resource_id: AtomicUsize,
    next_allocator_id: AtomicUsize,
    next_heap_id: AtomicUsize,
    next_shader_id: AtomicUsize,
    next_root_signature_id: AtomicUsize,
    next_pipeline_id: AtomicUsize,

    memory_budget: u64,
    memory_allocated: AtomicU64,

    submitted_serial: AtomicU64,
    completed_serial: AtomicU64,

    removed: Mutex<Option<String>>,
    journal: Mutex<Vec<JournalEvent>>,
    validation: Mutex<Vec<String>>,
    failing_shaders: Mutex<Vec<String>>,
    execution_delay: Mutex<Duration>,
}

impl GpuState {
    pub(crate) fn new(adapter: AdapterInfo, options: DeviceOptions, config: SoftDeviceConfig) -> Self {
        Self {
            adapter,
            options,
            resources: Mutex::new(HashMap::new()),
            allocators: Mutex::new(HashMap::new()),
            heaps: Mutex::new(HashMap::new()),
            shaders: Mutex::new(HashMap::new()),
            root_signatures: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            fences: Mutex::new(Vec::new()),
            // Id 0 is never handed out so a zero address or handle is always invalid.
            next_resource_id: AtomicUsize::new(1),
            next_allocator_id: AtomicUsize::new(1),
            next_heap_id: AtomicUsize::new(1),
            next_shader_id: AtomicUsize::new(1),
            next_root_signature_id: AtomicUsize::new(1),
            next_pipeline_id: AtomicUsize::new(1),
            memory_budget: config.memory_budget,
            memory_allocated: AtomicU64::new(0),
            submitted_serial: AtomicU64::new(0),
            completed_serial: AtomicU64::new(0),
            removed: Mutex::new(None),
            journal: Mutex::new(Vec::new()),
            validation: Mutex::new(Vec::new()),
            failing_shaders: Mutex::new(config.failing_shaders),
            execution_delay: Mutex::new(config.execution_delay),
        }
    }

    // --- Diagnostics ---

    pub(crate) fn record(&self, event: JournalEvent) {
        lock(&self.journal).push(event);
    }

    pub(crate) fn journal(&self) -> Vec<JournalEvent> {
        lock(&self.journal).clone()
    }

    pub(crate) fn clear_journal(&self) {
        lock(&self.journal).clear();
    }

    /// Records a validation-layer message.
    pub(crate) fn report(&self, message: String) {
        if self.options.debug_layer {
            log::error!("[validation] {message}");
        } else {
            log::debug!("[validation] {message}");
        }
        lock(&self.validation).push(message);
    }

    pub(crate) fn validation_errors(&self) -> Vec<String> {
        lock(&self.validation).clone()
    }

    pub(crate) fn fail_shaders_matching(&self, pattern: String) {
        lock(&self.failing_shaders).push(pattern);
    }

    pub(crate) fn execution_delay(&self) -> Duration {
        *lock(&self.execution_delay)
    }

    pub(crate) fn set_execution_delay(&self, delay: Duration) {
        *lock(&self.execution_delay) = delay;
    }

    // --- Device removal ---

    pub(crate) fn removed_reason(&self) -> Option<String> {
        lock(&self.removed).clone()
    }

    pub(crate) fn is_removed(&self) -> bool {
        lock(&self.removed).is_some()
    }

    pub(crate) fn check_removed(&self) -> Result<(), RenderError> {
        match self.removed_reason() {
            Some(reason) => Err(RenderError::DeviceLost { reason }),
            None => Ok(()),
        }
    }

    /// Removes the device: every fence jumps to the removal value and all
    /// registered events fire.
    pub(crate) fn remove(&self, reason: &str) {
        {
            let mut removed = lock(&self.removed);
            if removed.is_some() {
                return;
            }
            *removed = Some(reason.to_string());
        }
        log::error!("Device '{}' removed: {reason}", self.adapter.name);
        self.record(JournalEvent::DeviceRemoved {
            reason: reason.to_string(),
        });
        let fences = lock(&self.fences);
        for fence in fences.iter().filter_map(Weak::upgrade) {
            fence.complete(FENCE_VALUE_DEVICE_REMOVED);
        }
    }

    pub(crate) fn register_fence(&self, fence: &Arc<FenceShared>) {
        let mut fences = lock(&self.fences);
        fences.retain(|f| f.strong_count() > 0);
        fences.push(Arc::downgrade(fence));
    }

    // --- Timeline serials ---

    pub(crate) fn next_serial(&self) -> u64 {
        self.submitted_serial.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn complete_serial(&self, serial: u64) {
        self.completed_serial.fetch_max(serial, Ordering::AcqRel);
    }

    pub(crate) fn completed_serial(&self) -> u64 {
        self.completed_serial.load(Ordering::Acquire)
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.completed_serial() >= self.submitted_serial.load(Ordering::Acquire)
    }

    /// Marks the allocator and every resource a list references as used by `serial`.
    pub(crate) fn mark_submission(&self, serial: u64, list: &CommandList) {
        if let Some(allocator) = list.allocator() {
            if let Some(entry) = lock(&self.allocators).get_mut(&allocator) {
                entry.last_submission = serial;
            }
        }
        let referenced = self.referenced_resources(list.commands());
        let mut resources = lock(&self.resources);
        for id in referenced {
            if let Some(entry) = resources.get_mut(&id) {
                entry.last_use = serial;
            }
        }
    }

    pub(crate) fn mark_resource_use(&self, id: ResourceId, serial: u64) {
        if let Some(entry) = lock(&self.resources).get_mut(&id) {
            entry.last_use = serial;
        }
    }

    pub(crate) fn is_resource_in_flight(&self, id: ResourceId) -> bool {
        let completed = self.completed_serial();
        lock(&self.resources)
            .get(&id)
            .is_some_and(|entry| entry.last_use > completed)
    }

    fn referenced_resources(&self, commands: &[Command]) -> Vec<ResourceId> {
        let mut ids = Vec::new();
        for command in commands {
            match command {
                Command::Barrier { resource, .. } => ids.push(*resource),
                Command::CopyBufferRegion { dst, src, .. }
                | Command::CopyBufferToTexture { dst, src, .. }
                | Command::CopyTextureToBuffer { dst, src, .. } => {
                    ids.push(*dst);
                    ids.push(*src);
                }
                Command::SetRenderTargets { rtv, dsv } => {
                    ids.extend(self.resolve_cpu_descriptor(*rtv).and_then(content_resource));
                    if let Some(dsv) = dsv {
                        ids.extend(self.resolve_cpu_descriptor(*dsv).and_then(content_resource));
                    }
                }
                Command::ClearRenderTarget { rtv: handle, .. }
                | Command::ClearDepthStencil { dsv: handle, .. } => {
                    ids.extend(self.resolve_cpu_descriptor(*handle).and_then(content_resource));
                }
                Command::SetGraphicsRootConstantBufferView { address, .. } => {
                    ids.extend(resolve_address(*address).map(|(id, _)| id));
                }
                Command::SetGraphicsRootDescriptorTable { handle, .. } => {
                    ids.extend(self.resolve_gpu_descriptor(*handle).and_then(content_resource));
                }
                Command::SetVertexBuffer(view) => ids.push(view.resource),
                Command::SetIndexBuffer(view) => ids.push(view.resource),
                _ => {}
            }
        }
        ids
    }

    // --- Command allocators ---

    pub(crate) fn create_allocator(&self, label: &str) -> CommandAllocatorId {
        let id = CommandAllocatorId(self.next_allocator_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.allocators).insert(
            id,
            SoftAllocatorEntry {
                label: label.to_string(),
                last_submission: 0,
            },
        );
        id
    }

    pub(crate) fn reset_allocator(&self, id: CommandAllocatorId) -> Result<(), RenderError> {
        self.check_removed()?;
        let completed = self.completed_serial();
        let (in_flight, label) = {
            let allocators = lock(&self.allocators);
            let entry = allocators
                .get(&id)
                .ok_or(RenderError::ResourceError(ResourceError::InvalidHandle))?;
            (entry.last_submission > completed, entry.label.clone())
        };
        if in_flight {
            self.report(format!(
                "command allocator '{label}' reset while its command lists are still executing"
            ));
        }
        self.record(JournalEvent::AllocatorReset {
            allocator: id,
            in_flight,
        });
        Ok(())
    }

    // --- Resources ---

    pub(crate) fn create_resource(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<ResourceId, ResourceError> {
        if let Some(reason) = self.removed_reason() {
            return Err(ResourceError::BackendError(format!("device removed: {reason}")));
        }
        let size = match descriptor.kind {
            ResourceKind::Buffer { size } if size == 0 => {
                return Err(ResourceError::InvalidDescriptor(
                    "buffers must not be empty".to_string(),
                ));
            }
            ResourceKind::Buffer { size } if size > u32::MAX as u64 => {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "buffer of {size} bytes exceeds the 4 GiB resource limit"
                )));
            }
            ResourceKind::Texture2D { width, height, .. } if width == 0 || height == 0 => {
                return Err(ResourceError::InvalidDescriptor(
                    "textures must not be empty".to_string(),
                ));
            }
            ResourceKind::Texture2D { .. } if descriptor.heap != HeapKind::Default => {
                return Err(ResourceError::InvalidDescriptor(
                    "textures can only live in the default heap".to_string(),
                ));
            }
            kind => kind.byte_size(),
        };
        if descriptor.heap == HeapKind::Upload
            && descriptor.initial_state != ResourceState::GenericRead
        {
            return Err(ResourceError::InvalidDescriptor(
                "upload heap resources must start in GenericRead".to_string(),
            ));
        }

        let allocated = self.memory_allocated.load(Ordering::Acquire);
        let available = self.memory_budget.saturating_sub(allocated);
        if size > available {
            return Err(ResourceError::OutOfMemory {
                requested: size,
                available,
            });
        }
        self.memory_allocated.fetch_add(size, Ordering::AcqRel);

        let id = ResourceId(self.next_resource_id.fetch_add(1, Ordering::Relaxed));
        let label = descriptor
            .label
            .as_deref()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Resource {}", id.0));
        lock(&self.resources).insert(
            id,
            SoftResourceEntry {
                label,
                kind: descriptor.kind,
                heap: descriptor.heap,
                state: descriptor.initial_state,
                data: vec![0; size as usize],
                last_use: 0,
            },
        );
        Ok(id)
    }

    pub(crate) fn destroy_resource(&self, id: ResourceId) -> Result<(), ResourceError> {
        let completed = self.completed_serial();
        let entry = lock(&self.resources)
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        self.memory_allocated
            .fetch_sub(entry.data.len() as u64, Ordering::AcqRel);
        let in_flight = entry.last_use > completed;
        if in_flight {
            self.report(format!(
                "resource '{}' destroyed while referenced by in-flight work",
                entry.label
            ));
        }
        self.record(JournalEvent::ResourceDestroyed {
            resource: id,
            label: entry.label,
            in_flight,
        });
        Ok(())
    }

    pub(crate) fn write_resource(
        &self,
        id: ResourceId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut resources = lock(&self.resources);
        let entry = resources.get_mut(&id).ok_or(ResourceError::InvalidHandle)?;
        if !entry.heap.is_cpu_writable() {
            return Err(ResourceError::NotCpuAccessible {
                id,
                heap: entry.heap,
            });
        }
        let start = offset as usize;
        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= entry.data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        entry.data[start..end].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn read_resource(
        &self,
        id: ResourceId,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, ResourceError> {
        let resources = lock(&self.resources);
        let entry = resources.get(&id).ok_or(ResourceError::InvalidHandle)?;
        if !entry.heap.is_cpu_readable() {
            return Err(ResourceError::NotCpuAccessible {
                id,
                heap: entry.heap,
            });
        }
        let start = offset as usize;
        let end = start
            .checked_add(len as usize)
            .filter(|&end| end <= entry.data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        Ok(entry.data[start..end].to_vec())
    }

    pub(crate) fn gpu_virtual_address(
        &self,
        id: ResourceId,
    ) -> Result<GpuVirtualAddress, ResourceError> {
        let resources = lock(&self.resources);
        match resources.get(&id) {
            Some(entry) if matches!(entry.kind, ResourceKind::Buffer { .. }) => {
                Ok(GpuVirtualAddress((id.0 as u64) << ADDRESS_OFFSET_BITS))
            }
            Some(_) => Err(ResourceError::InvalidDescriptor(
                "textures have no GPU virtual address".to_string(),
            )),
            None => Err(ResourceError::InvalidHandle),
        }
    }

    pub(crate) fn memory_usage(&self) -> u64 {
        self.memory_allocated.load(Ordering::Acquire)
    }

    pub(crate) fn resource_state(&self, id: ResourceId) -> Option<ResourceState> {
        lock(&self.resources).get(&id).map(|entry| entry.state)
    }

    pub(crate) fn capture_resource(&self, id: ResourceId) -> Option<Vec<u8>> {
        lock(&self.resources).get(&id).map(|entry| entry.data.clone())
    }

    pub(crate) fn live_resource_count(&self) -> usize {
        lock(&self.resources).len()
    }

    // --- Descriptors ---

    pub(crate) fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapInfo, ResourceError> {
        if descriptor.capacity == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "descriptor heaps must not be empty".to_string(),
            ));
        }
        let visible_kind = matches!(
            descriptor.kind,
            DescriptorHeapKind::CbvSrvUav | DescriptorHeapKind::Sampler
        );
        if descriptor.shader_visible && !visible_kind {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{:?} heaps cannot be shader visible",
                descriptor.kind
            )));
        }
        let id = DescriptorHeapId(self.next_heap_id.fetch_add(1, Ordering::Relaxed));
        let base = (id.0 as u64) << HANDLE_OFFSET_BITS;
        let info = DescriptorHeapInfo {
            id,
            kind: descriptor.kind,
            capacity: descriptor.capacity,
            cpu_base: CpuDescriptorHandle(base),
            gpu_base: descriptor
                .shader_visible
                .then_some(GpuDescriptorHandle(base | GPU_HANDLE_TAG)),
            stride: match descriptor.kind {
                DescriptorHeapKind::Sampler => 16,
                _ => 32,
            },
        };
        lock(&self.heaps).insert(
            id,
            SoftHeapEntry {
                info,
                slots: vec![None; descriptor.capacity as usize],
            },
        );
        Ok(info)
    }

    pub(crate) fn write_descriptor(
        &self,
        dest: CpuDescriptorHandle,
        expected: DescriptorHeapKind,
        content: DescriptorContent,
    ) -> Result<(), ResourceError> {
        let mut heaps = lock(&self.heaps);
        let heap = heaps
            .get_mut(&DescriptorHeapId((dest.0 >> HANDLE_OFFSET_BITS) as usize))
            .ok_or(ResourceError::InvalidHandle)?;
        if heap.info.kind != expected {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{content:?} written into a {:?} heap",
                heap.info.kind
            )));
        }
        let offset = dest.0 - heap.info.cpu_base.0;
        if offset % heap.info.stride as u64 != 0 {
            return Err(ResourceError::InvalidHandle);
        }
        let slot = heap
            .slots
            .get_mut((offset / heap.info.stride as u64) as usize)
            .ok_or(ResourceError::OutOfBounds)?;
        *slot = Some(content);
        Ok(())
    }

    pub(crate) fn resource_kind(&self, id: ResourceId) -> Result<ResourceKind, ResourceError> {
        lock(&self.resources)
            .get(&id)
            .map(|entry| entry.kind)
            .ok_or(ResourceError::InvalidHandle)
    }

    pub(crate) fn resolve_cpu_descriptor(
        &self,
        handle: CpuDescriptorHandle,
    ) -> Option<DescriptorContent> {
        self.resolve_descriptor(handle.0)
    }

    pub(crate) fn resolve_gpu_descriptor(
        &self,
        handle: GpuDescriptorHandle,
    ) -> Option<DescriptorContent> {
        if handle.0 & GPU_HANDLE_TAG == 0 {
            return None;
        }
        self.resolve_descriptor(handle.0 & !GPU_HANDLE_TAG)
    }

    fn resolve_descriptor(&self, handle: u64) -> Option<DescriptorContent> {
        let heaps = lock(&self.heaps);
        let heap = heaps.get(&DescriptorHeapId((handle >> HANDLE_OFFSET_BITS) as usize))?;
        let index = (handle - heap.info.cpu_base.0) / heap.info.stride as u64;
        heap.slots.get(index as usize).copied().flatten()
    }

    // --- Shaders and pipelines ---

    pub(crate) fn compile_shader(&self, source: &ShaderSource) -> Result<ShaderModuleId, ShaderError> {
        if !source.source.contains(source.entry_point.as_ref()) {
            return Err(ShaderError::InvalidEntryPoint {
                label: source.label.to_string(),
                entry_point: source.entry_point.to_string(),
            });
        }
        let forced = lock(&self.failing_shaders)
            .iter()
            .any(|pattern| source.label.contains(pattern.as_str()));
        if forced {
            return Err(ShaderError::CompilationError {
                label: source.label.to_string(),
                details: format!(
                    "error X3501: '{}': entrypoint not compiled for {}",
                    source.entry_point,
                    source.stage.target_profile()
                ),
            });
        }
        let id = ShaderModuleId(self.next_shader_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.shaders).insert(
            id,
            SoftShaderEntry {
                label: source.label.to_string(),
                stage: source.stage,
            },
        );
        log::debug!(
            "Compiled shader '{}' ({} {})",
            source.label,
            source.entry_point,
            source.stage.target_profile()
        );
        Ok(id)
    }

    pub(crate) fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<RootSignatureId, PipelineError> {
        let mut registers = Vec::new();
        for parameter in &descriptor.parameters {
            if let RootParameter::ConstantBufferView { register } = parameter {
                if registers.contains(register) {
                    return Err(PipelineError::RootSignatureCreationFailed(format!(
                        "constant buffer register b{register} bound twice"
                    )));
                }
                registers.push(*register);
            }
        }
        let id = RootSignatureId(self.next_root_signature_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.root_signatures).insert(
            id,
            SoftRootSignatureEntry {
                label: descriptor
                    .label
                    .as_deref()
                    .unwrap_or("Root Signature")
                    .to_string(),
                parameters: descriptor.parameters.clone(),
            },
        );
        Ok(id)
    }

    pub(crate) fn create_pipeline_state(
        &self,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, PipelineError> {
        let label = descriptor.label.as_deref().map(str::to_string);
        {
            let shaders = lock(&self.shaders);
            let stages = [
                (descriptor.vertex_shader, ShaderStage::Vertex),
                (descriptor.pixel_shader, ShaderStage::Pixel),
            ];
            for (id, stage) in stages {
                match shaders.get(&id) {
                    Some(shader) if shader.stage == stage => {}
                    Some(shader) => {
                        return Err(PipelineError::CompilationFailed {
                            label,
                            details: format!("shader '{}' is not a {stage:?} shader", shader.label),
                        });
                    }
                    None => {
                        return Err(PipelineError::InvalidShaderModule {
                            id,
                            pipeline_label: label,
                        });
                    }
                }
            }
        }
        if !lock(&self.root_signatures).contains_key(&descriptor.root_signature) {
            return Err(PipelineError::InvalidRootSignature {
                id: descriptor.root_signature,
            });
        }
        if descriptor.render_target_format.is_depth() || !descriptor.depth_format.is_depth() {
            return Err(PipelineError::CompilationFailed {
                label,
                details: "render target and depth formats are swapped".to_string(),
            });
        }
        let id = PipelineStateId(self.next_pipeline_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.pipelines).insert(
            id,
            SoftPipelineEntry {
                label: label.unwrap_or_else(|| format!("Pipeline {}", id.0)),
                root_signature: descriptor.root_signature,
            },
        );
        Ok(id)
    }
}

/// Splits a GPU virtual address into its resource and byte offset.
pub(crate) fn resolve_address(address: GpuVirtualAddress) -> Option<(ResourceId, u64)> {
    let id = (address.0 >> ADDRESS_OFFSET_BITS) as usize;
    (id != 0).then(|| (ResourceId(id), address.0 & ((1 << ADDRESS_OFFSET_BITS) - 1)))
}

fn content_resource(content: DescriptorContent) -> Option<ResourceId> {
    match content {
        DescriptorContent::ShaderResource(id)
        | DescriptorContent::RenderTarget(id)
        | DescriptorContent::DepthStencil(id) => Some(id),
        DescriptorContent::Sampler(_) => None,
    }
}
