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

//! The renderer context object.
//!
//! A [`Renderer`] owns the device, the direct queue, the fence, the frame
//! slots and every renderer-wide resource. A frame goes through
//! [`Renderer::begin_frame`], any number of binding and draw calls,
//! [`Renderer::end_frame`] and [`Renderer::present`]:
//!
//! ```text
//! Idle --begin_frame--> Recording --end_frame--> Submitted --present--> Idle
//! ```
//!
//! `present` waits for the fence of the slot the next frame records into, so
//! the CPU never runs more than `back_buffer_count - 1` frames ahead of the GPU.

use crate::bootstrap::{bootstrap_device, DeviceContext};
use crate::config::RendererConfig;
use crate::constant_pool::ConstantPool;
use crate::constants::{LightConstants, ViewConstants};
use crate::descriptors::{DescriptorIndex, ShaderVisibleDescriptors};
use crate::frame::{ClearValues, FrameSlot, FrameState, FrameStats, ViewportDesc};
use crate::pipeline::{
    PipelineLibrary, RootSignatureKind, SelectedPipeline, ShadingModel, LIGHT_SLOT, MATERIAL_SLOT,
    MODEL_SLOT, TEXTURE_TABLE_SLOT, VIEW_SLOT,
};
use crate::scene::{Mesh, Renderable, Vertex};
use crate::sync::FenceSynchronizer;
use crate::targets::FrameTargets;
use crate::upload::{GpuBuffer, GpuTexture, TextureData, UploadRetirementQueue, Uploadable};
use ember_core::math::{LinearRgba, Mat4, Vec3};
use ember_core::platform::RenderSurface;
use ember_core::renderer::*;
use std::sync::Arc;

/// The frame loop and resource owner of the renderer.
pub struct Renderer {
    config: RendererConfig,
    device: Arc<dyn GraphicsDevice>,
    queue: Arc<dyn CommandQueue>,
    adapter: AdapterInfo,
    surface: Arc<dyn RenderSurface>,
    size: (u32, u32),

    sync: FenceSynchronizer,
    targets: FrameTargets,
    slots: Vec<FrameSlot>,
    frame_index: usize,
    command_list: CommandList,
    upload_allocator: CommandAllocatorId,
    upload_list: CommandList,
    state: FrameState,

    constants: ConstantPool,
    descriptors: ShaderVisibleDescriptors,
    pipelines: PipelineLibrary,
    retirement: UploadRetirementQueue,
    fallback_texture: Option<GpuTexture>,

    wireframe: bool,
    bound: Option<SelectedPipeline>,
    stats: FrameStats,
    shut_down: bool,
    submission_failure: Option<String>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("adapter", &self.adapter.name)
            .field("size", &self.size)
            .field("state", &self.state)
            .field("frame_index", &self.frame_index)
            .field("fence_value", &self.sync.current_value())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Validates `config`, picks an adapter of `instance`, and creates the renderer.
    pub fn new(
        instance: &dyn GraphicsInstance,
        surface: Arc<dyn RenderSurface>,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        let context = bootstrap_device(instance, &config)?;
        Self::with_device(context, surface, config)
    }

    /// Creates the renderer on an existing device.
    pub fn with_device(
        context: DeviceContext,
        surface: Arc<dyn RenderSurface>,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        let DeviceContext {
            device,
            queue,
            adapter,
        } = context;
        let sync = FenceSynchronizer::new(device.as_ref(), queue.clone(), config.gpu_wait_timeout())?;

        let (width, height) = surface.inner_size();
        let targets = FrameTargets::new(
            device.as_ref(),
            &SwapChainDescriptor {
                width: width.max(1),
                height: height.max(1),
                buffer_count: config.back_buffer_count,
                format: config.back_buffer_format,
            },
            config.depth_format,
        )?;

        let slots = (0..config.back_buffer_count)
            .map(|i| {
                device
                    .create_command_allocator(&format!("Frame Allocator {i}"))
                    .map(FrameSlot::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let upload_allocator = device.create_command_allocator("Upload Allocator")?;

        let constants =
            ConstantPool::new(device.as_ref(), config.max_objects, config.back_buffer_count)?;
        let descriptors = ShaderVisibleDescriptors::new(
            device.as_ref(),
            config.srv_heap_capacity,
            config.sampler_heap_capacity,
        )?;
        let pipelines = PipelineLibrary::build(
            device.as_ref(),
            config.back_buffer_format,
            config.depth_format,
        );

        let mut renderer = Self {
            frame_index: targets.current_index() as usize,
            size: targets.size(),
            config,
            device,
            queue,
            adapter,
            surface,
            sync,
            targets,
            slots,
            command_list: CommandList::new("Frame Commands"),
            upload_allocator,
            upload_list: CommandList::new("Upload Commands"),
            state: FrameState::Idle,
            constants,
            descriptors,
            pipelines,
            retirement: UploadRetirementQueue::new(),
            fallback_texture: None,
            wireframe: false,
            bound: None,
            stats: FrameStats::default(),
            shut_down: false,
            submission_failure: None,
        };
        renderer.create_fallback_texture()?;

        log::info!(
            "Renderer initialized on '{}': {}x{}, {} back buffers, vsync {}.",
            renderer.adapter.name,
            renderer.size.0,
            renderer.size.1,
            renderer.config.back_buffer_count,
            if renderer.config.vsync { "on" } else { "off" }
        );
        Ok(renderer)
    }

    fn create_fallback_texture(&mut self) -> Result<(), RenderError> {
        let mut texture = self.create_texture("Fallback Texture", &TextureData::fallback())?;
        self.upload_immediately(&mut texture)?;
        self.fallback_texture = Some(texture);
        Ok(())
    }

    // --- Frame lifecycle ---

    fn require_usable(&self, operation: &str) -> Result<(), RenderError> {
        if self.shut_down {
            return Err(RenderError::InvalidState(format!(
                "{operation} called after shutdown"
            )));
        }
        if let Some(reason) = &self.submission_failure {
            return Err(RenderError::InvalidState(format!(
                "{operation} called after a failed submission ({reason})"
            )));
        }
        Ok(())
    }

    fn require_state(&self, expected: FrameState, operation: &str) -> Result<(), RenderError> {
        self.require_usable(operation)?;
        if self.state != expected {
            return Err(RenderError::InvalidState(format!(
                "{operation} requires {expected:?} but the frame is {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Records that a command list never reached the queue.
    ///
    /// Uploads recorded into it were given a fence value the next signal
    /// reaches without their copies having run, so the renderer stops
    /// accepting work.
    fn fail_submission(&mut self, err: RenderError) -> RenderError {
        let err = self.classify(err);
        log::error!("Submission failed, the renderer must be recreated: {err}");
        self.submission_failure = Some(err.to_string());
        self.state = FrameState::Idle;
        err
    }

    /// Turns a failure into [`RenderError::DeviceLost`] when the device is gone.
    fn classify(&self, err: RenderError) -> RenderError {
        if err.is_device_lost() {
            return err;
        }
        match self.device.removed_reason() {
            Some(reason) => {
                log::error!("Device lost: {reason}");
                RenderError::DeviceLost { reason }
            }
            None => err,
        }
    }

    /// Starts recording a frame into the current back buffer.
    ///
    /// Waits for the slot's previous submission if the GPU is behind, resets
    /// the slot's allocator, and records the back buffer transition, the render
    /// targets, a full-surface viewport and the descriptor heaps.
    pub fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.require_state(FrameState::Idle, "begin_frame")?;
        self.frame_index = self.targets.current_index() as usize;
        let slot = *self
            .slots
            .get(self.frame_index)
            .ok_or_else(|| RenderError::Internal("frame index out of range".to_string()))?;
        if !self.sync.is_complete(slot.fence_value) {
            log::trace!("Frame slot {} still in flight, waiting.", self.frame_index);
            self.sync.wait_for(slot.fence_value)?;
        }

        self.device
            .reset_command_allocator(slot.allocator)
            .map_err(|e| self.classify(e))?;
        self.command_list.reset(slot.allocator)?;

        let back_buffer = self.targets.current_back_buffer()?;
        let rtv = self.targets.rtv(self.frame_index as u32)?;
        let dsv = self.targets.dsv()?;
        let viewport = Viewport::full(self.size.0, self.size.1);
        let list = &mut self.command_list;
        list.resource_barrier(back_buffer, ResourceState::Present, ResourceState::RenderTarget);
        list.record(Command::SetRenderTargets {
            rtv,
            dsv: Some(dsv),
        });
        list.record(Command::SetViewport(viewport));
        list.record(Command::SetScissorRect(viewport.into()));
        list.record(Command::SetDescriptorHeaps(self.descriptors.heaps()));

        self.constants
            .begin_frame(self.device.as_ref(), self.frame_index as u32)?;
        self.retirement
            .collect(self.device.as_ref(), self.sync.completed_value());

        self.stats = FrameStats {
            frame_number: self.stats.frame_number + 1,
            ..FrameStats::default()
        };
        self.bound = None;
        self.state = FrameState::Recording;
        log::trace!(
            "Frame {} begun on back buffer {}.",
            self.stats.frame_number,
            self.frame_index
        );
        Ok(())
    }

    /// Clears the bound color and depth targets.
    pub fn clear(&mut self, values: ClearValues) -> Result<(), RenderError> {
        self.require_state(FrameState::Recording, "clear")?;
        let rtv = self.targets.rtv(self.frame_index as u32)?;
        let dsv = self.targets.dsv()?;
        self.command_list.record(Command::ClearRenderTarget {
            rtv,
            color: values.color.to_array(),
        });
        self.command_list.record(Command::ClearDepthStencil {
            dsv,
            depth: values.depth,
            stencil: values.stencil,
        });
        Ok(())
    }

    /// Sets the viewport and a scissor rectangle covering it.
    pub fn set_viewport(&mut self, viewport: ViewportDesc) -> Result<(), RenderError> {
        self.require_state(FrameState::Recording, "set_viewport")?;
        self.command_list.record(Command::SetViewport(viewport));
        self.command_list
            .record(Command::SetScissorRect(viewport.into()));
        Ok(())
    }

    /// Transitions the back buffer for presentation, submits the frame, and
    /// signals the fence for the current slot.
    pub fn end_frame(&mut self) -> Result<(), RenderError> {
        self.require_state(FrameState::Recording, "end_frame")?;
        let back_buffer = self.targets.current_back_buffer()?;
        self.command_list.resource_barrier(
            back_buffer,
            ResourceState::RenderTarget,
            ResourceState::Present,
        );
        self.command_list.close()?;
        self.stats.objects = self.constants.allocated_this_frame();

        let submitted = self.queue.execute_command_lists(&[&self.command_list]);
        if let Err(e) = submitted {
            return Err(self.fail_submission(e));
        }
        let fence_value = self.sync.signal()?;
        self.slots[self.frame_index].fence_value = fence_value;
        self.state = FrameState::Submitted;
        log::trace!(
            "Frame {} submitted with fence value {fence_value}.",
            self.stats.frame_number
        );
        Ok(())
    }

    /// Presents the submitted frame and waits until the next frame slot is free.
    ///
    /// # Errors
    ///
    /// [`RenderError::DeviceLost`] when the device was removed or reset, which
    /// is fatal. Other swap chain failures are reported as
    /// [`RenderError::PresentFailed`] and leave the renderer usable.
    pub fn present(&mut self) -> Result<(), RenderError> {
        self.require_state(FrameState::Submitted, "present")?;
        self.state = FrameState::Idle;
        if let Err(e) = self.targets.present(self.config.sync_interval()) {
            return Err(match self.classify(e) {
                err @ (RenderError::DeviceLost { .. } | RenderError::PresentFailed(_)) => err,
                other => RenderError::PresentFailed(other.to_string()),
            });
        }

        self.frame_index = self.targets.current_index() as usize;
        let next = self.slots[self.frame_index].fence_value;
        self.sync.wait_for(next)?;
        self.retirement
            .collect(self.device.as_ref(), self.sync.completed_value());
        Ok(())
    }

    /// Resizes the swap chain and recreates the render targets.
    ///
    /// Unchanged or zero sizes are ignored. The GPU is drained before any
    /// target is released.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.require_usable("resize")?;
        if self.state == FrameState::Recording {
            return Err(RenderError::InvalidState(
                "cannot resize while a frame is recording".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {width}x{height}.");
            return Ok(());
        }
        if (width, height) == self.size {
            return Ok(());
        }

        self.sync.wait_for_idle()?;
        self.retirement
            .collect(self.device.as_ref(), self.sync.completed_value());
        self.targets.release(self.device.as_ref())?;
        self.targets
            .recreate(self.device.as_ref(), width, height)
            .map_err(|e| self.classify(e))?;
        self.size = (width, height);
        self.frame_index = self.targets.current_index() as usize;
        if self.state == FrameState::Submitted {
            log::debug!("Dropping the presentation of a frame submitted before the resize.");
            self.state = FrameState::Idle;
        }
        log::info!("Renderer resized to {width}x{height}.");
        Ok(())
    }

    /// Resizes to the current size of the surface, if it changed.
    pub fn sync_surface_size(&mut self) -> Result<(), RenderError> {
        let (width, height) = self.surface.inner_size();
        self.resize(width, height)
    }

    /// Blocks until the GPU finished every submitted command.
    ///
    /// Not allowed while a frame is recording: the drain would complete the
    /// fence value its uploads are waiting for before they are submitted.
    pub fn wait_for_gpu(&mut self) -> Result<(), RenderError> {
        if self.shut_down {
            return Err(RenderError::InvalidState(
                "wait_for_gpu called after shutdown".to_string(),
            ));
        }
        if self.state == FrameState::Recording {
            return Err(RenderError::InvalidState(
                "cannot wait for the GPU while a frame is recording".to_string(),
            ));
        }
        self.sync.wait_for_idle()?;
        self.retirement
            .collect(self.device.as_ref(), self.sync.completed_value());
        Ok(())
    }

    /// Drains the GPU and destroys every renderer-owned resource.
    ///
    /// Called by `Drop`; calling it explicitly surfaces the drain error.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        let drained = self.sync.wait_for_idle();
        if let Err(e) = &drained {
            log::error!("GPU drain failed during shutdown: {e}");
        }

        let device = self.device.as_ref();
        self.retirement.drain_all(device);
        if let Some(texture) = self.fallback_texture.take() {
            if let Err(e) = texture.destroy(device) {
                log::warn!("Failed to destroy the fallback texture: {e}");
            }
        }
        if let Err(e) = self.constants.destroy(device) {
            log::warn!("Failed to destroy the constant pool: {e}");
        }
        if let Err(e) = self.targets.release(device) {
            log::warn!("Failed to release the render targets: {e}");
        }
        self.state = FrameState::Idle;
        log::info!("Renderer shut down after {} frames.", self.stats.frame_number);
        drained
    }

    // --- Resources ---

    /// Creates a buffer. Default-heap buffers with `data` are staged and must
    /// go through [`Renderer::upload`] or [`Renderer::upload_immediately`].
    pub fn create_buffer(
        &self,
        label: &str,
        size: u64,
        heap: HeapKind,
        final_state: ResourceState,
        data: Option<&[u8]>,
    ) -> Result<GpuBuffer, RenderError> {
        Ok(GpuBuffer::new(self.device.as_ref(), label, size, heap, final_state, data)?)
    }

    /// Stages a vertex buffer.
    pub fn create_vertex_buffer(&self, label: &str, vertices: &[Vertex]) -> Result<GpuBuffer, RenderError> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        self.create_buffer(
            label,
            bytes.len() as u64,
            HeapKind::Default,
            ResourceState::VertexAndConstantBuffer,
            Some(bytes),
        )
    }

    /// Stages a 32-bit index buffer.
    pub fn create_index_buffer(&self, label: &str, indices: &[u32]) -> Result<GpuBuffer, RenderError> {
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        self.create_buffer(
            label,
            bytes.len() as u64,
            HeapKind::Default,
            ResourceState::IndexBuffer,
            Some(bytes),
        )
    }

    /// Creates a persistently mapped constant buffer, rounded up to 256 bytes.
    pub fn create_constant_buffer(&self, label: &str, size: u64) -> Result<GpuBuffer, RenderError> {
        self.create_buffer(
            label,
            align_up(size.max(1), CONSTANT_BUFFER_ALIGNMENT),
            HeapKind::Upload,
            ResourceState::GenericRead,
            None,
        )
    }

    /// Stages a texture and allocates its shader resource view.
    ///
    /// When the SRV heap is exhausted the texture is created without a view
    /// and never binds.
    pub fn create_texture(&mut self, label: &str, data: &TextureData) -> Result<GpuTexture, RenderError> {
        let mut texture = GpuTexture::new(self.device.as_ref(), label, data)?;
        let srv = self.descriptors.srv.allocate();
        if let Some(handle) = self.descriptors.srv.cpu_handle(srv) {
            self.device
                .create_shader_resource_view(texture.resource(), handle)?;
            texture.set_srv(srv);
        }
        Ok(texture)
    }

    /// Stages the buffers of a mesh.
    pub fn create_mesh(&self, label: &str, vertices: &[Vertex], indices: &[u32]) -> Result<Mesh, RenderError> {
        Ok(Mesh::new(self.device.as_ref(), label, vertices, indices)?)
    }

    /// Records the staged copy of `item` into the current frame.
    ///
    /// The staging buffer is released once the frame's fence value completes.
    pub fn upload(&mut self, item: &mut dyn Uploadable) -> Result<(), RenderError> {
        item.mark_completed(self.sync.completed_value());
        if !item.needs_upload() {
            return Ok(());
        }
        self.require_state(FrameState::Recording, "upload")?;
        let fence_value = self.sync.next_value();
        if let Some(staging) = item.record_upload(&mut self.command_list, fence_value)? {
            self.retirement.retire(staging, fence_value);
        }
        Ok(())
    }

    /// Uploads `item` on a dedicated command list and waits for the copy.
    ///
    /// Only valid while no frame is recording.
    pub fn upload_immediately(&mut self, item: &mut dyn Uploadable) -> Result<(), RenderError> {
        if !item.needs_upload() {
            return Ok(());
        }
        if self.state == FrameState::Recording {
            return Err(RenderError::InvalidState(format!(
                "immediate upload of '{}' while a frame is recording",
                item.label()
            )));
        }
        let label = item.label().to_string();
        self.execute_immediately(|list, fence_value, retirement| {
            if let Some(staging) = item.record_upload(list, fence_value)? {
                retirement.retire(staging, fence_value);
            }
            Ok(())
        })?;
        item.mark_completed(self.sync.completed_value());
        log::debug!("Uploaded '{label}' immediately.");
        Ok(())
    }

    fn execute_immediately(
        &mut self,
        record: impl FnOnce(&mut CommandList, FenceValue, &mut UploadRetirementQueue) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        self.require_usable("immediate submission")?;
        self.device
            .reset_command_allocator(self.upload_allocator)
            .map_err(|e| self.classify(e))?;
        self.upload_list.reset(self.upload_allocator)?;
        let fence_value = self.sync.next_value();
        let recorded = record(&mut self.upload_list, fence_value, &mut self.retirement);
        self.upload_list.close()?;
        recorded?;

        let submitted = self.queue.execute_command_lists(&[&self.upload_list]);
        if let Err(e) = submitted {
            return Err(self.fail_submission(e));
        }
        let signaled = self.sync.signal()?;
        self.sync.wait_for(signaled)?;
        self.retirement
            .collect(self.device.as_ref(), self.sync.completed_value());
        Ok(())
    }

    /// Copies a GPU buffer back to the CPU. Blocks until the copy completed.
    ///
    /// `state` is the state the buffer is in, and is restored afterwards.
    pub fn read_back_buffer(
        &mut self,
        buffer: ResourceId,
        size: u64,
        state: ResourceState,
    ) -> Result<Vec<u8>, RenderError> {
        if self.state == FrameState::Recording {
            return Err(RenderError::InvalidState(
                "read back while a frame is recording".to_string(),
            ));
        }
        let readback = self.device.create_resource(&ResourceDescriptor::buffer(
            "Readback Buffer",
            size,
            HeapKind::Readback,
            ResourceState::CopyDest,
        ))?;
        let result = self
            .execute_immediately(|list, _, _| {
                list.resource_barrier(buffer, state, ResourceState::CopySource);
                list.record(Command::CopyBufferRegion {
                    dst: readback,
                    dst_offset: 0,
                    src: buffer,
                    src_offset: 0,
                    size,
                });
                list.resource_barrier(buffer, ResourceState::CopySource, state);
                Ok(())
            })
            .and_then(|()| Ok(self.device.read_resource(readback, 0, size)?));
        self.release_readback(readback);
        result
    }

    /// Copies an uploaded texture back to the CPU. Blocks until the copy completed.
    pub fn read_back_texture(&mut self, texture: &GpuTexture) -> Result<TextureData, RenderError> {
        if self.state == FrameState::Recording {
            return Err(RenderError::InvalidState(
                "read back while a frame is recording".to_string(),
            ));
        }
        if !texture.upload_state().is_resident() {
            return Err(RenderError::InvalidState(format!(
                "texture '{}' was never uploaded",
                texture.label()
            )));
        }
        let (width, height) = texture.size();
        let footprint = TextureFootprint::for_texture(width, height, texture.format());
        let readback = self.device.create_resource(&ResourceDescriptor::buffer(
            "Readback Buffer",
            footprint.total_size(),
            HeapKind::Readback,
            ResourceState::CopyDest,
        ))?;
        let source = texture.resource();
        let result = self
            .execute_immediately(|list, _, _| {
                list.resource_barrier(
                    source,
                    ResourceState::PixelShaderResource,
                    ResourceState::CopySource,
                );
                list.record(Command::CopyTextureToBuffer {
                    dst: readback,
                    src: source,
                    footprint,
                });
                list.resource_barrier(
                    source,
                    ResourceState::CopySource,
                    ResourceState::PixelShaderResource,
                );
                Ok(())
            })
            .and_then(|()| Ok(self.device.read_resource(readback, 0, footprint.total_size())?));
        self.release_readback(readback);

        let pitched = result?;
        let row = footprint.tight_row_size() as usize;
        let mut pixels = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = footprint.offset as usize + y * footprint.row_pitch as usize;
            pixels.extend_from_slice(&pitched[start..start + row]);
        }
        Ok(TextureData::new(width, height, footprint.format, pixels)?)
    }

    /// Releases a readback buffer once the copy into it can no longer be running.
    ///
    /// After a timeout the copy may still be in flight, so the buffer waits
    /// for the last signaled value like any retired upload.
    fn release_readback(&mut self, readback: ResourceId) {
        self.retirement.retire(readback, self.sync.current_value());
        self.retirement
            .collect(self.device.as_ref(), self.sync.completed_value());
    }

    /// Destroys `resource` once every frame submitted so far, and the one
    /// being recorded, completed.
    pub fn release_resource(&mut self, resource: ResourceId) {
        let fence_value = match self.state {
            FrameState::Recording => self.sync.next_value(),
            FrameState::Idle | FrameState::Submitted => self.sync.current_value(),
        };
        self.retirement.retire(resource, fence_value);
    }

    // --- Constants ---

    /// Returns the next per-object constant slot of the frame.
    pub fn allocate_object_index(&mut self) -> u32 {
        self.constants.allocate_object_index()
    }

    /// Restarts object slot allocation at 0. `begin_frame` does it too.
    pub fn reset_object_index(&mut self) {
        self.constants.reset_object_index();
    }

    /// Writes the world matrix of object `index` for the recording frame.
    pub fn update_model_constants(&mut self, model: &Mat4, index: u32) -> Result<(), RenderError> {
        self.require_state(FrameState::Recording, "update_model_constants")?;
        Ok(self
            .constants
            .update_model_constants(self.device.as_ref(), model, index)?)
    }

    /// Writes the material color of object `index` for the recording frame.
    pub fn update_material_constants(
        &mut self,
        color: LinearRgba,
        index: u32,
        emissive_intensity: f32,
    ) -> Result<(), RenderError> {
        self.require_state(FrameState::Recording, "update_material_constants")?;
        Ok(self.constants.update_material_constants(
            self.device.as_ref(),
            color,
            index,
            emissive_intensity,
        )?)
    }

    /// Sets the camera of the recording frame and the following ones.
    ///
    /// Outside a frame the value is only kept; the next `begin_frame` writes it,
    /// so a frame still executing on the GPU keeps reading its own camera.
    pub fn update_view_constants(
        &mut self,
        view: &Mat4,
        projection: &Mat4,
        camera_position: Vec3,
    ) -> Result<(), RenderError> {
        let constants = ViewConstants::new(view, projection, camera_position);
        if self.state == FrameState::Recording {
            self.constants
                .update_view_constants(self.device.as_ref(), constants)?;
        } else {
            self.constants.set_view_constants(constants);
        }
        Ok(())
    }

    /// Sets the directional light of the recording frame and the following ones.
    ///
    /// Outside a frame the value is only kept until the next `begin_frame`.
    pub fn update_light_constants(
        &mut self,
        direction: Vec3,
        color: LinearRgba,
        intensity: f32,
    ) -> Result<(), RenderError> {
        let constants = LightConstants::new(direction, color, intensity);
        if self.state == FrameState::Recording {
            self.constants
                .update_light_constants(self.device.as_ref(), constants)?;
        } else {
            self.constants.set_light_constants(constants);
        }
        Ok(())
    }

    // --- Descriptors ---

    /// Allocates a descriptor of the shader-visible CBV/SRV/UAV heap.
    pub fn allocate_srv_descriptor(&mut self) -> DescriptorIndex {
        self.descriptors.srv.allocate()
    }

    /// Allocates a descriptor of the shader-visible sampler heap.
    pub fn allocate_sampler_descriptor(&mut self) -> DescriptorIndex {
        self.descriptors.sampler.allocate()
    }

    /// The linear-wrap sampler created at startup.
    pub fn default_sampler(&self) -> DescriptorIndex {
        self.descriptors.default_sampler()
    }

    // --- Binding and drawing ---

    /// Binds the flat-color pipeline and the constants of object `index`.
    ///
    /// Returns `false` when no pipeline could be bound; the draw must be skipped.
    pub fn bind_for_mesh_rendering(&mut self, index: u32) -> Result<bool, RenderError> {
        self.bind(ShadingModel::Flat, index, None)
    }

    /// Binds the textured pipeline, the constants of object `index` and the
    /// view of `texture`. Textures that cannot be sampled yet are replaced by
    /// the fallback texture.
    pub fn bind_for_textured_mesh_rendering(
        &mut self,
        index: u32,
        texture: &GpuTexture,
    ) -> Result<bool, RenderError> {
        let srv = if texture.is_bindable() {
            texture.srv()
        } else {
            self.fallback_srv()
        };
        self.bind(ShadingModel::Textured, index, Some(srv))
    }

    /// Binds the emissive pipeline and the constants of object `index`.
    pub fn bind_for_emissive_mesh_rendering(&mut self, index: u32) -> Result<bool, RenderError> {
        self.bind(ShadingModel::Emissive, index, None)
    }

    fn fallback_srv(&self) -> DescriptorIndex {
        self.fallback_texture
            .as_ref()
            .map_or(DescriptorIndex::INVALID, GpuTexture::srv)
    }

    fn bind(
        &mut self,
        shading: ShadingModel,
        index: u32,
        texture: Option<DescriptorIndex>,
    ) -> Result<bool, RenderError> {
        self.require_state(FrameState::Recording, "bind")?;
        self.bound = None;
        debug_assert!(
            index < self.constants.max_objects(),
            "object index {index} out of range"
        );
        if index >= self.constants.max_objects() {
            self.stats.skipped_draws += 1;
            return Ok(false);
        }
        let Some(selected) = self.pipelines.select(shading, self.wireframe) else {
            log::warn!("No pipeline available for {shading:?}, skipping the draw.");
            self.stats.skipped_draws += 1;
            return Ok(false);
        };
        let table = match selected.root_signature_kind {
            RootSignatureKind::ConstantsOnly => None,
            RootSignatureKind::Textured => {
                let srv = texture.filter(|srv| srv.is_valid()).unwrap_or(self.fallback_srv());
                match self.descriptors.srv.gpu_handle(srv) {
                    Some(handle) => Some(handle),
                    None => {
                        self.stats.skipped_draws += 1;
                        return Ok(false);
                    }
                }
            }
        };

        let list = &mut self.command_list;
        list.record(Command::SetPipelineState(selected.pipeline));
        list.record(Command::SetGraphicsRootSignature(selected.root_signature));
        let constant_buffers = [
            (MODEL_SLOT, self.constants.model_address(index)),
            (VIEW_SLOT, self.constants.view_address()),
            (LIGHT_SLOT, self.constants.light_address()),
            (MATERIAL_SLOT, self.constants.material_address(index)),
        ];
        for (slot, address) in constant_buffers {
            list.record(Command::SetGraphicsRootConstantBufferView { slot, address });
        }
        if let Some(handle) = table {
            list.record(Command::SetGraphicsRootDescriptorTable {
                slot: TEXTURE_TABLE_SLOT,
                handle,
            });
        }
        self.bound = Some(selected);
        Ok(true)
    }

    /// Draws `mesh` with the pipeline bound last.
    ///
    /// Skipped when nothing is bound or the mesh was never uploaded.
    pub fn draw_indexed(&mut self, mesh: &Mesh) -> Result<(), RenderError> {
        self.require_state(FrameState::Recording, "draw_indexed")?;
        if self.bound.is_none() {
            self.stats.skipped_draws += 1;
            return Ok(());
        }
        if mesh.needs_upload() {
            log::warn!("Mesh '{}' drawn before its upload, skipping.", mesh.label());
            self.stats.skipped_draws += 1;
            return Ok(());
        }
        let list = &mut self.command_list;
        list.record(Command::SetPrimitiveTopology(PrimitiveTopology::TriangleList));
        list.record(Command::SetVertexBuffer(mesh.vertex_buffer_view()));
        list.record(Command::SetIndexBuffer(mesh.index_buffer_view()));
        list.record(Command::DrawIndexedInstanced {
            index_count: mesh.index_count(),
            instance_count: 1,
            start_index: 0,
            base_vertex: 0,
        });
        self.stats.draw_calls += 1;
        self.stats.triangles += mesh.triangle_count() as u64;
        Ok(())
    }

    /// Lets `item` record its commands into the current frame.
    pub fn render(&mut self, item: &mut dyn Renderable) -> Result<(), RenderError> {
        self.require_state(FrameState::Recording, "render")?;
        item.render(self)
    }

    // --- State and introspection ---

    /// Draws every following frame in wireframe.
    pub fn set_wireframe(&mut self, enabled: bool) {
        if self.wireframe != enabled {
            log::debug!("Wireframe {}.", if enabled { "enabled" } else { "disabled" });
        }
        self.wireframe = enabled;
    }

    /// Whether wireframe rendering is on.
    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    /// Counters of the current or last frame.
    pub fn stats(&self) -> FrameStats {
        let mut stats = self.stats;
        if self.state == FrameState::Recording {
            stats.objects = self.constants.allocated_this_frame();
        }
        stats
    }

    /// Where the frame lifecycle stands.
    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    /// Index of the frame slot and back buffer in use.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Fence value signaled after each slot's last submission.
    pub fn slot_fence_values(&self) -> Vec<FenceValue> {
        self.slots.iter().map(|slot| slot.fence_value).collect()
    }

    /// The last fence value handed to the queue.
    pub fn current_fence_value(&self) -> FenceValue {
        self.sync.current_value()
    }

    /// The last fence value the GPU completed.
    pub fn completed_fence_value(&self) -> FenceValue {
        self.sync.completed_value()
    }

    /// Back buffer size.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// The configuration the renderer was created with.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The adapter the device runs on.
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// Bytes of device memory held by live resources.
    pub fn gpu_memory_usage(&self) -> u64 {
        self.device.memory_usage()
    }

    /// The device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The back buffer the current frame renders into.
    pub fn current_back_buffer(&self) -> Result<ResourceId, RenderError> {
        self.targets.current_back_buffer()
    }

    /// The depth buffer.
    pub fn depth_buffer(&self) -> Option<ResourceId> {
        self.targets.depth_buffer()
    }

    /// Allocations that reused a constant slot within a frame.
    pub fn constant_pool_overflows(&self) -> u64 {
        self.constants.overflow_count()
    }

    /// The upload buffer holding every frame's constants.
    pub fn constant_buffer(&self) -> ResourceId {
        self.constants.buffer()
    }

    /// Staging buffers waiting for their fence.
    pub fn pending_upload_buffers(&self) -> usize {
        self.retirement.len()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Renderer shutdown failed: {e}");
        }
    }
}
