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

//! Swap chain back buffers and the depth buffer they share.

use ember_core::renderer::*;

/// The render targets of the frame loop.
///
/// Owns the swap chain, an RTV heap with one view per back buffer, a DSV heap
/// with a single view, and the depth buffer. Targets are released and recreated
/// as a whole on resize.
#[derive(Debug)]
pub struct FrameTargets {
    swap_chain: Box<dyn SwapChain>,
    rtv_heap: DescriptorHeapInfo,
    dsv_heap: DescriptorHeapInfo,
    back_buffers: Vec<ResourceId>,
    depth_buffer: Option<ResourceId>,
    depth_format: TextureFormat,
}

impl FrameTargets {
    /// Creates the swap chain, its views and the depth buffer.
    pub fn new(
        device: &dyn GraphicsDevice,
        descriptor: &SwapChainDescriptor,
        depth_format: TextureFormat,
    ) -> Result<Self, RenderError> {
        let swap_chain = device.create_swap_chain(descriptor)?;
        let rtv_heap = device.create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some("RTV Heap".into()),
            kind: DescriptorHeapKind::Rtv,
            capacity: MAX_BACK_BUFFERS,
            shader_visible: false,
        })?;
        let dsv_heap = device.create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some("DSV Heap".into()),
            kind: DescriptorHeapKind::Dsv,
            capacity: 1,
            shader_visible: false,
        })?;
        let mut targets = Self {
            swap_chain,
            rtv_heap,
            dsv_heap,
            back_buffers: Vec::new(),
            depth_buffer: None,
            depth_format,
        };
        targets.create_views(device)?;
        Ok(targets)
    }

    fn create_views(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        let count = self.swap_chain.buffer_count();
        let mut back_buffers = Vec::with_capacity(count as usize);
        for index in 0..count {
            let buffer = self.swap_chain.back_buffer(index)?;
            device.create_render_target_view(buffer, self.rtv(index)?)?;
            back_buffers.push(buffer);
        }
        self.back_buffers = back_buffers;

        let (width, height) = self.swap_chain.size();
        let depth = device.create_resource(
            &ResourceDescriptor::texture_2d(
                "Depth Buffer",
                width.max(1),
                height.max(1),
                self.depth_format,
                ResourceState::DepthWrite,
            )
            .with_clear_value(ClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0,
            }),
        )?;
        self.depth_buffer = Some(depth);
        device.create_depth_stencil_view(depth, self.dsv()?)?;
        Ok(())
    }

    /// Drops the back buffer references and destroys the depth buffer.
    ///
    /// The caller must have drained the GPU.
    pub fn release(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        self.back_buffers.clear();
        if let Some(depth) = self.depth_buffer.take() {
            device.destroy_resource(depth)?;
        }
        Ok(())
    }

    /// Resizes the swap chain buffers and recreates every view and the depth buffer.
    ///
    /// Must follow [`FrameTargets::release`].
    pub fn recreate(
        &mut self,
        device: &dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        self.swap_chain.resize_buffers(width, height)?;
        self.create_views(device)
    }

    /// Queues the current back buffer for presentation.
    pub fn present(&mut self, sync_interval: u32) -> Result<(), RenderError> {
        self.swap_chain.present(sync_interval)
    }

    /// Index of the back buffer the next frame renders into.
    pub fn current_index(&self) -> u32 {
        self.swap_chain.current_back_buffer_index()
    }

    /// The back buffer the next frame renders into.
    pub fn current_back_buffer(&self) -> Result<ResourceId, RenderError> {
        self.back_buffers
            .get(self.current_index() as usize)
            .copied()
            .ok_or_else(|| RenderError::InvalidState("render targets were released".to_string()))
    }

    /// The render target view of back buffer `index`.
    pub fn rtv(&self, index: u32) -> Result<CpuDescriptorHandle, RenderError> {
        self.rtv_heap
            .cpu_handle(index)
            .ok_or(RenderError::ResourceError(ResourceError::OutOfBounds))
    }

    /// The depth stencil view.
    pub fn dsv(&self) -> Result<CpuDescriptorHandle, RenderError> {
        self.dsv_heap
            .cpu_handle(0)
            .ok_or(RenderError::ResourceError(ResourceError::OutOfBounds))
    }

    /// The depth buffer, if the targets are live.
    pub fn depth_buffer(&self) -> Option<ResourceId> {
        self.depth_buffer
    }

    /// Number of back buffers.
    pub fn buffer_count(&self) -> u32 {
        self.swap_chain.buffer_count()
    }

    /// Current back buffer size.
    pub fn size(&self) -> (u32, u32) {
        self.swap_chain.size()
    }

    /// Back buffer format.
    pub fn format(&self) -> TextureFormat {
        self.swap_chain.format()
    }
}
