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

use super::gpu::GpuState;
use super::journal::JournalEvent;
use super::timeline::{Job, Timeline};
use ember_core::renderer::*;
use std::sync::Arc;

/// A flip-model swap chain whose back buffers are soft textures.
#[derive(Debug)]
pub struct SoftSwapChain {
    gpu: Arc<GpuState>,
    timeline: Arc<Timeline>,
    buffers: Vec<ResourceId>,
    format: TextureFormat,
    size: (u32, u32),
    current: u32,
}

impl SoftSwapChain {
    pub(crate) fn new(
        gpu: Arc<GpuState>,
        timeline: Arc<Timeline>,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Self, RenderError> {
        if !(MIN_BACK_BUFFERS..=MAX_BACK_BUFFERS).contains(&descriptor.buffer_count) {
            return Err(RenderError::InitializationFailed(format!(
                "swap chains need {MIN_BACK_BUFFERS} to {MAX_BACK_BUFFERS} back buffers, got {}",
                descriptor.buffer_count
            )));
        }
        if descriptor.format.is_depth() {
            return Err(RenderError::InitializationFailed(
                "swap chain back buffers cannot use a depth format".to_string(),
            ));
        }
        let mut swap_chain = Self {
            gpu,
            timeline,
            buffers: Vec::new(),
            format: descriptor.format,
            size: (descriptor.width, descriptor.height),
            current: 0,
        };
        swap_chain.allocate_buffers(descriptor.buffer_count)?;
        Ok(swap_chain)
    }

    fn allocate_buffers(&mut self, count: u32) -> Result<(), RenderError> {
        let (width, height) = self.size;
        for index in 0..count {
            let id = self.gpu.create_resource(&ResourceDescriptor::texture_2d(
                format!("Back Buffer {index}"),
                width.max(1),
                height.max(1),
                self.format,
                ResourceState::Present,
            ))?;
            self.buffers.push(id);
        }
        Ok(())
    }
}

impl SwapChain for SoftSwapChain {
    fn buffer_count(&self) -> u32 {
        self.buffers.len() as u32
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.current
    }

    fn back_buffer(&self, index: u32) -> Result<ResourceId, RenderError> {
        self.buffers
            .get(index as usize)
            .copied()
            .ok_or(RenderError::ResourceError(ResourceError::OutOfBounds))
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn present(&mut self, sync_interval: u32) -> Result<(), RenderError> {
        self.gpu.check_removed()?;
        let back_buffer = self.back_buffer(self.current)?;
        let serial = self.gpu.next_serial();
        self.gpu.mark_resource_use(back_buffer, serial);
        self.timeline
            .submit(Job::Present {
                serial,
                back_buffer,
            })
            .map_err(RenderError::PresentFailed)?;
        self.gpu.record(JournalEvent::Presented {
            back_buffer: self.current,
            sync_interval,
        });
        self.current = (self.current + 1) % self.buffer_count();
        Ok(())
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.gpu.check_removed()?;
        if self.buffers.iter().any(|id| self.gpu.is_resource_in_flight(*id)) {
            self.gpu
                .report("swap chain resized while its back buffers are in flight".to_string());
            return Err(RenderError::InvalidState(
                "back buffers are still referenced by in-flight work".to_string(),
            ));
        }
        let count = self.buffer_count();
        for id in self.buffers.drain(..) {
            self.gpu.destroy_resource(id)?;
        }
        self.size = (width, height);
        self.current = 0;
        self.allocate_buffers(count)?;
        self.gpu.record(JournalEvent::BuffersResized {
            width,
            height,
            in_flight: false,
        });
        log::debug!("Swap chain resized to {width}x{height}.");
        Ok(())
    }
}

impl Drop for SoftSwapChain {
    fn drop(&mut self) {
        for id in self.buffers.drain(..) {
            let _ = self.gpu.destroy_resource(id);
        }
    }
}
