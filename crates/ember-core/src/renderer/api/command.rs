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

//! Command allocators and the recorded command list.
//!
//! A [`CommandList`] is a plain recording of [`Command`]s. It is reset onto a
//! command allocator, filled by a single thread, closed, then handed to a
//! [`CommandQueue`] for execution. The allocator owns the memory backing the
//! recording: it may only be reset once the GPU finished executing every list
//! recorded from it.
//!
//! [`CommandQueue`]: crate::renderer::traits::CommandQueue

use super::common::PrimitiveTopology;
use super::descriptor::{CpuDescriptorHandle, DescriptorHeapId, GpuDescriptorHandle};
use super::pipeline::{PipelineStateId, RootSignatureId};
use super::resource::{
    GpuVirtualAddress, IndexBufferView, ResourceId, ResourceState, TextureFootprint,
    VertexBufferView,
};
use crate::renderer::error::RenderError;

/// An opaque handle to a command allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandAllocatorId(pub usize);

/// A viewport rectangle with a depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering a `width` x `height` target with the full depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl From<Viewport> for ScissorRect {
    fn from(v: Viewport) -> Self {
        Self {
            left: v.x as i32,
            top: v.y as i32,
            right: (v.x + v.width) as i32,
            bottom: (v.y + v.height) as i32,
        }
    }
}

/// A single recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Declares a resource state transition.
    Barrier {
        /// The transitioning resource.
        resource: ResourceId,
        /// Current state.
        before: ResourceState,
        /// New state.
        after: ResourceState,
    },
    /// Copies a byte range between two buffers.
    CopyBufferRegion {
        /// Destination buffer, in `CopyDest`.
        dst: ResourceId,
        /// Destination offset.
        dst_offset: u64,
        /// Source buffer.
        src: ResourceId,
        /// Source offset.
        src_offset: u64,
        /// Number of bytes.
        size: u64,
    },
    /// Copies pitched texel rows from a buffer into a texture.
    CopyBufferToTexture {
        /// Destination texture, in `CopyDest`.
        dst: ResourceId,
        /// Source buffer.
        src: ResourceId,
        /// Layout of the texels inside `src`.
        footprint: TextureFootprint,
    },
    /// Copies a texture into pitched rows of a buffer.
    CopyTextureToBuffer {
        /// Destination buffer.
        dst: ResourceId,
        /// Source texture, in `CopySource`.
        src: ResourceId,
        /// Layout of the texels inside `dst`.
        footprint: TextureFootprint,
    },
    /// Binds the color and depth targets.
    SetRenderTargets {
        /// Color target view.
        rtv: CpuDescriptorHandle,
        /// Depth target view.
        dsv: Option<CpuDescriptorHandle>,
    },
    /// Fills a render target with a color.
    ClearRenderTarget {
        /// Target view.
        rtv: CpuDescriptorHandle,
        /// Linear RGBA color.
        color: [f32; 4],
    },
    /// Fills a depth buffer.
    ClearDepthStencil {
        /// Target view.
        dsv: CpuDescriptorHandle,
        /// Depth value.
        depth: f32,
        /// Stencil value.
        stencil: u8,
    },
    /// Sets the viewport.
    SetViewport(Viewport),
    /// Sets the scissor rectangle.
    SetScissorRect(ScissorRect),
    /// Binds the shader-visible descriptor heaps.
    SetDescriptorHeaps(Vec<DescriptorHeapId>),
    /// Binds a pipeline state object.
    SetPipelineState(PipelineStateId),
    /// Binds the graphics root signature.
    SetGraphicsRootSignature(RootSignatureId),
    /// Binds a constant buffer by address into a root slot.
    SetGraphicsRootConstantBufferView {
        /// Root parameter index.
        slot: u32,
        /// Address of the constants.
        address: GpuVirtualAddress,
    },
    /// Binds a descriptor table into a root slot.
    SetGraphicsRootDescriptorTable {
        /// Root parameter index.
        slot: u32,
        /// First descriptor of the table.
        handle: GpuDescriptorHandle,
    },
    /// Sets the primitive topology.
    SetPrimitiveTopology(PrimitiveTopology),
    /// Binds the vertex buffer of slot 0.
    SetVertexBuffer(VertexBufferView),
    /// Binds the index buffer.
    SetIndexBuffer(IndexBufferView),
    /// Draws indexed primitives.
    DrawIndexedInstanced {
        /// Indices per instance.
        index_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// First index.
        start_index: u32,
        /// Value added to each index.
        base_vertex: i32,
    },
}

/// Whether a [`CommandList`] accepts new commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListState {
    /// Open on an allocator.
    Recording,
    /// Closed and ready for submission.
    Closed,
}

/// A list of GPU commands recorded from one allocator.
#[derive(Debug, Clone)]
pub struct CommandList {
    label: String,
    allocator: Option<CommandAllocatorId>,
    commands: Vec<Command>,
    state: CommandListState,
}

impl CommandList {
    /// Creates an empty, closed command list.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            allocator: None,
            commands: Vec::new(),
            state: CommandListState::Closed,
        }
    }

    /// Reopens the list on `allocator`, dropping previously recorded commands.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] if the list is still recording.
    pub fn reset(&mut self, allocator: CommandAllocatorId) -> Result<(), RenderError> {
        if self.state == CommandListState::Recording {
            return Err(RenderError::InvalidState(format!(
                "command list '{}' reset while recording",
                self.label
            )));
        }
        self.allocator = Some(allocator);
        self.commands.clear();
        self.state = CommandListState::Recording;
        Ok(())
    }

    /// Closes the list so it can be executed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] if the list is not recording.
    pub fn close(&mut self) -> Result<(), RenderError> {
        if self.state != CommandListState::Recording {
            return Err(RenderError::InvalidState(format!(
                "command list '{}' closed twice",
                self.label
            )));
        }
        self.state = CommandListState::Closed;
        Ok(())
    }

    /// Appends a command.
    ///
    /// Recording into a closed list is a programming error: it asserts in debug
    /// builds and the command is dropped in release builds.
    pub fn record(&mut self, command: Command) {
        debug_assert!(
            self.is_recording(),
            "command recorded into closed list '{}'",
            self.label
        );
        if self.is_recording() {
            self.commands.push(command);
        }
    }

    /// Records a single state transition.
    pub fn resource_barrier(
        &mut self,
        resource: ResourceId,
        before: ResourceState,
        after: ResourceState,
    ) {
        if before != after {
            self.record(Command::Barrier {
                resource,
                before,
                after,
            });
        }
    }

    /// Whether the list is open.
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.state == CommandListState::Recording
    }

    /// The current state.
    #[inline]
    pub fn state(&self) -> CommandListState {
        self.state
    }

    /// The allocator the list was last reset onto.
    #[inline]
    pub fn allocator(&self) -> Option<CommandAllocatorId> {
        self.allocator
    }

    /// The recorded commands.
    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The debug name.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_must_be_reset_before_recording_and_closed_once() {
        let mut list = CommandList::new("test");
        assert_eq!(list.state(), CommandListState::Closed);
        assert!(list.close().is_err());

        list.reset(CommandAllocatorId(7)).unwrap();
        assert!(list.reset(CommandAllocatorId(7)).is_err());
        list.resource_barrier(
            ResourceId(1),
            ResourceState::Present,
            ResourceState::RenderTarget,
        );
        list.close().unwrap();

        assert_eq!(list.allocator(), Some(CommandAllocatorId(7)));
        assert_eq!(list.commands().len(), 1);
    }

    #[test]
    fn identity_barriers_are_not_recorded() {
        let mut list = CommandList::new("test");
        list.reset(CommandAllocatorId(0)).unwrap();
        list.resource_barrier(ResourceId(1), ResourceState::Common, ResourceState::Common);
        assert!(list.commands().is_empty());
    }

    #[test]
    fn reset_drops_previous_commands() {
        let mut list = CommandList::new("test");
        list.reset(CommandAllocatorId(0)).unwrap();
        list.record(Command::SetPrimitiveTopology(PrimitiveTopology::TriangleList));
        list.close().unwrap();
        list.reset(CommandAllocatorId(1)).unwrap();
        assert!(list.commands().is_empty());
    }

    #[test]
    fn scissor_matches_viewport() {
        let rect = ScissorRect::from(Viewport::full(800, 600));
        assert_eq!(rect.right, 800);
        assert_eq!(rect.bottom, 600);
    }
}
