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

//! Per-frame bookkeeping: frame slots, frame state and statistics.

use ember_core::math::LinearRgba;
use ember_core::renderer::{CommandAllocatorId, FenceValue};

pub use ember_core::renderer::Viewport as ViewportDesc;

/// The resources owned by one frame in flight.
///
/// The allocator may only be reset once the fence reached `fence_value`, the
/// value signaled after the slot's last submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Command allocator the slot records from.
    pub allocator: CommandAllocatorId,
    /// Fence value signaled after the slot's last submission, 0 if never submitted.
    pub fence_value: FenceValue,
}

impl FrameSlot {
    /// Creates a slot that was never submitted.
    pub fn new(allocator: CommandAllocatorId) -> Self {
        Self {
            allocator,
            fence_value: 0,
        }
    }

    /// Whether the GPU finished the slot's last submission.
    #[inline]
    pub fn is_reusable(&self, completed: FenceValue) -> bool {
        completed >= self.fence_value
    }
}

/// Where the renderer is in its frame lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    /// No frame is being recorded.
    #[default]
    Idle,
    /// Between `begin_frame` and `end_frame`.
    Recording,
    /// Submitted, waiting for `present`.
    Submitted,
}

/// Values used by [`Renderer::clear`](crate::Renderer::clear).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    /// Color of the back buffer.
    pub color: LinearRgba,
    /// Depth value.
    pub depth: f32,
    /// Stencil value.
    pub stencil: u8,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: LinearRgba::new(0.2, 0.3, 0.4, 1.0),
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Counters of the last recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Number of frames begun since creation.
    pub frame_number: u64,
    /// Indexed draws recorded in the frame.
    pub draw_calls: u32,
    /// Object constant slots allocated in the frame.
    pub objects: u32,
    /// Triangles submitted in the frame.
    pub triangles: u64,
    /// Draws skipped because no pipeline or resource was usable.
    pub skipped_draws: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slot_is_reusable() {
        let slot = FrameSlot::new(CommandAllocatorId(1));
        assert!(slot.is_reusable(0));
    }

    #[test]
    fn slot_waits_for_its_fence() {
        let slot = FrameSlot {
            allocator: CommandAllocatorId(1),
            fence_value: 4,
        };
        assert!(!slot.is_reusable(3));
        assert!(slot.is_reusable(4));
    }
}
