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

//! The ordered record of what happened on a soft device.
//!
//! Events are appended from both the recording thread and the GPU timeline
//! thread, so their order is the real interleaving of CPU and GPU activity.

use ember_core::renderer::{CommandAllocatorId, FenceValue, PipelineStateId, ResourceId};

/// One entry of the device journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    /// A command list was handed to the queue.
    Submitted {
        /// Timeline serial of the submission.
        serial: u64,
        /// Command list label.
        list: String,
    },
    /// The GPU timeline finished executing a command list.
    Executed {
        /// Timeline serial of the submission.
        serial: u64,
        /// Command list label.
        list: String,
    },
    /// The GPU signaled a fence.
    FenceSignaled {
        /// The new completed value.
        value: FenceValue,
    },
    /// A command allocator was reset.
    AllocatorReset {
        /// The allocator.
        allocator: CommandAllocatorId,
        /// Whether work recorded from it was still executing.
        in_flight: bool,
    },
    /// A resource was released.
    ResourceDestroyed {
        /// The resource.
        resource: ResourceId,
        /// Its debug name.
        label: String,
        /// Whether submitted work still referenced it.
        in_flight: bool,
    },
    /// The swap chain reallocated its back buffers.
    BuffersResized {
        /// New width.
        width: u32,
        /// New height.
        height: u32,
        /// Whether submitted work still referenced the old buffers.
        in_flight: bool,
    },
    /// A back buffer was queued for presentation.
    Presented {
        /// The presented back buffer index.
        back_buffer: u32,
        /// The sync interval.
        sync_interval: u32,
    },
    /// A pipeline state object was bound on the GPU timeline.
    PipelineBound {
        /// The pipeline.
        pipeline: PipelineStateId,
        /// Its debug name.
        label: String,
    },
    /// An indexed draw passed validation and executed.
    Draw {
        /// The bound pipeline.
        pipeline: PipelineStateId,
        /// Number of indices.
        index_count: u32,
    },
    /// The device was removed.
    DeviceRemoved {
        /// The removal reason.
        reason: String,
    },
}
