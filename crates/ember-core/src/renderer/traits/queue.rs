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

use crate::renderer::api::{CommandList, FenceEvent, FenceValue};
use crate::renderer::error::RenderError;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// The single FIFO submission channel to the GPU.
///
/// Work executes in submission order. A signal enqueued after a batch of
/// command lists completes only once the whole batch has executed.
pub trait CommandQueue: Send + Sync + Debug {
    /// Submits closed command lists for execution.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was removed.
    /// * `RenderError::SubmissionFailed` - If a list is still recording.
    fn execute_command_lists(&self, lists: &[&CommandList]) -> Result<(), RenderError>;

    /// Enqueues a GPU-side signal of `fence` to `value`.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was removed.
    fn signal(&self, fence: &dyn Fence, value: FenceValue) -> Result<(), RenderError>;
}

/// A GPU-visible monotonic counter.
pub trait Fence: Send + Sync + Debug {
    /// The highest value the GPU has signaled.
    ///
    /// Reports [`FENCE_VALUE_DEVICE_REMOVED`] once the device is removed.
    ///
    /// [`FENCE_VALUE_DEVICE_REMOVED`]: crate::renderer::api::FENCE_VALUE_DEVICE_REMOVED
    fn completed_value(&self) -> FenceValue;

    /// Arranges for `event` to be signaled once the completed value reaches `value`.
    ///
    /// Signals immediately if the value is already reached.
    fn set_event_on_completion(
        &self,
        value: FenceValue,
        event: Arc<FenceEvent>,
    ) -> Result<(), RenderError>;

    /// Access to the concrete backend type.
    fn as_any(&self) -> &dyn Any;
}
