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

use crate::renderer::api::{ResourceId, TextureFormat};
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// A flip-model swap chain rotating through N back buffers.
pub trait SwapChain: Send + Debug {
    /// Number of back buffers.
    fn buffer_count(&self) -> u32;

    /// Index of the back buffer the next frame renders into.
    fn current_back_buffer_index(&self) -> u32;

    /// Returns back buffer `index`.
    fn back_buffer(&self, index: u32) -> Result<ResourceId, RenderError>;

    /// Back buffer format.
    fn format(&self) -> TextureFormat;

    /// Current back buffer size.
    fn size(&self) -> (u32, u32);

    /// Queues the current back buffer for presentation and advances the index.
    /// ## Arguments
    /// * `sync_interval` - `1` waits for vertical blank, `0` presents immediately.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was removed or reset.
    /// * `RenderError::PresentFailed` - For any transient failure.
    fn present(&mut self, sync_interval: u32) -> Result<(), RenderError>;

    /// Reallocates every back buffer at the new size.
    ///
    /// The GPU must be idle and no back buffer may be referenced by a view.
    /// The back buffer index restarts at 0.
    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<(), RenderError>;
}
