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

//! Swap chain creation parameters.

use super::common::TextureFormat;

/// Minimum number of back buffers in a flip-model swap chain.
pub const MIN_BACK_BUFFERS: u32 = 2;

/// Maximum number of back buffers the renderer rotates through.
pub const MAX_BACK_BUFFERS: u32 = 3;

/// A descriptor used to create a swap chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDescriptor {
    /// Back buffer width in pixels.
    pub width: u32,
    /// Back buffer height in pixels.
    pub height: u32,
    /// Number of back buffers.
    pub buffer_count: u32,
    /// Back buffer format.
    pub format: TextureFormat,
}
