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

//! Data types of the explicit graphics API.
//!
//! - **[`common`]**: Formats, adapter info, fence values and alignment rules.
//! - **[`resource`]**: Buffers, textures, heaps and resource states.
//! - **[`descriptor`]**: Descriptor heaps and handles.
//! - **[`pipeline`]**: Shaders, root signatures and pipeline state objects.
//! - **[`command`]**: Command allocators and the recorded command list.
//! - **[`fence`]**: The event a fence fires on completion.
//! - **[`swap_chain`]**: Presentation targets.

pub mod command;
pub mod common;
pub mod descriptor;
pub mod fence;
pub mod pipeline;
pub mod resource;
pub mod swap_chain;

pub use self::command::*;
pub use self::common::*;
pub use self::descriptor::*;
pub use self::fence::FenceEvent;
pub use self::pipeline::*;
pub use self::resource::*;
pub use self::swap_chain::*;
