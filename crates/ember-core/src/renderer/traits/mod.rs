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

//! Defines the core architectural traits for the rendering subsystem.
//!
//! - [`GraphicsInstance`]: Adapter enumeration and device creation.
//! - [`GraphicsDevice`]: Creation and destruction of every GPU object.
//! - [`CommandQueue`]: Submission of command lists and fence signals.
//! - [`Fence`]: The GPU-to-CPU progress counter.
//! - [`SwapChain`]: Back buffer rotation and presentation.

mod graphics_device;
mod instance;
mod queue;
mod swap_chain;

pub use self::graphics_device::GraphicsDevice;
pub use self::instance::GraphicsInstance;
pub use self::queue::{CommandQueue, Fence};
pub use self::swap_chain::SwapChain;
