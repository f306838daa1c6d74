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

//! A software reference backend.
//!
//! It implements the explicit device model on the CPU: command lists execute on
//! a separate GPU timeline thread, fences complete asynchronously, and a
//! validation layer checks resource states and lifetimes. It backs headless
//! runs and the test suites.

mod device;
mod executor;
mod fence;
mod gpu;
mod instance;
mod journal;
mod queue;
mod swap_chain;
mod timeline;

pub use self::device::SoftDevice;
pub use self::fence::SoftFence;
pub use self::gpu::SoftDeviceConfig;
pub use self::instance::SoftInstance;
pub use self::journal::JournalEvent;
pub use self::queue::SoftQueue;
pub use self::swap_chain::SoftSwapChain;
