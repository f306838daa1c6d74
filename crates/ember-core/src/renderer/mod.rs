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

//! The backend-agnostic contract of an explicit graphics API.
//!
//! This module defines the 'what': command lists, descriptor heaps, pipeline
//! state objects, resource-state transitions and fences. The 'how' lives in a
//! concrete backend in the `ember-infra` crate, and `ember-render` builds the
//! frame loop on top of these traits without knowing which backend runs it.

pub mod api;
pub mod error;
pub mod traits;

pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::traits::{CommandQueue, Fence, GraphicsDevice, GraphicsInstance, SwapChain};
