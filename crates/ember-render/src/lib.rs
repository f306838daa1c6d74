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

//! # Ember Render
//!
//! The renderer core: device bootstrap, fence-based frame synchronization,
//! staged uploads, the per-object constant pool, shader-visible descriptor
//! allocation and pipeline state selection, driven by the [`Renderer`]
//! context object.

#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod constant_pool;
pub mod constants;
pub mod descriptors;
pub mod frame;
pub mod pipeline;
pub mod renderer;
pub mod scene;
pub mod sync;
pub mod targets;
pub mod upload;

pub use config::{ConfigError, RendererConfig};
pub use descriptors::DescriptorIndex;
pub use frame::{ClearValues, FrameState, FrameStats, ViewportDesc};
pub use pipeline::{PipelineVariant, ShadingModel};
pub use renderer::Renderer;
pub use scene::{Material, Mesh, MeshDraw, Renderable, Updatable, Vertex};
pub use upload::{GpuBuffer, GpuTexture, TextureData, UploadError, UploadState, Uploadable};
