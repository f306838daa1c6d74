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

//! Shaders, root signatures and pipeline state objects.

use super::common::{PrimitiveTopology, TextureFormat};
use super::descriptor::SamplerDescriptor;
use std::borrow::Cow;

/// An opaque handle to a compiled shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleId(pub usize);

/// An opaque handle to a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignatureId(pub usize);

/// An opaque handle to an immutable pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineStateId(pub usize);

/// The programmable stage a shader targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Pixel shader.
    Pixel,
}

impl ShaderStage {
    /// The shader model 5.1 target profile for this stage.
    pub fn target_profile(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_5_1",
            ShaderStage::Pixel => "ps_5_1",
        }
    }
}

/// HLSL source handed to the device's shader compiler.
#[derive(Debug, Clone)]
pub struct ShaderSource<'a> {
    /// Debug name, usually the file name.
    pub label: Cow<'a, str>,
    /// The HLSL source text.
    pub source: Cow<'a, str>,
    /// Entry point function name.
    pub entry_point: Cow<'a, str>,
    /// Target stage.
    pub stage: ShaderStage,
}

/// One parameter slot of a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootParameter {
    /// A root constant buffer view bound by GPU address at `register` (`bN`).
    ConstantBufferView {
        /// Shader register.
        register: u32,
    },
    /// A table of shader resource views starting at `base_register` (`tN`).
    ShaderResourceTable {
        /// First shader register.
        base_register: u32,
        /// Number of consecutive descriptors.
        count: u32,
    },
}

/// A sampler baked into the root signature at `register` (`sN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSampler {
    /// Shader register.
    pub register: u32,
    /// Sampler state.
    pub sampler: SamplerDescriptor,
}

/// A descriptor used to create a root signature.
#[derive(Debug, Clone)]
pub struct RootSignatureDescriptor<'a> {
    /// Debug name.
    pub label: Option<Cow<'a, str>>,
    /// Parameters, in slot order.
    pub parameters: Vec<RootParameter>,
    /// Samplers baked into the signature.
    pub static_samplers: Vec<StaticSampler>,
}

/// Polygon rasterization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled triangles.
    #[default]
    Solid,
    /// Triangle edges only.
    Wireframe,
}

/// Which triangle faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Cull back faces.
    #[default]
    Back,
}

/// Format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
}

/// One element of the input layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute<'a> {
    /// HLSL semantic name (`POSITION`, `NORMAL`, ...).
    pub semantic: Cow<'a, str>,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset inside the vertex.
    pub offset: u32,
}

/// A descriptor used to create a graphics pipeline state object.
#[derive(Debug, Clone)]
pub struct PipelineStateDescriptor<'a> {
    /// Debug name.
    pub label: Option<Cow<'a, str>>,
    /// The root signature the shaders were written against.
    pub root_signature: RootSignatureId,
    /// Vertex stage.
    pub vertex_shader: ShaderModuleId,
    /// Pixel stage.
    pub pixel_shader: ShaderModuleId,
    /// Input layout.
    pub input_layout: Vec<VertexAttribute<'a>>,
    /// Rasterizer fill mode.
    pub fill_mode: FillMode,
    /// Rasterizer cull mode.
    pub cull_mode: CullMode,
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Enables depth testing and writing.
    pub depth_enabled: bool,
    /// Format of the single color target.
    pub render_target_format: TextureFormat,
    /// Format of the depth target.
    pub depth_format: TextureFormat,
}
