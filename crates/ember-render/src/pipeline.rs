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

//! Root signatures, pipeline state objects and the variant selection policy.

use ember_core::renderer::*;
use std::collections::HashMap;
use std::fmt;

const MESH_VS: &str = include_str!("../shaders/mesh_vs.hlsl");
const BASIC_PS: &str = include_str!("../shaders/basic_ps.hlsl");
const TEXTURED_PS: &str = include_str!("../shaders/textured_ps.hlsl");
const EMISSIVE_PS: &str = include_str!("../shaders/emissive_ps.hlsl");

/// Root parameter slot of the model constants (`b0`).
pub const MODEL_SLOT: u32 = 0;
/// Root parameter slot of the view constants (`b1`).
pub const VIEW_SLOT: u32 = 1;
/// Root parameter slot of the light constants (`b2`).
pub const LIGHT_SLOT: u32 = 2;
/// Root parameter slot of the material constants (`b3`).
pub const MATERIAL_SLOT: u32 = 3;
/// Root parameter slot of the texture table (`t0`), textured signature only.
pub const TEXTURE_TABLE_SLOT: u32 = 4;

/// How a surface is shaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadingModel {
    /// Lit, flat material color.
    #[default]
    Flat,
    /// Lit, sampled texture.
    Textured,
    /// Unlit emitter.
    Emissive,
}

/// The two root signature layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootSignatureKind {
    /// `b0..b3`.
    ConstantsOnly,
    /// `b0..b3`, a one-descriptor table at `t0` and a static sampler at `s0`.
    Textured,
}

impl RootSignatureKind {
    fn descriptor(self) -> RootSignatureDescriptor<'static> {
        let mut parameters: Vec<RootParameter> = (0..4)
            .map(|register| RootParameter::ConstantBufferView { register })
            .collect();
        let mut static_samplers = Vec::new();
        let label = match self {
            RootSignatureKind::ConstantsOnly => "Mesh Root Signature",
            RootSignatureKind::Textured => {
                parameters.push(RootParameter::ShaderResourceTable {
                    base_register: 0,
                    count: 1,
                });
                static_samplers.push(StaticSampler {
                    register: 0,
                    sampler: SamplerDescriptor::LINEAR_WRAP,
                });
                "Textured Mesh Root Signature"
            }
        };
        RootSignatureDescriptor {
            label: Some(label.into()),
            parameters,
            static_samplers,
        }
    }
}

/// One of the six pipeline state objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    /// Flat, solid.
    Basic,
    /// Flat, wireframe.
    Wireframe,
    /// Textured, solid.
    Textured,
    /// Textured, wireframe.
    TexturedWireframe,
    /// Emissive, solid.
    Emissive,
    /// Emissive, wireframe.
    EmissiveWireframe,
}

impl PipelineVariant {
    /// Every variant, in build order.
    pub const ALL: [PipelineVariant; 6] = [
        PipelineVariant::Basic,
        PipelineVariant::Wireframe,
        PipelineVariant::Textured,
        PipelineVariant::TexturedWireframe,
        PipelineVariant::Emissive,
        PipelineVariant::EmissiveWireframe,
    ];

    /// The variant drawing `shading` with the requested fill mode.
    pub fn new(shading: ShadingModel, wireframe: bool) -> Self {
        match (shading, wireframe) {
            (ShadingModel::Flat, false) => PipelineVariant::Basic,
            (ShadingModel::Flat, true) => PipelineVariant::Wireframe,
            (ShadingModel::Textured, false) => PipelineVariant::Textured,
            (ShadingModel::Textured, true) => PipelineVariant::TexturedWireframe,
            (ShadingModel::Emissive, false) => PipelineVariant::Emissive,
            (ShadingModel::Emissive, true) => PipelineVariant::EmissiveWireframe,
        }
    }

    /// Shading model of the variant.
    pub fn shading(self) -> ShadingModel {
        match self {
            PipelineVariant::Basic | PipelineVariant::Wireframe => ShadingModel::Flat,
            PipelineVariant::Textured | PipelineVariant::TexturedWireframe => ShadingModel::Textured,
            PipelineVariant::Emissive | PipelineVariant::EmissiveWireframe => ShadingModel::Emissive,
        }
    }

    /// Whether the variant rasterizes edges only.
    pub fn is_wireframe(self) -> bool {
        matches!(
            self,
            PipelineVariant::Wireframe
                | PipelineVariant::TexturedWireframe
                | PipelineVariant::EmissiveWireframe
        )
    }

    /// The variant used when this one is unavailable.
    ///
    /// Textured and emissive fall back to flat with the same fill mode,
    /// wireframe falls back to basic, basic has no fallback.
    pub fn fallback(self) -> Option<Self> {
        match self {
            PipelineVariant::Basic => None,
            PipelineVariant::Wireframe
            | PipelineVariant::Textured
            | PipelineVariant::Emissive => Some(PipelineVariant::Basic),
            PipelineVariant::TexturedWireframe | PipelineVariant::EmissiveWireframe => {
                Some(PipelineVariant::Wireframe)
            }
        }
    }

    /// Root signature the variant is built against.
    pub fn root_signature_kind(self) -> RootSignatureKind {
        match self.shading() {
            ShadingModel::Textured => RootSignatureKind::Textured,
            ShadingModel::Flat | ShadingModel::Emissive => RootSignatureKind::ConstantsOnly,
        }
    }

    /// Debug name of the pipeline state object.
    pub fn label(self) -> &'static str {
        match self {
            PipelineVariant::Basic => "Basic Mesh PSO",
            PipelineVariant::Wireframe => "Wireframe Mesh PSO",
            PipelineVariant::Textured => "Textured Mesh PSO",
            PipelineVariant::TexturedWireframe => "Textured Wireframe Mesh PSO",
            PipelineVariant::Emissive => "Emissive Mesh PSO",
            PipelineVariant::EmissiveWireframe => "Emissive Wireframe Mesh PSO",
        }
    }

    fn pixel_shader(self) -> (&'static str, &'static str, &'static str) {
        match self.shading() {
            ShadingModel::Flat => ("basic_ps.hlsl", BASIC_PS, "PSMain"),
            ShadingModel::Textured => ("textured_ps.hlsl", TEXTURED_PS, "PSTextured"),
            ShadingModel::Emissive => ("emissive_ps.hlsl", EMISSIVE_PS, "PSEmissive"),
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A pipeline ready to be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedPipeline {
    /// The variant actually bound, after fallback.
    pub variant: PipelineVariant,
    /// Its pipeline state object.
    pub pipeline: PipelineStateId,
    /// The root signature it was built against.
    pub root_signature: RootSignatureId,
    /// Layout of that root signature.
    pub root_signature_kind: RootSignatureKind,
}

/// The pipeline state objects of the mesh renderer.
///
/// Building never fails as a whole: variants whose shaders or pipeline state
/// could not be created are logged and left out, and [`PipelineLibrary::select`]
/// falls back past them.
#[derive(Debug, Default)]
pub struct PipelineLibrary {
    root_signatures: HashMap<RootSignatureKind, RootSignatureId>,
    pipelines: HashMap<PipelineVariant, PipelineStateId>,
}

impl PipelineLibrary {
    /// Compiles the shaders and builds every variant that can be built.
    pub fn build(
        device: &dyn GraphicsDevice,
        render_target_format: TextureFormat,
        depth_format: TextureFormat,
    ) -> Self {
        let mut library = Self::default();

        for kind in [RootSignatureKind::ConstantsOnly, RootSignatureKind::Textured] {
            match device.create_root_signature(&kind.descriptor()) {
                Ok(id) => {
                    library.root_signatures.insert(kind, id);
                }
                Err(e) => log::warn!("Failed to create the {kind:?} root signature: {e}"),
            }
        }

        let Some(vertex_shader) =
            compile(device, "mesh_vs.hlsl", MESH_VS, "VSMain", ShaderStage::Vertex)
        else {
            log::error!("The mesh vertex shader failed to compile, nothing can be drawn.");
            return library;
        };
        let mut pixel_shaders: HashMap<ShadingModel, Option<ShaderModuleId>> = HashMap::new();

        for variant in PipelineVariant::ALL {
            let Some(&root_signature) = library.root_signatures.get(&variant.root_signature_kind())
            else {
                continue;
            };
            let pixel_shader = *pixel_shaders.entry(variant.shading()).or_insert_with(|| {
                let (label, source, entry_point) = variant.pixel_shader();
                compile(device, label, source, entry_point, ShaderStage::Pixel)
            });
            let Some(pixel_shader) = pixel_shader else {
                log::warn!("{variant} skipped: its pixel shader did not compile.");
                continue;
            };
            let descriptor = PipelineStateDescriptor {
                label: Some(variant.label().into()),
                root_signature,
                vertex_shader,
                pixel_shader,
                input_layout: crate::scene::Vertex::input_layout(),
                fill_mode: if variant.is_wireframe() {
                    FillMode::Wireframe
                } else {
                    FillMode::Solid
                },
                cull_mode: if variant.is_wireframe() {
                    CullMode::None
                } else {
                    CullMode::Back
                },
                topology: PrimitiveTopology::TriangleList,
                depth_enabled: true,
                render_target_format,
                depth_format,
            };
            match device.create_pipeline_state(&descriptor) {
                Ok(id) => {
                    library.pipelines.insert(variant, id);
                }
                Err(e) => log::warn!("Failed to build {variant}: {e}"),
            }
        }

        log::info!(
            "Pipeline library ready: {}/{} variants built.",
            library.pipelines.len(),
            PipelineVariant::ALL.len()
        );
        library
    }

    /// Picks the pipeline for `shading`, following the fallback chain.
    ///
    /// Returns `None` when neither the variant nor any fallback was built; the
    /// draw must then be skipped.
    pub fn select(&self, shading: ShadingModel, wireframe: bool) -> Option<SelectedPipeline> {
        let mut candidate = Some(PipelineVariant::new(shading, wireframe));
        while let Some(variant) = candidate {
            if let Some(&pipeline) = self.pipelines.get(&variant) {
                let root_signature_kind = variant.root_signature_kind();
                if let Some(&root_signature) = self.root_signatures.get(&root_signature_kind) {
                    return Some(SelectedPipeline {
                        variant,
                        pipeline,
                        root_signature,
                        root_signature_kind,
                    });
                }
            }
            candidate = variant.fallback();
        }
        None
    }

    /// Whether `variant` itself was built.
    pub fn is_available(&self, variant: PipelineVariant) -> bool {
        self.pipelines.contains_key(&variant)
    }

    /// Number of variants built.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Whether no variant could be built.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

fn compile(
    device: &dyn GraphicsDevice,
    label: &'static str,
    source: &'static str,
    entry_point: &'static str,
    stage: ShaderStage,
) -> Option<ShaderModuleId> {
    let result = device.compile_shader(&ShaderSource {
        label: label.into(),
        source: source.into(),
        entry_point: entry_point.into(),
        stage,
    });
    match result {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("{e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::SoftInstance;

    fn library_with_failures(patterns: &[&str]) -> PipelineLibrary {
        let device = SoftInstance::new()
            .create_soft_device(1, &DeviceOptions::default())
            .unwrap();
        for pattern in patterns {
            device.fail_shader_compilation(pattern);
        }
        PipelineLibrary::build(device.as_ref(), TextureFormat::Rgba8Unorm, TextureFormat::D32Float)
    }

    #[test]
    fn fallback_chain_ends_at_basic() {
        for variant in PipelineVariant::ALL {
            let mut current = variant;
            let mut steps = 0;
            while let Some(next) = current.fallback() {
                current = next;
                steps += 1;
            }
            assert_eq!(current, PipelineVariant::Basic);
            assert!(steps <= 2, "{variant} needs {steps} fallbacks");
        }
    }

    #[test]
    fn only_textured_variants_use_the_table() {
        for variant in PipelineVariant::ALL {
            let textured = variant.shading() == ShadingModel::Textured;
            assert_eq!(
                variant.root_signature_kind() == RootSignatureKind::Textured,
                textured
            );
        }
    }

    #[test]
    fn all_variants_build_on_a_healthy_device() {
        let library = library_with_failures(&[]);
        assert_eq!(library.len(), 6);
        let selected = library.select(ShadingModel::Textured, true).unwrap();
        assert_eq!(selected.variant, PipelineVariant::TexturedWireframe);
        assert_eq!(selected.root_signature_kind, RootSignatureKind::Textured);
    }

    #[test]
    fn selection_is_deterministic() {
        let library = library_with_failures(&[]);
        let first = library.select(ShadingModel::Emissive, false);
        let second = library.select(ShadingModel::Emissive, false);
        assert_eq!(first, second);
    }

    #[test]
    fn failed_emissive_shader_falls_back_with_the_same_fill_mode() {
        let library = library_with_failures(&["emissive"]);
        assert!(!library.is_available(PipelineVariant::Emissive));
        assert_eq!(
            library.select(ShadingModel::Emissive, false).map(|s| s.variant),
            Some(PipelineVariant::Basic)
        );
        assert_eq!(
            library.select(ShadingModel::Emissive, true).map(|s| s.variant),
            Some(PipelineVariant::Wireframe)
        );
    }

    #[test]
    fn nothing_is_selected_without_a_vertex_shader() {
        let library = library_with_failures(&["mesh_vs"]);
        assert!(library.is_empty());
        assert_eq!(library.select(ShadingModel::Flat, false), None);
    }
}
