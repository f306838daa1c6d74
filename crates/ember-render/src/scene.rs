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

//! The capabilities scene objects expose to the renderer, and the mesh draw
//! that implements them.

use crate::pipeline::ShadingModel;
use crate::renderer::Renderer;
use crate::upload::{GpuBuffer, GpuTexture, UploadError, Uploadable};
use ember_core::math::{LinearRgba, Mat4};
use ember_core::renderer::*;
use std::borrow::Cow;

/// Something that records draw commands into the current frame.
pub trait Renderable {
    /// Records the object's commands. Called between `begin_frame` and `end_frame`.
    fn render(&mut self, renderer: &mut Renderer) -> Result<(), RenderError>;
}

/// Something that advances with time.
pub trait Updatable {
    /// Advances the object by `delta_seconds`.
    fn update(&mut self, delta_seconds: f32);
}

/// The vertex format shared by every mesh pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Creates a vertex.
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// The input layout matching `mesh_vs.hlsl`.
    pub fn input_layout() -> Vec<VertexAttribute<'static>> {
        vec![
            VertexAttribute {
                semantic: Cow::Borrowed("POSITION"),
                format: VertexFormat::Float32x3,
                offset: 0,
            },
            VertexAttribute {
                semantic: Cow::Borrowed("NORMAL"),
                format: VertexFormat::Float32x3,
                offset: 12,
            },
            VertexAttribute {
                semantic: Cow::Borrowed("TEXCOORD"),
                format: VertexFormat::Float32x2,
                offset: 24,
            },
        ]
    }
}

/// Indexed triangle geometry in two default-heap buffers.
#[derive(Debug)]
pub struct Mesh {
    label: String,
    vertices: GpuBuffer,
    indices: GpuBuffer,
    index_count: u32,
}

impl Mesh {
    /// Stages the vertex and index data. The buffers are uploaded the first
    /// time the mesh is rendered.
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<Self, UploadError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertices = GpuBuffer::new(
            device,
            &format!("{label} Vertices"),
            vertex_bytes.len() as u64,
            HeapKind::Default,
            ResourceState::VertexAndConstantBuffer,
            Some(vertex_bytes),
        )?;
        let indices = match GpuBuffer::new(
            device,
            &format!("{label} Indices"),
            index_bytes.len() as u64,
            HeapKind::Default,
            ResourceState::IndexBuffer,
            Some(index_bytes),
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                let _ = vertices.destroy(device);
                return Err(err);
            }
        };
        Ok(Self {
            label: label.to_string(),
            vertices,
            indices,
            index_count: index_bytes.len() as u32 / IndexFormat::Uint32.size(),
        })
    }

    /// Debug name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether either buffer still has to be uploaded.
    pub fn needs_upload(&self) -> bool {
        self.vertices.needs_upload() || self.indices.needs_upload()
    }

    /// The vertex and index buffers, for uploads.
    pub fn buffers_mut(&mut self) -> [&mut dyn Uploadable; 2] {
        [&mut self.vertices, &mut self.indices]
    }

    /// The view bound to the input assembler.
    pub fn vertex_buffer_view(&self) -> VertexBufferView {
        VertexBufferView {
            resource: self.vertices.resource(),
            address: self.vertices.address(),
            size: self.vertices.size() as u32,
            stride: std::mem::size_of::<Vertex>() as u32,
        }
    }

    /// The index view bound to the input assembler.
    pub fn index_buffer_view(&self) -> IndexBufferView {
        IndexBufferView {
            resource: self.indices.resource(),
            address: self.indices.address(),
            size: self.indices.size() as u32,
            format: IndexFormat::Uint32,
        }
    }

    /// Number of indices.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    /// Destroys both buffers. The GPU must be done with them.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.vertices.destroy(device)?;
        self.indices.destroy(device)
    }
}

/// Surface description of a mesh draw.
#[derive(Debug)]
pub struct Material {
    /// Name. Names containing `Light` or `Emissive` mark emitters.
    pub name: String,
    /// Base color. Missing colors draw white.
    pub color: Option<LinearRgba>,
    /// Multiplier of the emitted color.
    pub emissive_intensity: f32,
    /// Diffuse texture.
    pub texture: Option<GpuTexture>,
}

impl Material {
    /// An untextured material without a color.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            emissive_intensity: 1.0,
            texture: None,
        }
    }

    /// Sets the base color.
    pub fn with_color(mut self, color: LinearRgba) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets the diffuse texture.
    pub fn with_texture(mut self, texture: GpuTexture) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Sets the emissive intensity.
    pub fn with_emissive_intensity(mut self, intensity: f32) -> Self {
        self.emissive_intensity = intensity;
        self
    }

    /// Whether the material is drawn unlit.
    pub fn is_emissive(&self) -> bool {
        self.name.contains("Light") || self.name.contains("Emissive")
    }

    /// The shading model the material asks for. Emission wins over texturing.
    pub fn shading(&self) -> ShadingModel {
        if self.is_emissive() {
            ShadingModel::Emissive
        } else if self.texture.is_some() {
            ShadingModel::Textured
        } else {
            ShadingModel::Flat
        }
    }

    /// The color written into the material constants.
    pub fn base_color(&self) -> LinearRgba {
        self.color.unwrap_or(LinearRgba::WHITE)
    }
}

/// One mesh drawn with a material at a world transform.
#[derive(Debug)]
pub struct MeshDraw {
    /// The geometry.
    pub mesh: Mesh,
    /// The surface. `None` draws flat gray.
    pub material: Option<Material>,
    /// World transform before the spin.
    pub transform: Mat4,
    /// Rotation speed around the Y axis, in radians per second.
    pub spin: f32,
    /// Skips the draw when `false`.
    pub visible: bool,
    angle: f32,
}

impl MeshDraw {
    /// A visible, static draw.
    pub fn new(mesh: Mesh, material: Option<Material>, transform: Mat4) -> Self {
        Self {
            mesh,
            material,
            transform,
            spin: 0.0,
            visible: true,
            angle: 0.0,
        }
    }

    /// Sets the rotation speed.
    pub fn with_spin(mut self, radians_per_second: f32) -> Self {
        self.spin = radians_per_second;
        self
    }

    /// The world matrix of the current frame.
    pub fn world_matrix(&self) -> Mat4 {
        self.transform * Mat4::from_rotation_y(self.angle)
    }

    /// Destroys the GPU resources. The GPU must be done with them.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        if let Some(texture) = self.material.and_then(|material| material.texture) {
            texture.destroy(device)?;
        }
        self.mesh.destroy(device)
    }
}

impl Updatable for MeshDraw {
    fn update(&mut self, delta_seconds: f32) {
        self.angle = (self.angle + self.spin * delta_seconds) % std::f32::consts::TAU;
    }
}

impl Renderable for MeshDraw {
    fn render(&mut self, renderer: &mut Renderer) -> Result<(), RenderError> {
        if !self.visible {
            return Ok(());
        }
        for buffer in self.mesh.buffers_mut() {
            renderer.upload(buffer)?;
        }
        if let Some(texture) = self.material.as_mut().and_then(|m| m.texture.as_mut()) {
            renderer.upload(texture)?;
        }

        let index = renderer.allocate_object_index();
        renderer.update_model_constants(&self.world_matrix(), index)?;

        let bound = match &self.material {
            None => {
                renderer.update_material_constants(LinearRgba::GRAY, index, 0.0)?;
                renderer.bind_for_mesh_rendering(index)?
            }
            Some(material) => match material.shading() {
                ShadingModel::Emissive => {
                    renderer.update_material_constants(
                        material.base_color(),
                        index,
                        material.emissive_intensity,
                    )?;
                    renderer.bind_for_emissive_mesh_rendering(index)?
                }
                ShadingModel::Textured | ShadingModel::Flat => {
                    renderer.update_material_constants(material.base_color(), index, 0.0)?;
                    match &material.texture {
                        Some(texture) if texture.is_bindable() => {
                            renderer.bind_for_textured_mesh_rendering(index, texture)?
                        }
                        _ => renderer.bind_for_mesh_rendering(index)?,
                    }
                }
            },
        };
        if bound {
            renderer.draw_indexed(&self.mesh)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vertex_layout_matches_the_input_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        let offsets: Vec<u32> = Vertex::input_layout().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
    }

    #[test]
    fn emitters_are_recognized_by_name() {
        assert!(Material::new("Sun Light").is_emissive());
        assert!(Material::new("EmissiveRed").is_emissive());
        assert!(!Material::new("Brick").is_emissive());
        assert_eq!(Material::new("Key Light").shading(), ShadingModel::Emissive);
        assert_eq!(Material::new("Brick").shading(), ShadingModel::Flat);
    }

    #[test]
    fn missing_color_is_white() {
        assert_eq!(Material::new("Plain").base_color(), LinearRgba::WHITE);
        let red = LinearRgba::rgb(1.0, 0.0, 0.0);
        assert_eq!(Material::new("Red").with_color(red).base_color(), red);
    }

    #[test]
    fn spin_rotates_the_world_matrix() {
        let device = ember_infra::SoftInstance::new()
            .create_soft_device(1, &DeviceOptions::default())
            .unwrap();
        let triangle = [Vertex::default(); 3];
        let mesh = Mesh::new(device.as_ref(), "Triangle", &triangle, &[0, 1, 2]).unwrap();
        let mut draw = MeshDraw::new(mesh, None, Mat4::IDENTITY).with_spin(std::f32::consts::PI);

        draw.update(0.5);

        assert_relative_eq!(
            draw.world_matrix(),
            Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2),
            epsilon = 1e-5
        );
        assert_eq!(draw.mesh.index_count(), 3);
        assert!(draw.mesh.needs_upload());
    }
}
