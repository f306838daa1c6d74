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

//! CPU mirrors of the constant buffers read by the shaders.
//!
//! Each struct matches the HLSL `cbuffer` of the same register and is copied
//! into a 256-byte constant slot with `bytemuck`. Matrices are stored
//! transposed so the shaders can multiply row vectors.

use ember_core::math::{LinearRgba, Mat4, Vec3};

/// `b0`: the world transform of one object.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ModelConstants {
    /// Transposed world matrix.
    pub model: Mat4,
    /// Transposed inverse of the world matrix, for normals.
    pub normal: Mat4,
}

impl ModelConstants {
    /// Builds the constants of a world matrix.
    pub fn new(model: &Mat4) -> Self {
        Self {
            model: model.transpose(),
            normal: model.normal_matrix(),
        }
    }
}

/// `b1`: camera matrices shared by every object of a frame.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ViewConstants {
    /// Transposed view matrix.
    pub view: Mat4,
    /// Transposed projection matrix.
    pub projection: Mat4,
    /// Transposed `projection * view`.
    pub view_projection: Mat4,
    /// World-space camera position.
    pub camera_position: [f32; 3],
    /// Pads the position to a `float4`.
    pub padding: f32,
}

impl ViewConstants {
    /// Builds the constants of a camera.
    pub fn new(view: &Mat4, projection: &Mat4, camera_position: Vec3) -> Self {
        Self {
            view: view.transpose(),
            projection: projection.transpose(),
            view_projection: (*projection * *view).transpose(),
            camera_position: camera_position.to_array(),
            padding: 0.0,
        }
    }
}

impl Default for ViewConstants {
    fn default() -> Self {
        Self::new(&Mat4::IDENTITY, &Mat4::IDENTITY, Vec3::ZERO)
    }
}

/// `b2`: the directional light.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct LightConstants {
    /// Direction the light travels, normalized.
    pub direction: [f32; 3],
    /// Scalar intensity.
    pub intensity: f32,
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Pads the color to a `float4`.
    pub padding: f32,
}

impl LightConstants {
    /// Builds the constants of a directional light.
    pub fn new(direction: Vec3, color: LinearRgba, intensity: f32) -> Self {
        Self {
            direction: direction.normalize().to_array(),
            intensity,
            color: [color.r, color.g, color.b],
            padding: 0.0,
        }
    }
}

impl Default for LightConstants {
    fn default() -> Self {
        Self::new(Vec3::new(0.5, -1.0, 0.5), LinearRgba::WHITE, 1.0)
    }
}

/// `b3`: the surface parameters of one object.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct MaterialConstants {
    /// Linear RGB base color.
    pub color: [f32; 3],
    /// Multiplier of the emitted color. Zero for lit surfaces.
    pub emissive_intensity: f32,
}

impl MaterialConstants {
    /// Builds the constants of a material color.
    pub fn new(color: LinearRgba, emissive_intensity: f32) -> Self {
        Self {
            color: [color.r, color.g, color.b],
            emissive_intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ember_core::renderer::CONSTANT_BUFFER_ALIGNMENT;

    #[test]
    fn layouts_fit_one_constant_slot() {
        assert_eq!(std::mem::size_of::<ModelConstants>(), 128);
        assert_eq!(std::mem::size_of::<ViewConstants>(), 208);
        assert_eq!(std::mem::size_of::<LightConstants>(), 32);
        assert_eq!(std::mem::size_of::<MaterialConstants>(), 16);
        assert!(std::mem::size_of::<ViewConstants>() as u64 <= CONSTANT_BUFFER_ALIGNMENT);
    }

    #[test]
    fn model_constants_are_transposed() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let constants = ModelConstants::new(&model);
        assert_relative_eq!(constants.model, model.transpose());
        assert_relative_eq!(constants.model.at(3, 0), 1.0);
    }

    #[test]
    fn singular_models_get_an_identity_normal_matrix() {
        let constants = ModelConstants::new(&Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)));
        assert_relative_eq!(constants.normal, Mat4::IDENTITY);
    }

    #[test]
    fn light_direction_is_normalized() {
        let light = LightConstants::new(Vec3::new(0.0, -2.0, 0.0), LinearRgba::WHITE, 2.0);
        assert_relative_eq!(light.direction[1], -1.0);
        assert_relative_eq!(light.intensity, 2.0);
    }
}
