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

//! Defines the `LinearRgba` color type.

use crate::math::vector::Vec4;
use serde::{Deserialize, Serialize};

/// A color in **linear RGBA** space with `f32` components.
///
/// Used for clear colors, material colors and light colors. `#[repr(C)]` keeps
/// the layout identical to a `float4` in a constant buffer.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LinearRgba {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Opaque magenta, the "missing texture" color.
    pub const MAGENTA: Self = Self::rgb(1.0, 0.0, 1.0);
    /// Neutral gray used for meshes without a material.
    pub const GRAY: Self = Self::rgb(0.7, 0.7, 0.7);

    /// Creates a color with explicit alpha.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color.
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Components as `[r, g, b, a]`.
    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Converts to a [`Vec4`].
    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    /// Quantizes to 8-bit UNORM channels, clamping out-of-range values.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Builds a color from 8-bit UNORM channels.
    pub fn from_rgba8(bytes: [u8; 4]) -> Self {
        let f = |c: u8| c as f32 / 255.0;
        Self::new(f(bytes[0]), f(bytes[1]), f(bytes[2]), f(bytes[3]))
    }
}

impl Default for LinearRgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for LinearRgba {
    fn from(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_quantization_clamps_and_rounds() {
        assert_eq!(LinearRgba::new(1.5, -0.2, 0.5, 1.0).to_rgba8(), [255, 0, 128, 255]);
        assert_eq!(LinearRgba::from_rgba8([255, 0, 255, 255]), LinearRgba::MAGENTA);
    }
}
