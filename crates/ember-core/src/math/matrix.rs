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

//! Defines the `Mat4` type used for world, view and projection transforms.

use super::{Vec3, Vec4, EPSILON};
use approx::{AbsDiffEq, RelativeEq};
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// Uses left-handed conventions with a `[0, 1]` depth range, which is what the
/// explicit graphics API expects from projection matrices.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns a row of the matrix.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Returns the element at `row`, `col`.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.cols[col].get(row)
    }

    /// A translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = v.extend(1.0);
        m
    }

    /// A (possibly non-uniform) scale matrix.
    #[inline]
    pub fn from_scale(s: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, s.z, 0.0),
            Vec4::W,
        )
    }

    /// A rotation around the Y axis.
    #[inline]
    pub fn from_rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(c, 0.0, -s, 0.0),
            Vec4::Y,
            Vec4::new(s, 0.0, c, 0.0),
            Vec4::W,
        )
    }

    /// A rotation around the X axis.
    #[inline]
    pub fn from_rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::X,
            Vec4::new(0.0, c, s, 0.0),
            Vec4::new(0.0, -s, c, 0.0),
            Vec4::W,
        )
    }

    /// A left-handed perspective projection with a `[0, 1]` depth range.
    ///
    /// # Arguments
    ///
    /// * `fov_y`: Vertical field of view in radians.
    /// * `aspect`: Width divided by height.
    /// * `z_near`, `z_far`: Positive clip distances with `z_far > z_near`.
    pub fn perspective_lh(fov_y: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        debug_assert!(z_near > 0.0 && z_far > z_near);
        let h = 1.0 / (fov_y * 0.5).tan();
        let w = h / aspect;
        let range = z_far / (z_far - z_near);
        Self::from_cols(
            Vec4::new(w, 0.0, 0.0, 0.0),
            Vec4::new(0.0, h, 0.0, 0.0),
            Vec4::new(0.0, 0.0, range, 1.0),
            Vec4::new(0.0, 0.0, -range * z_near, 0.0),
        )
    }

    /// A left-handed view matrix looking from `eye` towards `target`.
    ///
    /// Returns `None` when `eye` and `target` coincide or `up` is parallel to the
    /// view direction.
    pub fn look_at_lh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let forward = target - eye;
        if forward.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let f = forward.normalize();
        let r = up.cross(f);
        if r.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let r = r.normalize();
        let u = f.cross(r);

        Some(Self::from_cols(
            Vec4::new(r.x, u.x, f.x, 0.0),
            Vec4::new(r.y, u.y, f.y, 0.0),
            Vec4::new(r.z, u.z, f.z, 0.0),
            Vec4::new(-r.dot(eye), -u.dot(eye), -f.dot(eye), 1.0),
        ))
    }

    /// Rows and columns swapped.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2), self.row(3))
    }

    /// The determinant, expanded along the first column.
    pub fn determinant(&self) -> f32 {
        (0..4)
            .map(|row| self.at(row, 0) * self.cofactor(row, 0))
            .sum()
    }

    /// The inverse matrix, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        // inverse = adjugate / det, and the adjugate is the transposed cofactor matrix.
        let mut cols = [Vec4::ZERO; 4];
        for (col, out) in cols.iter_mut().enumerate() {
            *out = Vec4::new(
                self.cofactor(col, 0) * inv_det,
                self.cofactor(col, 1) * inv_det,
                self.cofactor(col, 2) * inv_det,
                self.cofactor(col, 3) * inv_det,
            );
        }
        Some(Self { cols })
    }

    /// The matrix used to transform normals: `transpose(inverse(self))`.
    ///
    /// Falls back to the identity for singular matrices so a degenerate scale
    /// never produces NaNs on the GPU.
    pub fn normal_matrix(&self) -> Self {
        self.inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(Self::IDENTITY)
    }

    /// Column arrays, ready to be copied into a constant buffer.
    #[inline]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        [
            self.cols[0].to_array(),
            self.cols[1].to_array(),
            self.cols[2].to_array(),
            self.cols[3].to_array(),
        ]
    }

    fn cofactor(&self, row: usize, col: usize) -> f32 {
        let mut minor = [0.0f32; 9];
        let mut i = 0;
        for c in (0..4).filter(|&c| c != col) {
            for r in (0..4).filter(|&r| r != row) {
                minor[i] = self.at(r, c);
                i += 1;
            }
        }
        // 3x3 minor stored column-major.
        let det3 = minor[0] * (minor[4] * minor[8] - minor[7] * minor[5])
            - minor[3] * (minor[1] * minor[8] - minor[7] * minor[2])
            + minor[6] * (minor[1] * minor[5] - minor[4] * minor[2]);
        if (row + col) % 2 == 0 {
            det3
        } else {
            -det3
        }
    }
}

impl Default for Mat4 {
    /// Returns the identity.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

impl AbsDiffEq for Mat4 {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.cols
            .iter()
            .zip(other.cols.iter())
            .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

impl RelativeEq for Mat4 {
    fn default_max_relative() -> f32 {
        f32::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.cols
            .iter()
            .zip(other.cols.iter())
            .all(|(a, b)| a.relative_eq(b, epsilon, max_relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_PI_4;
    use approx::assert_relative_eq;

    fn sample_transform() -> Mat4 {
        Mat4::from_translation(Vec3::new(1.0, -2.0, 3.0))
            * Mat4::from_rotation_y(FRAC_PI_4)
            * Mat4::from_scale(Vec3::new(2.0, 0.5, 3.0))
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let m = sample_transform();
        let inv = m.inverse().expect("transform should be invertible");
        assert_relative_eq!(m * inv, Mat4::IDENTITY, epsilon = 1e-4);
        assert_relative_eq!(inv * m, Mat4::IDENTITY, epsilon = 1e-4);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let flat = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(flat.inverse().is_none());
        assert_eq!(flat.normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn normal_matrix_differs_from_model_under_non_uniform_scale() {
        let m = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = m.normal_matrix();
        assert_relative_eq!(n.at(0, 0), 0.5);
        assert_ne!(n, m);
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let m = sample_transform();
        let t = m.transpose();
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(m.at(r, c), t.at(c, r));
            }
        }
    }

    #[test]
    fn look_at_rejects_degenerate_input() {
        assert!(Mat4::look_at_lh(Vec3::ZERO, Vec3::ZERO, Vec3::Y).is_none());
        assert!(Mat4::look_at_lh(Vec3::ZERO, Vec3::Y, Vec3::Y).is_none());
    }

    #[test]
    fn look_at_moves_target_onto_positive_z() {
        let eye = Vec3::new(0.0, 0.0, -5.0);
        let view = Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::Y).unwrap();
        let p = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.truncate(), Vec3::new(0.0, 0.0, 5.0), epsilon = 1e-5);
    }
}
