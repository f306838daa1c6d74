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

//! Window abstraction consumed by the renderer.

/// A trait that abstracts the surface the renderer presents to.
///
/// Any windowing backend can implement it. Headless surfaces are used for
/// off-screen rendering and tests.
pub trait RenderSurface: Send + Sync {
    /// Returns the physical dimensions (width, height) of the drawable area.
    fn inner_size(&self) -> (u32, u32);

    /// Returns the scale factor of the surface.
    fn scale_factor(&self) -> f64 {
        1.0
    }

    /// Returns the unique identifier for the surface.
    fn id(&self) -> u64;
}
