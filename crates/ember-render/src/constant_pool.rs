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

//! The per-object constant pool.
//!
//! One persistently mapped upload buffer holds the constants of every frame in
//! flight. Each frame slot owns a disjoint region:
//!
//! ```text
//! | model 0..N | material 0..N | view | light |   (frame 0)
//! | model 0..N | material 0..N | view | light |   (frame 1)
//! ```
//!
//! Every entry is one 256-byte constant slot. A region is only rewritten after
//! the fence of the frame that last read it completed, which the frame loop
//! guarantees before calling [`ConstantPool::begin_frame`].

use crate::constants::{LightConstants, MaterialConstants, ModelConstants, ViewConstants};
use ember_core::math::{LinearRgba, Mat4};
use ember_core::renderer::*;

const SLOT_SIZE: u64 = CONSTANT_BUFFER_ALIGNMENT;

/// Round-robin constant slots for up to `max_objects` objects per frame.
#[derive(Debug)]
pub struct ConstantPool {
    buffer: ResourceId,
    base_address: GpuVirtualAddress,
    max_objects: u32,
    frame_count: u32,
    frame: u32,
    cursor: u32,
    allocated: u32,
    overflow_count: u64,
    view: ViewConstants,
    light: LightConstants,
}

impl ConstantPool {
    /// Creates the pool for `frame_count` frames in flight.
    pub fn new(
        device: &dyn GraphicsDevice,
        max_objects: u32,
        frame_count: u32,
    ) -> Result<Self, ResourceError> {
        if max_objects == 0 || frame_count == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "the constant pool needs at least one object and one frame".to_string(),
            ));
        }
        let size = Self::frame_stride(max_objects) * frame_count as u64;
        let buffer = device.create_resource(&ResourceDescriptor::buffer(
            "Constant Pool",
            size,
            HeapKind::Upload,
            ResourceState::GenericRead,
        ))?;
        let base_address = match device.gpu_virtual_address(buffer) {
            Ok(address) => address,
            Err(err) => {
                let _ = device.destroy_resource(buffer);
                return Err(err);
            }
        };
        log::debug!(
            "Constant pool created: {max_objects} objects x {frame_count} frames ({} KiB).",
            size / 1024
        );
        let mut pool = Self {
            buffer,
            base_address,
            max_objects,
            frame_count,
            frame: 0,
            cursor: 0,
            allocated: 0,
            overflow_count: 0,
            view: ViewConstants::default(),
            light: LightConstants::default(),
        };
        for frame in 0..frame_count {
            pool.frame = frame;
            pool.write_shared(device)?;
        }
        pool.frame = 0;
        Ok(pool)
    }

    fn frame_stride(max_objects: u32) -> u64 {
        (2 * max_objects as u64 + 2) * SLOT_SIZE
    }

    fn frame_base(&self) -> u64 {
        self.frame as u64 * Self::frame_stride(self.max_objects)
    }

    fn model_offset(&self, index: u32) -> u64 {
        self.frame_base() + index as u64 * SLOT_SIZE
    }

    fn material_offset(&self, index: u32) -> u64 {
        self.frame_base() + (self.max_objects + index) as u64 * SLOT_SIZE
    }

    fn view_offset(&self) -> u64 {
        self.frame_base() + 2 * self.max_objects as u64 * SLOT_SIZE
    }

    fn light_offset(&self) -> u64 {
        self.view_offset() + SLOT_SIZE
    }

    fn check_index(&self, index: u32) -> Result<(), ResourceError> {
        debug_assert!(
            index < self.max_objects,
            "object index {index} out of range (max {})",
            self.max_objects
        );
        if index < self.max_objects {
            Ok(())
        } else {
            Err(ResourceError::OutOfBounds)
        }
    }

    fn write_shared(&self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        device.write_resource(self.buffer, self.view_offset(), bytemuck::bytes_of(&self.view))?;
        device.write_resource(self.buffer, self.light_offset(), bytemuck::bytes_of(&self.light))
    }

    /// Switches to the region of frame slot `frame`, resets the cursor, and
    /// carries the current view and light constants over.
    ///
    /// The GPU must be done with the previous use of `frame`.
    pub fn begin_frame(
        &mut self,
        device: &dyn GraphicsDevice,
        frame: u32,
    ) -> Result<(), ResourceError> {
        if frame >= self.frame_count {
            return Err(ResourceError::OutOfBounds);
        }
        self.frame = frame;
        self.reset_object_index();
        self.write_shared(device)
    }

    /// Returns the next object slot, wrapping after `max_objects`.
    ///
    /// Allocations past `max_objects` in one frame reuse slots of the same
    /// frame; they are counted in [`ConstantPool::overflow_count`].
    pub fn allocate_object_index(&mut self) -> u32 {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.max_objects;
        self.allocated += 1;
        if self.allocated > self.max_objects {
            if self.allocated == self.max_objects + 1 {
                log::warn!(
                    "More than {} objects in one frame, constant slots are being reused.",
                    self.max_objects
                );
            }
            self.overflow_count += 1;
        }
        index
    }

    /// Restarts allocation at slot 0.
    pub fn reset_object_index(&mut self) {
        self.cursor = 0;
        self.allocated = 0;
    }

    /// Writes the model and normal matrices of object `index`.
    pub fn update_model_constants(
        &self,
        device: &dyn GraphicsDevice,
        model: &Mat4,
        index: u32,
    ) -> Result<(), ResourceError> {
        self.check_index(index)?;
        let constants = ModelConstants::new(model);
        device.write_resource(self.buffer, self.model_offset(index), bytemuck::bytes_of(&constants))
    }

    /// Writes the material color of object `index`.
    pub fn update_material_constants(
        &self,
        device: &dyn GraphicsDevice,
        color: LinearRgba,
        index: u32,
        emissive_intensity: f32,
    ) -> Result<(), ResourceError> {
        self.check_index(index)?;
        let constants = MaterialConstants::new(color, emissive_intensity);
        device.write_resource(
            self.buffer,
            self.material_offset(index),
            bytemuck::bytes_of(&constants),
        )
    }

    /// Writes the camera constants of the current frame and keeps them for the next ones.
    pub fn update_view_constants(
        &mut self,
        device: &dyn GraphicsDevice,
        view: ViewConstants,
    ) -> Result<(), ResourceError> {
        self.view = view;
        device.write_resource(self.buffer, self.view_offset(), bytemuck::bytes_of(&self.view))
    }

    /// Writes the light constants of the current frame and keeps them for the next ones.
    pub fn update_light_constants(
        &mut self,
        device: &dyn GraphicsDevice,
        light: LightConstants,
    ) -> Result<(), ResourceError> {
        self.light = light;
        device.write_resource(self.buffer, self.light_offset(), bytemuck::bytes_of(&self.light))
    }

    /// Keeps `view` for the next [`ConstantPool::begin_frame`] without writing it.
    pub fn set_view_constants(&mut self, view: ViewConstants) {
        self.view = view;
    }

    /// Keeps `light` for the next [`ConstantPool::begin_frame`] without writing it.
    pub fn set_light_constants(&mut self, light: LightConstants) {
        self.light = light;
    }

    /// Address of the model constants of object `index`.
    pub fn model_address(&self, index: u32) -> GpuVirtualAddress {
        self.base_address.offset(self.model_offset(index))
    }

    /// Address of the material constants of object `index`.
    pub fn material_address(&self, index: u32) -> GpuVirtualAddress {
        self.base_address.offset(self.material_offset(index))
    }

    /// Address of the view constants of the current frame.
    pub fn view_address(&self) -> GpuVirtualAddress {
        self.base_address.offset(self.view_offset())
    }

    /// Address of the light constants of the current frame.
    pub fn light_address(&self) -> GpuVirtualAddress {
        self.base_address.offset(self.light_offset())
    }

    /// Objects per frame.
    pub fn max_objects(&self) -> u32 {
        self.max_objects
    }

    /// Object slots handed out in the current frame.
    pub fn allocated_this_frame(&self) -> u32 {
        self.allocated
    }

    /// Total number of allocations that had to reuse a slot.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// The backing buffer.
    pub fn buffer(&self) -> ResourceId {
        self.buffer
    }

    /// Destroys the backing buffer. The GPU must be idle and the pool unused afterwards.
    pub fn destroy(&self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        device.destroy_resource(self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::Vec3;
    use ember_infra::{SoftDevice, SoftInstance};
    use std::sync::Arc;

    fn pool(max_objects: u32, frames: u32) -> (Arc<SoftDevice>, ConstantPool) {
        let device = SoftInstance::new()
            .create_soft_device(1, &DeviceOptions::default())
            .unwrap();
        let pool = ConstantPool::new(device.as_ref(), max_objects, frames).unwrap();
        (device, pool)
    }

    #[test]
    fn indices_wrap_round_robin() {
        let (_device, mut pool) = pool(4, 2);
        let indices: Vec<u32> = (0..6).map(|_| pool.allocate_object_index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 0, 1]);
        assert_eq!(pool.overflow_count(), 2);
    }

    #[test]
    fn reset_restarts_at_zero() {
        let (_device, mut pool) = pool(4, 2);
        pool.allocate_object_index();
        pool.allocate_object_index();
        pool.reset_object_index();
        assert_eq!(pool.allocate_object_index(), 0);
    }

    #[test]
    fn frame_regions_do_not_overlap() {
        let (device, mut pool) = pool(4, 2);
        let frame0 = pool.model_address(3);
        let light0 = pool.light_address();
        pool.begin_frame(device.as_ref(), 1).unwrap();
        let frame1 = pool.model_address(0);
        assert!(frame0.0 < light0.0);
        assert_eq!(frame1.0, light0.0 + SLOT_SIZE);
        assert_eq!(pool.material_address(0).0 - frame1.0, 4 * SLOT_SIZE);
    }

    #[test]
    fn model_constants_land_in_their_slot() {
        let (device, pool) = pool(4, 2);
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        pool.update_model_constants(device.as_ref(), &model, 2).unwrap();

        let bytes = device.capture_resource(pool.buffer()).unwrap();
        let start = (2 * SLOT_SIZE) as usize;
        let written: ModelConstants =
            bytemuck::pod_read_unaligned(&bytes[start..start + std::mem::size_of::<ModelConstants>()]);
        assert_eq!(written, ModelConstants::new(&model));
    }

    #[test]
    fn kept_view_constants_are_written_by_the_next_frame() {
        let (device, mut pool) = pool(2, 2);
        let view = ViewConstants::new(&Mat4::IDENTITY, &Mat4::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
        let before = device.capture_resource(pool.buffer()).unwrap();

        pool.set_view_constants(view);
        let untouched = device.capture_resource(pool.buffer()).unwrap();
        pool.begin_frame(device.as_ref(), 1).unwrap();

        assert_eq!(before, untouched);
        let bytes = device.capture_resource(pool.buffer()).unwrap();
        let start = pool.view_offset() as usize;
        let written: ViewConstants =
            bytemuck::pod_read_unaligned(&bytes[start..start + std::mem::size_of::<ViewConstants>()]);
        assert_eq!(written, view);
    }

    #[test]
    fn view_constants_follow_the_frame() {
        let (device, mut pool) = pool(2, 2);
        let view = ViewConstants::new(
            &Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            &Mat4::IDENTITY,
            Vec3::new(0.0, 0.0, -5.0),
        );
        pool.update_view_constants(device.as_ref(), view).unwrap();
        pool.begin_frame(device.as_ref(), 1).unwrap();

        let bytes = device.capture_resource(pool.buffer()).unwrap();
        let start = pool.view_offset() as usize;
        let written: ViewConstants =
            bytemuck::pod_read_unaligned(&bytes[start..start + std::mem::size_of::<ViewConstants>()]);
        assert_eq!(written, view);
    }
}
