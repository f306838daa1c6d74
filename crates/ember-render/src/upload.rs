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

//! Staged uploads of buffers and textures.
//!
//! Data destined for the default heap is first written into an upload-heap
//! buffer, then copied on the GPU by a command list. The upload buffer must
//! outlive that copy, so it is handed to an [`UploadRetirementQueue`] together
//! with the fence value of the submission that reads it.

use crate::descriptors::DescriptorIndex;
use ember_core::math::LinearRgba;
use ember_core::renderer::*;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// An error raised while creating or uploading a GPU resource.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The device refused to create a resource.
    #[error("failed to create upload resource: {0}")]
    Creation(#[from] ResourceError),
    /// Copies can only be recorded into an open command list.
    #[error("cannot record the upload of '{label}': the command list is closed")]
    NotRecording {
        /// The resource being uploaded.
        label: String,
    },
    /// The pixel data does not match the declared texture size.
    #[error("texture data is {actual} bytes, {width}x{height} {format:?} needs {expected}")]
    SizeMismatch {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Declared format.
        format: TextureFormat,
        /// Bytes the declaration requires.
        expected: usize,
        /// Bytes provided.
        actual: usize,
    },
    /// An image file could not be read.
    #[error("failed to read texture '{path}': {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// An image could not be decoded.
    #[error("failed to decode texture '{label}': {source}")]
    Decode {
        /// File name or label of the encoded image.
        label: String,
        /// The decoder error.
        #[source]
        source: image::ImageError,
    },
}

impl From<UploadError> for RenderError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Creation(err) => RenderError::ResourceError(err),
            UploadError::NotRecording { .. } => RenderError::InvalidState(err.to_string()),
            other => RenderError::ResourceError(ResourceError::InvalidDescriptor(other.to_string())),
        }
    }
}

/// Where a GPU resource stands in the staged upload protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    /// The resource exists but holds no data.
    #[default]
    Created,
    /// Data sits in an upload buffer, waiting for a GPU copy to be recorded.
    Staged,
    /// The copy was submitted with a frame that signals `fence_value`.
    Uploading {
        /// Fence value of the submission that performs the copy.
        fence_value: FenceValue,
    },
    /// The data is resident and the upload buffer is gone.
    Ready,
}

impl UploadState {
    /// Whether a copy still has to be recorded.
    #[inline]
    pub fn needs_upload(&self) -> bool {
        matches!(self, UploadState::Staged)
    }

    /// Whether commands recorded from now on observe the uploaded data.
    #[inline]
    pub fn is_resident(&self) -> bool {
        matches!(self, UploadState::Uploading { .. } | UploadState::Ready)
    }

    /// Moves `Uploading` to `Ready` once `completed` reached its fence value.
    pub fn advance(&mut self, completed: FenceValue) {
        if let UploadState::Uploading { fence_value } = *self {
            if completed != FENCE_VALUE_DEVICE_REMOVED && completed >= fence_value {
                *self = UploadState::Ready;
            }
        }
    }
}

/// A GPU resource whose contents travel through an upload buffer.
pub trait Uploadable {
    /// Debug name of the resource.
    fn label(&self) -> &str;

    /// Current upload state.
    fn upload_state(&self) -> UploadState;

    /// Whether [`Uploadable::record_upload`] has work to do.
    fn needs_upload(&self) -> bool {
        self.upload_state().needs_upload()
    }

    /// Records the copy out of the staging buffer into `list`.
    ///
    /// `fence_value` is the value the submission of `list` will signal. Returns
    /// the staging buffer, which must stay alive until that value completes.
    /// Returns `Ok(None)` when nothing is staged.
    fn record_upload(
        &mut self,
        list: &mut CommandList,
        fence_value: FenceValue,
    ) -> Result<Option<ResourceId>, UploadError>;

    /// Observes the completed fence value.
    fn mark_completed(&mut self, completed: FenceValue);
}

/// Creates a buffer and, for default-heap buffers with initial data, the
/// upload buffer holding that data.
///
/// Upload and readback heap buffers are written directly. A default-heap
/// destination that receives data is created in `Common`, ready for
/// [`copy_upload_to_default_buffer`]; otherwise it starts in `initial_state`.
/// On failure no resource is left behind.
pub fn create_buffer(
    device: &dyn GraphicsDevice,
    label: &str,
    size: u64,
    heap: HeapKind,
    initial_state: ResourceState,
    data: Option<&[u8]>,
) -> Result<(ResourceId, Option<ResourceId>), UploadError> {
    let staged = heap == HeapKind::Default && data.is_some();
    let state = if staged {
        ResourceState::Common
    } else {
        initial_state
    };
    let resource = device.create_resource(&ResourceDescriptor::buffer(label, size, heap, state))?;

    let Some(data) = data else {
        return Ok((resource, None));
    };
    let result = if staged {
        stage_bytes(device, &format!("{label} (upload)"), size, data).map(Some)
    } else {
        device
            .write_resource(resource, 0, data)
            .map(|()| None)
            .map_err(UploadError::from)
    };
    match result {
        Ok(upload) => Ok((resource, upload)),
        Err(err) => {
            let _ = device.destroy_resource(resource);
            Err(err)
        }
    }
}

fn stage_bytes(
    device: &dyn GraphicsDevice,
    label: &str,
    size: u64,
    data: &[u8],
) -> Result<ResourceId, UploadError> {
    let upload = device.create_resource(&ResourceDescriptor::buffer(
        label,
        size,
        HeapKind::Upload,
        ResourceState::GenericRead,
    ))?;
    if let Err(err) = device.write_resource(upload, 0, data) {
        let _ = device.destroy_resource(upload);
        return Err(err.into());
    }
    Ok(upload)
}

/// Records `Common -> CopyDest`, the buffer copy, and `CopyDest -> final_state`.
pub fn copy_upload_to_default_buffer(
    list: &mut CommandList,
    dest: ResourceId,
    upload: ResourceId,
    size: u64,
    final_state: ResourceState,
) {
    list.resource_barrier(dest, ResourceState::Common, ResourceState::CopyDest);
    list.record(Command::CopyBufferRegion {
        dst: dest,
        dst_offset: 0,
        src: upload,
        src_offset: 0,
        size,
    });
    list.resource_barrier(dest, ResourceState::CopyDest, final_state);
}

/// Records `Common -> CopyDest`, the pitched texture copy, and
/// `CopyDest -> final_state`.
pub fn copy_upload_to_texture(
    list: &mut CommandList,
    dest: ResourceId,
    upload: ResourceId,
    footprint: TextureFootprint,
    final_state: ResourceState,
) {
    list.resource_barrier(dest, ResourceState::Common, ResourceState::CopyDest);
    list.record(Command::CopyBufferToTexture {
        dst: dest,
        src: upload,
        footprint,
    });
    list.resource_barrier(dest, ResourceState::CopyDest, final_state);
}

/// A buffer created through the staged upload protocol.
#[derive(Debug)]
pub struct GpuBuffer {
    label: String,
    resource: ResourceId,
    upload: Option<ResourceId>,
    size: u64,
    heap: HeapKind,
    final_state: ResourceState,
    address: GpuVirtualAddress,
    state: UploadState,
}

impl GpuBuffer {
    /// Creates the buffer. Default-heap buffers with `data` come out `Staged`;
    /// CPU-visible buffers with `data` are written directly and come out `Ready`.
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        size: u64,
        heap: HeapKind,
        final_state: ResourceState,
        data: Option<&[u8]>,
    ) -> Result<Self, UploadError> {
        let (resource, upload) = create_buffer(device, label, size, heap, final_state, data)?;
        let address = match device.gpu_virtual_address(resource) {
            Ok(address) => address,
            Err(err) => {
                let _ = device.destroy_resource(resource);
                if let Some(upload) = upload {
                    let _ = device.destroy_resource(upload);
                }
                return Err(err.into());
            }
        };
        let state = match (upload, heap) {
            (Some(_), _) => UploadState::Staged,
            (None, HeapKind::Default) => UploadState::Created,
            (None, _) => UploadState::Ready,
        };
        Ok(Self {
            label: label.to_string(),
            resource,
            upload,
            size,
            heap,
            final_state,
            address,
            state,
        })
    }

    /// Overwrites the contents of a CPU-writable buffer.
    pub fn write(&self, device: &dyn GraphicsDevice, offset: u64, data: &[u8]) -> Result<(), UploadError> {
        device.write_resource(self.resource, offset, data)?;
        Ok(())
    }

    /// The buffer.
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Start address of the buffer.
    pub fn address(&self) -> GpuVirtualAddress {
        self.address
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The heap the buffer lives in.
    pub fn heap(&self) -> HeapKind {
        self.heap
    }

    /// The state the buffer is left in after its upload.
    pub fn final_state(&self) -> ResourceState {
        self.final_state
    }

    /// The staging buffer, while the copy has not been recorded.
    pub fn staging_buffer(&self) -> Option<ResourceId> {
        self.upload
    }

    /// Destroys the buffer and its staging buffer.
    ///
    /// The caller guarantees no submitted work still reads them.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        if let Some(upload) = self.upload {
            device.destroy_resource(upload)?;
        }
        device.destroy_resource(self.resource)
    }
}

impl Uploadable for GpuBuffer {
    fn label(&self) -> &str {
        &self.label
    }

    fn upload_state(&self) -> UploadState {
        self.state
    }

    fn record_upload(
        &mut self,
        list: &mut CommandList,
        fence_value: FenceValue,
    ) -> Result<Option<ResourceId>, UploadError> {
        if !self.state.needs_upload() {
            return Ok(None);
        }
        if !list.is_recording() {
            return Err(UploadError::NotRecording {
                label: self.label.clone(),
            });
        }
        let Some(upload) = self.upload.take() else {
            return Ok(None);
        };
        copy_upload_to_default_buffer(list, self.resource, upload, self.size, self.final_state);
        self.state = UploadState::Uploading { fence_value };
        log::trace!("Recorded upload of buffer '{}' ({} bytes).", self.label, self.size);
        Ok(Some(upload))
    }

    fn mark_completed(&mut self, completed: FenceValue) {
        self.state.advance(completed);
    }
}

/// A sampled 2D texture created through the staged upload protocol.
#[derive(Debug)]
pub struct GpuTexture {
    label: String,
    resource: ResourceId,
    upload: Option<ResourceId>,
    footprint: TextureFootprint,
    srv: DescriptorIndex,
    state: UploadState,
}

impl GpuTexture {
    /// Creates the texture in `Common` and stages `data` in a pitched upload buffer.
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        data: &TextureData,
    ) -> Result<Self, UploadError> {
        data.validate()?;
        let resource = device.create_resource(&ResourceDescriptor::texture_2d(
            label,
            data.width,
            data.height,
            data.format,
            ResourceState::Common,
        ))?;
        let footprint = TextureFootprint::for_texture(data.width, data.height, data.format);
        let pitched = data.pitched(&footprint);
        let upload = match stage_bytes(
            device,
            &format!("{label} (upload)"),
            footprint.total_size(),
            &pitched,
        ) {
            Ok(upload) => upload,
            Err(err) => {
                let _ = device.destroy_resource(resource);
                return Err(err);
            }
        };
        Ok(Self {
            label: label.to_string(),
            resource,
            upload: Some(upload),
            footprint,
            srv: DescriptorIndex::INVALID,
            state: UploadState::Staged,
        })
    }

    /// Attaches the shader resource view the texture is sampled through.
    pub fn set_srv(&mut self, srv: DescriptorIndex) {
        self.srv = srv;
    }

    /// The shader resource view, [`DescriptorIndex::INVALID`] if none could be allocated.
    pub fn srv(&self) -> DescriptorIndex {
        self.srv
    }

    /// Whether a draw recorded now can sample the texture.
    pub fn is_bindable(&self) -> bool {
        self.state.is_resident() && self.srv.is_valid()
    }

    /// The texture.
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Width and height in texels.
    pub fn size(&self) -> (u32, u32) {
        (self.footprint.width, self.footprint.height)
    }

    /// Texel format.
    pub fn format(&self) -> TextureFormat {
        self.footprint.format
    }

    /// Layout of the texels inside the staging buffer.
    pub fn footprint(&self) -> TextureFootprint {
        self.footprint
    }

    /// Destroys the texture and its staging buffer.
    ///
    /// The caller guarantees no submitted work still reads them.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        if let Some(upload) = self.upload {
            device.destroy_resource(upload)?;
        }
        device.destroy_resource(self.resource)
    }
}

impl Uploadable for GpuTexture {
    fn label(&self) -> &str {
        &self.label
    }

    fn upload_state(&self) -> UploadState {
        self.state
    }

    fn record_upload(
        &mut self,
        list: &mut CommandList,
        fence_value: FenceValue,
    ) -> Result<Option<ResourceId>, UploadError> {
        if !self.state.needs_upload() {
            return Ok(None);
        }
        if !list.is_recording() {
            return Err(UploadError::NotRecording {
                label: self.label.clone(),
            });
        }
        let Some(upload) = self.upload.take() else {
            return Ok(None);
        };
        copy_upload_to_texture(
            list,
            self.resource,
            upload,
            self.footprint,
            ResourceState::PixelShaderResource,
        );
        self.state = UploadState::Uploading { fence_value };
        log::trace!(
            "Recorded upload of texture '{}' ({}x{}).",
            self.label,
            self.footprint.width,
            self.footprint.height
        );
        Ok(Some(upload))
    }

    fn mark_completed(&mut self, completed: FenceValue) {
        self.state.advance(completed);
    }
}

/// Upload buffers waiting for the GPU to finish reading them.
#[derive(Debug, Default)]
pub struct UploadRetirementQueue {
    pending: VecDeque<(FenceValue, ResourceId)>,
}

impl UploadRetirementQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `upload` for destruction once `fence_value` completes.
    pub fn retire(&mut self, upload: ResourceId, fence_value: FenceValue) {
        self.pending.push_back((fence_value, upload));
    }

    /// Destroys every buffer whose fence value is at or below `completed`.
    ///
    /// Returns how many were destroyed.
    pub fn collect(&mut self, device: &dyn GraphicsDevice, completed: FenceValue) -> usize {
        if completed == FENCE_VALUE_DEVICE_REMOVED {
            return 0;
        }
        let mut destroyed = 0;
        // Fence values are retired in submission order.
        while let Some(&(fence_value, upload)) = self.pending.front() {
            if fence_value > completed {
                break;
            }
            self.pending.pop_front();
            if let Err(err) = device.destroy_resource(upload) {
                log::warn!("Failed to release upload buffer {upload:?}: {err}");
            }
            destroyed += 1;
        }
        destroyed
    }

    /// Destroys everything. Only valid after a full GPU drain.
    pub fn drain_all(&mut self, device: &dyn GraphicsDevice) {
        for (_, upload) in self.pending.drain(..) {
            let _ = device.destroy_resource(upload);
        }
    }

    /// Number of buffers still waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Tightly packed texels of a 2D texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Rows of `width * bytes_per_pixel` bytes, top to bottom.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Wraps raw texels, checking their size.
    pub fn new(
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, UploadError> {
        let data = Self {
            width,
            height,
            format,
            pixels,
        };
        data.validate()?;
        Ok(data)
    }

    /// Checks that the texture is not empty and `pixels` holds exactly
    /// `width * height` texels.
    pub fn validate(&self) -> Result<(), UploadError> {
        let expected =
            self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize;
        if self.pixels.len() != expected || expected == 0 {
            return Err(UploadError::SizeMismatch {
                width: self.width,
                height: self.height,
                format: self.format,
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }

    /// A texture filled with one color.
    pub fn solid_color(width: u32, height: u32, color: LinearRgba) -> Self {
        let texel = color.to_rgba8();
        Self {
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            pixels: texel.repeat(width as usize * height as usize),
        }
    }

    /// A checkerboard of `cell`-sized squares alternating between two colors.
    pub fn checkerboard(width: u32, height: u32, cell: u32, a: LinearRgba, b: LinearRgba) -> Self {
        let cell = cell.max(1);
        let (a, b) = (a.to_rgba8(), b.to_rgba8());
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let texel = if (x / cell + y / cell) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&texel);
            }
        }
        Self {
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            pixels,
        }
    }

    /// The 1x1 magenta texture bound in place of a missing one.
    pub fn fallback() -> Self {
        Self::solid_color(1, 1, LinearRgba::MAGENTA)
    }

    /// Decodes an encoded image (PNG, JPEG, ...) into RGBA8.
    pub fn decode(label: &str, bytes: &[u8]) -> Result<Self, UploadError> {
        let image = image::load_from_memory(bytes).map_err(|source| UploadError::Decode {
            label: label.to_string(),
            source,
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, TextureFormat::Rgba8Unorm, rgba.into_raw())
    }

    /// Reads and decodes an image file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&path.display().to_string(), &bytes)
    }

    /// Like [`TextureData::from_file`], but falls back to the magenta texture.
    pub fn load_or_fallback(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|err| {
            log::warn!("{err}. Using the fallback texture.");
            Self::fallback()
        })
    }

    /// Lays the texels out with the row pitch of `footprint`.
    ///
    /// Rows beyond the footprint's height are ignored.
    pub fn pitched(&self, footprint: &TextureFootprint) -> Vec<u8> {
        let row = footprint.tight_row_size() as usize;
        let pitch = footprint.row_pitch as usize;
        let mut out = vec![0; footprint.total_size() as usize];
        if row == 0 {
            return out;
        }
        let rows = self.pixels.chunks_exact(row).take(footprint.height as usize);
        for (y, texels) in rows.enumerate() {
            let start = footprint.offset as usize + y * pitch;
            out[start..start + row].copy_from_slice(texels);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_staged_resources_need_an_upload() {
        assert!(!UploadState::Created.needs_upload());
        assert!(UploadState::Staged.needs_upload());
        assert!(!UploadState::Uploading { fence_value: 3 }.needs_upload());
        assert!(!UploadState::Ready.needs_upload());
    }

    #[test]
    fn uploading_becomes_ready_once_its_fence_completes() {
        let mut state = UploadState::Uploading { fence_value: 5 };
        state.advance(4);
        assert_eq!(state, UploadState::Uploading { fence_value: 5 });
        state.advance(FENCE_VALUE_DEVICE_REMOVED);
        assert_eq!(state, UploadState::Uploading { fence_value: 5 });
        state.advance(5);
        assert_eq!(state, UploadState::Ready);
    }

    #[test]
    fn buffer_copy_is_bracketed_by_barriers() {
        let mut list = CommandList::new("Upload");
        list.reset(CommandAllocatorId(0)).unwrap();
        copy_upload_to_default_buffer(
            &mut list,
            ResourceId(1),
            ResourceId(2),
            64,
            ResourceState::VertexAndConstantBuffer,
        );
        assert_eq!(
            list.commands(),
            &[
                Command::Barrier {
                    resource: ResourceId(1),
                    before: ResourceState::Common,
                    after: ResourceState::CopyDest,
                },
                Command::CopyBufferRegion {
                    dst: ResourceId(1),
                    dst_offset: 0,
                    src: ResourceId(2),
                    src_offset: 0,
                    size: 64,
                },
                Command::Barrier {
                    resource: ResourceId(1),
                    before: ResourceState::CopyDest,
                    after: ResourceState::VertexAndConstantBuffer,
                },
            ]
        );
    }

    #[test]
    fn texture_rows_are_padded_to_the_pitch() {
        let data = TextureData::checkerboard(3, 2, 1, LinearRgba::WHITE, LinearRgba::BLACK);
        let footprint = TextureFootprint::for_texture(3, 2, data.format);
        let pitched = data.pitched(&footprint);

        assert_eq!(pitched.len(), 512);
        assert_eq!(&pitched[0..12], &data.pixels[0..12]);
        assert!(pitched[12..256].iter().all(|&b| b == 0));
        assert_eq!(&pitched[256..268], &data.pixels[12..24]);
    }

    #[test]
    fn texture_data_size_is_checked() {
        let err = TextureData::new(2, 2, TextureFormat::Rgba8Unorm, vec![0; 15]).unwrap_err();
        assert!(matches!(err, UploadError::SizeMismatch { expected: 16, actual: 15, .. }));
    }

    #[test]
    fn textures_with_a_wrong_texel_count_are_rejected() {
        let device = ember_infra::SoftInstance::new()
            .create_soft_device(1, &DeviceOptions::default())
            .unwrap();
        let oversized = TextureData {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            pixels: vec![0; 8],
        };
        let empty = TextureData::solid_color(0, 0, LinearRgba::WHITE);

        let oversized = GpuTexture::new(device.as_ref(), "Oversized", &oversized);
        let empty = GpuTexture::new(device.as_ref(), "Empty", &empty);

        assert!(matches!(
            oversized,
            Err(UploadError::SizeMismatch { expected: 4, actual: 8, .. })
        ));
        assert!(matches!(empty, Err(UploadError::SizeMismatch { expected: 0, .. })));
        assert_eq!(device.live_resource_count(), 0, "Nothing is created for invalid data");
    }

    #[test]
    fn undecodable_bytes_fall_back_to_magenta() {
        assert!(TextureData::decode("broken.png", b"not an image").is_err());
        let fallback = TextureData::load_or_fallback("/nonexistent/texture.png");
        assert_eq!(fallback, TextureData::fallback());
        assert_eq!(fallback.pixels, vec![255, 0, 255, 255]);
    }
}
