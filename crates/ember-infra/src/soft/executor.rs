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

//! Execution of recorded command lists on the GPU timeline.
//!
//! Commands run against CPU memory. Every command is validated the way a debug
//! layer would: barrier `before` states must match the tracked state, copies
//! must target `CopyDest` resources, and draws must only read resources that
//! reached their shader-readable state.

use super::gpu::{lock, resolve_address, DescriptorContent, GpuState, SoftResourceEntry};
use super::journal::JournalEvent;
use ember_core::math::LinearRgba;
use ember_core::renderer::*;
use std::collections::HashMap;

/// Pipeline and binding state accumulated while walking one command list.
#[derive(Debug, Default)]
struct BoundState {
    pipeline: Option<PipelineStateId>,
    root_signature: Option<RootSignatureId>,
    render_target: Option<ResourceId>,
    depth_target: Option<ResourceId>,
    vertex_buffer: Option<VertexBufferView>,
    index_buffer: Option<IndexBufferView>,
    constant_buffers: HashMap<u32, GpuVirtualAddress>,
    tables: HashMap<u32, GpuDescriptorHandle>,
    heaps: Vec<DescriptorHeapId>,
}

type ResourceTable = HashMap<ResourceId, SoftResourceEntry>;

impl GpuState {
    /// Executes one submitted command list.
    pub(crate) fn execute(&self, serial: u64, list: &str, commands: &[Command]) {
        let mut bound = BoundState::default();
        for command in commands {
            match command {
                Command::Barrier {
                    resource,
                    before,
                    after,
                } => self.transition(list, *resource, *before, *after),
                Command::CopyBufferRegion {
                    dst,
                    dst_offset,
                    src,
                    src_offset,
                    size,
                } => self.copy_buffer_region(list, *dst, *dst_offset, *src, *src_offset, *size),
                Command::CopyBufferToTexture {
                    dst,
                    src,
                    footprint,
                } => self.copy_buffer_to_texture(list, *dst, *src, footprint),
                Command::CopyTextureToBuffer {
                    dst,
                    src,
                    footprint,
                } => self.copy_texture_to_buffer(list, *dst, *src, footprint),
                Command::SetRenderTargets { rtv, dsv } => {
                    bound.render_target = match self.resolve_cpu_descriptor(*rtv) {
                        Some(DescriptorContent::RenderTarget(id)) => Some(id),
                        _ => {
                            self.report(format!("{list}: render target view {rtv:?} is empty"));
                            None
                        }
                    };
                    bound.depth_target = dsv.and_then(|dsv| {
                        match self.resolve_cpu_descriptor(dsv) {
                            Some(DescriptorContent::DepthStencil(id)) => Some(id),
                            _ => {
                                self.report(format!("{list}: depth stencil view {dsv:?} is empty"));
                                None
                            }
                        }
                    });
                }
                Command::ClearRenderTarget { rtv, color } => self.clear_render_target(list, *rtv, *color),
                Command::ClearDepthStencil { dsv, depth, .. } => {
                    self.clear_depth_stencil(list, *dsv, *depth)
                }
                Command::SetViewport(_) | Command::SetScissorRect(_) => {}
                Command::SetDescriptorHeaps(heaps) => bound.heaps = heaps.clone(),
                Command::SetPipelineState(pipeline) => {
                    let label = lock(&self.pipelines)
                        .get(pipeline)
                        .map(|entry| entry.label.clone());
                    match label {
                        Some(label) => {
                            bound.pipeline = Some(*pipeline);
                            self.record(JournalEvent::PipelineBound {
                                pipeline: *pipeline,
                                label,
                            });
                        }
                        None => self.report(format!("{list}: unknown pipeline {pipeline:?} bound")),
                    }
                }
                Command::SetGraphicsRootSignature(root_signature) => {
                    bound.root_signature = Some(*root_signature);
                    bound.constant_buffers.clear();
                    bound.tables.clear();
                }
                Command::SetGraphicsRootConstantBufferView { slot, address } => {
                    bound.constant_buffers.insert(*slot, *address);
                }
                Command::SetGraphicsRootDescriptorTable { slot, handle } => {
                    bound.tables.insert(*slot, *handle);
                }
                Command::SetPrimitiveTopology(_) => {}
                Command::SetVertexBuffer(view) => bound.vertex_buffer = Some(*view),
                Command::SetIndexBuffer(view) => bound.index_buffer = Some(*view),
                Command::DrawIndexedInstanced { index_count, .. } => {
                    let errors = self.validate_draw(&bound);
                    if errors.is_empty() {
                        if let Some(pipeline) = bound.pipeline {
                            self.record(JournalEvent::Draw {
                                pipeline,
                                index_count: *index_count,
                            });
                        }
                    } else {
                        for error in errors {
                            self.report(format!("{list}: draw rejected: {error}"));
                        }
                    }
                }
            }
        }
        self.record(JournalEvent::Executed {
            serial,
            list: list.to_string(),
        });
    }

    /// Checks the state a present job finds its back buffer in.
    pub(crate) fn validate_present(&self, back_buffer: ResourceId) {
        let state = self.resource_state(back_buffer);
        if state != Some(ResourceState::Present) {
            self.report(format!(
                "back buffer {back_buffer:?} presented in state {state:?} instead of Present"
            ));
        }
    }

    fn transition(
        &self,
        list: &str,
        resource: ResourceId,
        before: ResourceState,
        after: ResourceState,
    ) {
        let mut resources = lock(&self.resources);
        let Some(entry) = resources.get_mut(&resource) else {
            drop(resources);
            self.report(format!("{list}: barrier on destroyed resource {resource:?}"));
            return;
        };
        let actual = entry.state;
        let label = entry.label.clone();
        entry.state = after;
        drop(resources);
        if actual != before {
            self.report(format!(
                "{list}: barrier on '{label}' declares {before:?} but the resource is in {actual:?}"
            ));
        }
    }

    fn copy_buffer_region(
        &self,
        list: &str,
        dst: ResourceId,
        dst_offset: u64,
        src: ResourceId,
        src_offset: u64,
        size: u64,
    ) {
        let result = copy_region(&mut lock(&self.resources), dst, dst_offset, src, src_offset, size);
        if let Err(error) = result {
            self.report(format!("{list}: CopyBufferRegion: {error}"));
        }
    }

    fn copy_buffer_to_texture(
        &self,
        list: &str,
        dst: ResourceId,
        src: ResourceId,
        footprint: &TextureFootprint,
    ) {
        let result = upload_texels(&mut lock(&self.resources), dst, src, footprint);
        if let Err(error) = result {
            self.report(format!("{list}: CopyBufferToTexture: {error}"));
        }
    }

    fn copy_texture_to_buffer(
        &self,
        list: &str,
        dst: ResourceId,
        src: ResourceId,
        footprint: &TextureFootprint,
    ) {
        let result = readback_texels(&mut lock(&self.resources), dst, src, footprint);
        if let Err(error) = result {
            self.report(format!("{list}: CopyTextureToBuffer: {error}"));
        }
    }

    fn clear_render_target(&self, list: &str, rtv: CpuDescriptorHandle, color: [f32; 4]) {
        let Some(DescriptorContent::RenderTarget(id)) = self.resolve_cpu_descriptor(rtv) else {
            self.report(format!("{list}: ClearRenderTarget on empty view {rtv:?}"));
            return;
        };
        let mut resources = lock(&self.resources);
        let result = match resources.get_mut(&id) {
            None => Err(format!("render target {id:?} was destroyed")),
            Some(entry) if entry.state != ResourceState::RenderTarget => Err(format!(
                "'{}' cleared in {:?} instead of RenderTarget",
                entry.label, entry.state
            )),
            Some(entry) => {
                let texel = match entry.kind {
                    ResourceKind::Texture2D {
                        format: TextureFormat::Bgra8Unorm,
                        ..
                    } => {
                        let [r, g, b, a] = rgba8(color);
                        [b, g, r, a]
                    }
                    ResourceKind::Texture2D {
                        format: TextureFormat::R32Float,
                        ..
                    } => color[0].to_le_bytes(),
                    _ => rgba8(color),
                };
                for chunk in entry.data.chunks_exact_mut(4) {
                    chunk.copy_from_slice(&texel);
                }
                Ok(())
            }
        };
        drop(resources);
        if let Err(error) = result {
            self.report(format!("{list}: ClearRenderTarget: {error}"));
        }
    }

    fn clear_depth_stencil(&self, list: &str, dsv: CpuDescriptorHandle, depth: f32) {
        let Some(DescriptorContent::DepthStencil(id)) = self.resolve_cpu_descriptor(dsv) else {
            self.report(format!("{list}: ClearDepthStencil on empty view {dsv:?}"));
            return;
        };
        let mut resources = lock(&self.resources);
        let result = match resources.get_mut(&id) {
            None => Err(format!("depth buffer {id:?} was destroyed")),
            Some(entry) if entry.state != ResourceState::DepthWrite => Err(format!(
                "'{}' cleared in {:?} instead of DepthWrite",
                entry.label, entry.state
            )),
            Some(entry) => {
                let texel = bytemuck::bytes_of(&depth);
                for chunk in entry.data.chunks_exact_mut(4) {
                    chunk.copy_from_slice(texel);
                }
                Ok(())
            }
        };
        drop(resources);
        if let Err(error) = result {
            self.report(format!("{list}: ClearDepthStencil: {error}"));
        }
    }

    fn validate_draw(&self, bound: &BoundState) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(pipeline) = bound.pipeline else {
            errors.push("no pipeline state bound".to_string());
            return errors;
        };
        let Some(root_signature) = bound.root_signature else {
            errors.push("no root signature bound".to_string());
            return errors;
        };
        let expected = lock(&self.pipelines)
            .get(&pipeline)
            .map(|entry| entry.root_signature);
        if expected != Some(root_signature) {
            errors.push(format!(
                "pipeline {pipeline:?} was built for {expected:?} but {root_signature:?} is bound"
            ));
        }
        let parameters = lock(&self.root_signatures)
            .get(&root_signature)
            .map(|entry| entry.parameters.clone())
            .unwrap_or_default();

        let mut reads = Vec::new();
        for (slot, parameter) in parameters.iter().enumerate() {
            let slot = slot as u32;
            match parameter {
                RootParameter::ConstantBufferView { register } => {
                    match bound.constant_buffers.get(&slot).and_then(|a| resolve_address(*a)) {
                        Some((id, _)) => {
                            reads.push((id, ResourceState::VertexAndConstantBuffer, "constants"))
                        }
                        None => errors.push(format!("root CBV b{register} (slot {slot}) not set")),
                    }
                }
                RootParameter::ShaderResourceTable { base_register, .. } => {
                    let content = bound
                        .tables
                        .get(&slot)
                        .and_then(|handle| self.resolve_gpu_descriptor(*handle));
                    match content {
                        Some(DescriptorContent::ShaderResource(id)) => {
                            reads.push((id, ResourceState::PixelShaderResource, "texture"))
                        }
                        _ => errors.push(format!(
                            "descriptor table t{base_register} (slot {slot}) does not point at a view"
                        )),
                    }
                }
            }
        }
        if bound.tables.values().next().is_some() && bound.heaps.is_empty() {
            errors.push("descriptor table bound without descriptor heaps".to_string());
        }
        match bound.vertex_buffer {
            Some(view) => reads.push((view.resource, ResourceState::VertexAndConstantBuffer, "vertices")),
            None => errors.push("no vertex buffer bound".to_string()),
        }
        match bound.index_buffer {
            Some(view) => reads.push((view.resource, ResourceState::IndexBuffer, "indices")),
            None => errors.push("no index buffer bound".to_string()),
        }
        match bound.render_target {
            Some(id) => reads.push((id, ResourceState::RenderTarget, "render target")),
            None => errors.push("no render target bound".to_string()),
        }

        let resources = lock(&self.resources);
        for (id, required, role) in reads {
            match resources.get(&id) {
                None => errors.push(format!("{role} resource {id:?} was destroyed")),
                Some(entry) => {
                    let readable = entry.state == required
                        || (entry.heap == HeapKind::Upload
                            && entry.state == ResourceState::GenericRead
                            && required == ResourceState::VertexAndConstantBuffer);
                    if !readable {
                        errors.push(format!(
                            "{role} '{}' read in {:?} instead of {required:?}",
                            entry.label, entry.state
                        ));
                    }
                }
            }
        }
        errors
    }
}

fn rgba8(color: [f32; 4]) -> [u8; 4] {
    LinearRgba::from(color).to_rgba8()
}

fn copy_region(
    resources: &mut ResourceTable,
    dst: ResourceId,
    dst_offset: u64,
    src: ResourceId,
    src_offset: u64,
    size: u64,
) -> Result<(), String> {
    let bytes = readable(resources, src)?
        .data
        .get(src_offset as usize..(src_offset + size) as usize)
        .ok_or_else(|| format!("source range of {src:?} out of bounds"))?
        .to_vec();
    let target = copy_target(resources, dst)?;
    let label = target.label.clone();
    target
        .data
        .get_mut(dst_offset as usize..(dst_offset + size) as usize)
        .ok_or_else(|| format!("destination range of '{label}' out of bounds"))?
        .copy_from_slice(&bytes);
    Ok(())
}

fn upload_texels(
    resources: &mut ResourceTable,
    dst: ResourceId,
    src: ResourceId,
    footprint: &TextureFootprint,
) -> Result<(), String> {
    let source = readable(resources, src)?.data.clone();
    if (source.len() as u64) < footprint.total_size() {
        return Err(format!(
            "source buffer holds {} bytes but the footprint needs {}",
            source.len(),
            footprint.total_size()
        ));
    }
    let target = copy_target(resources, dst)?;
    check_footprint(target, footprint)?;
    let row = footprint.tight_row_size() as usize;
    for y in 0..footprint.height as usize {
        let from = (footprint.offset + y as u64 * footprint.row_pitch) as usize;
        target.data[y * row..(y + 1) * row].copy_from_slice(&source[from..from + row]);
    }
    Ok(())
}

fn readback_texels(
    resources: &mut ResourceTable,
    dst: ResourceId,
    src: ResourceId,
    footprint: &TextureFootprint,
) -> Result<(), String> {
    let texture = resources
        .get(&src)
        .ok_or_else(|| format!("source {src:?} was destroyed"))?;
    if texture.state != ResourceState::CopySource {
        return Err(format!(
            "source '{}' is in {:?} instead of CopySource",
            texture.label, texture.state
        ));
    }
    check_footprint(texture, footprint)?;
    let texels = texture.data.clone();
    let target = copy_target(resources, dst)?;
    if (target.data.len() as u64) < footprint.total_size() {
        return Err(format!("destination '{}' is too small", target.label));
    }
    let row = footprint.tight_row_size() as usize;
    for y in 0..footprint.height as usize {
        let to = (footprint.offset + y as u64 * footprint.row_pitch) as usize;
        target.data[to..to + row].copy_from_slice(&texels[y * row..(y + 1) * row]);
    }
    Ok(())
}

fn readable(resources: &ResourceTable, id: ResourceId) -> Result<&SoftResourceEntry, String> {
    let entry = resources
        .get(&id)
        .ok_or_else(|| format!("source {id:?} was destroyed"))?;
    let ok = match entry.heap {
        HeapKind::Upload => true,
        _ => entry.state == ResourceState::CopySource,
    };
    if ok {
        Ok(entry)
    } else {
        Err(format!(
            "source '{}' is in {:?} instead of CopySource",
            entry.label, entry.state
        ))
    }
}

fn copy_target(
    resources: &mut ResourceTable,
    id: ResourceId,
) -> Result<&mut SoftResourceEntry, String> {
    let entry = resources
        .get_mut(&id)
        .ok_or_else(|| format!("destination {id:?} was destroyed"))?;
    if entry.state != ResourceState::CopyDest {
        return Err(format!(
            "destination '{}' is in {:?} instead of CopyDest",
            entry.label, entry.state
        ));
    }
    Ok(entry)
}

fn check_footprint(texture: &SoftResourceEntry, footprint: &TextureFootprint) -> Result<(), String> {
    match texture.kind {
        ResourceKind::Texture2D {
            width,
            height,
            format,
        } if width == footprint.width
            && height == footprint.height
            && format == footprint.format =>
        {
            Ok(())
        }
        kind => Err(format!(
            "footprint {}x{} {:?} does not match '{}' ({kind:?})",
            footprint.width, footprint.height, footprint.format, texture.label
        )),
    }
}
