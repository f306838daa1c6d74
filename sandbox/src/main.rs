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

// Ember Sandbox
// Renders a few frames of a small scene on the soft backend.
//
// Usage: sandbox [config.ron]

use anyhow::{Context, Result};
use ember_core::math::{LinearRgba, Mat4, Vec3, FRAC_PI_4};
use ember_infra::{HeadlessWindow, SoftInstance};
use ember_render::{
    ClearValues, Material, MeshDraw, Renderer, RendererConfig, TextureData, Updatable, Vertex,
};
use std::sync::Arc;

const FRAME_COUNT: u32 = 120;
const DELTA_SECONDS: f32 = 1.0 / 60.0;

/// Builds the 24 vertices and 36 indices of a unit cube, one quad per face.
fn cube() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, tangent u, tangent v) of each face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in corners {
            let position = [0, 1, 2].map(|i| 0.5 * (normal[i] + su * u[i] + sv * v[i]));
            let uv = [(su + 1.0) * 0.5, (1.0 - sv) * 0.5];
            vertices.push(Vertex::new(position, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
    }
    (vertices, indices)
}

fn load_config() -> Result<RendererConfig> {
    match std::env::args().nth(1) {
        Some(path) => RendererConfig::from_ron_file(&path)
            .with_context(|| format!("failed to load renderer config from '{path}'")),
        None => Ok(RendererConfig::default()),
    }
}

fn build_scene(renderer: &mut Renderer) -> Result<Vec<MeshDraw>> {
    let (vertices, indices) = cube();
    let checker = TextureData::checkerboard(
        64,
        64,
        8,
        LinearRgba::WHITE,
        LinearRgba::rgb(0.1, 0.1, 0.1),
    );
    let texture = renderer.create_texture("Checker Texture", &checker)?;

    let textured = MeshDraw::new(
        renderer.create_mesh("Textured Cube", &vertices, &indices)?,
        Some(Material::new("Checker").with_texture(texture)),
        Mat4::from_translation(Vec3::new(-1.5, 0.0, 0.0)),
    )
    .with_spin(1.0);
    let plain = MeshDraw::new(
        renderer.create_mesh("Plain Cube", &vertices, &indices)?,
        Some(Material::new("Red").with_color(LinearRgba::rgb(0.8, 0.1, 0.1))),
        Mat4::from_translation(Vec3::new(1.5, 0.0, 0.0)),
    )
    .with_spin(-0.5);
    let lamp = MeshDraw::new(
        renderer.create_mesh("Lamp Cube", &vertices, &indices)?,
        Some(
            Material::new("Key Light")
                .with_color(LinearRgba::rgb(1.0, 0.9, 0.6))
                .with_emissive_intensity(2.0),
        ),
        Mat4::from_translation(Vec3::new(0.0, 2.0, 1.0)) * Mat4::from_scale(Vec3::new(0.3, 0.3, 0.3)),
    );
    Ok(vec![textured, plain, lamp])
}

fn update_camera(renderer: &mut Renderer) -> Result<()> {
    let (width, height) = renderer.size();
    let eye = Vec3::new(0.0, 2.0, -6.0);
    let view = Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::Y).context("degenerate camera")?;
    let projection = Mat4::perspective_lh(FRAC_PI_4, width as f32 / height as f32, 0.1, 100.0);
    renderer.update_view_constants(&view, &projection, eye)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let window = Arc::new(HeadlessWindow::new(1280, 720));
    let instance = SoftInstance::new();
    let mut renderer = Renderer::new(&instance, window.clone(), config)?;
    log::info!(
        "Rendering on '{}' ({} MiB of device memory in use).",
        renderer.adapter_info().name,
        renderer.gpu_memory_usage() / (1024 * 1024)
    );

    let mut scene = build_scene(&mut renderer)?;
    renderer.update_light_constants(
        Vec3::new(0.5, -1.0, 0.5),
        LinearRgba::WHITE,
        1.0,
    )?;
    update_camera(&mut renderer)?;

    for frame in 0..FRAME_COUNT {
        if frame == FRAME_COUNT / 2 {
            window.set_size(1600, 900);
            renderer.sync_surface_size()?;
            update_camera(&mut renderer)?;
            renderer.set_wireframe(true);
        }

        for draw in &mut scene {
            draw.update(DELTA_SECONDS);
        }

        renderer.begin_frame()?;
        renderer.clear(ClearValues::default())?;
        for draw in &mut scene {
            renderer.render(draw)?;
        }
        renderer.end_frame()?;
        match renderer.present() {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => log::warn!("Present failed, continuing: {e}"),
            Err(e) => return Err(e).context("the render loop cannot continue"),
        }

        if frame % 30 == 0 {
            let stats = renderer.stats();
            log::info!(
                "Frame {}: {} draws, {} triangles, {} skipped.",
                stats.frame_number,
                stats.draw_calls,
                stats.triangles,
                stats.skipped_draws
            );
        }
    }

    renderer.wait_for_gpu()?;
    for draw in scene {
        draw.destroy(renderer.device().as_ref())?;
    }
    renderer.shutdown()?;
    log::info!("Sandbox finished.");
    Ok(())
}
