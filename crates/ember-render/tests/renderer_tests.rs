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

use ember_core::math::{LinearRgba, Mat4, Vec3};
use ember_core::renderer::*;
use ember_infra::soft::{JournalEvent, SoftDevice, SoftInstance};
use ember_infra::HeadlessWindow;
use ember_render::bootstrap::DeviceContext;
use ember_render::{
    ClearValues, FrameState, Material, MeshDraw, Renderer, RendererConfig, TextureData, Uploadable,
    Vertex,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn setup(config: RendererConfig) -> (Arc<SoftDevice>, Arc<HeadlessWindow>, Renderer) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = SoftInstance::new()
        .create_soft_device(1, &DeviceOptions::default())
        .expect("The reference adapter should create a device");
    let window = Arc::new(HeadlessWindow::new(800, 600));
    let context = DeviceContext::from_device(device.clone()).unwrap();
    let renderer = Renderer::with_device(context, window.clone(), config)
        .expect("The renderer should initialize on the soft device");
    (device, window, renderer)
}

fn quad(renderer: &Renderer, name: &str, material: Option<Material>) -> MeshDraw {
    let normal = [0.0, 0.0, -1.0];
    let vertices = [
        Vertex::new([-0.5, -0.5, 0.0], normal, [0.0, 1.0]),
        Vertex::new([0.5, -0.5, 0.0], normal, [1.0, 1.0]),
        Vertex::new([0.5, 0.5, 0.0], normal, [1.0, 0.0]),
        Vertex::new([-0.5, 0.5, 0.0], normal, [0.0, 0.0]),
    ];
    let mesh = renderer
        .create_mesh(name, &vertices, &[0, 1, 2, 0, 2, 3])
        .unwrap();
    MeshDraw::new(mesh, material, Mat4::IDENTITY)
}

/// Forwards to the device queue, refusing submissions while `reject` is set.
#[derive(Debug)]
struct RejectingQueue {
    inner: Arc<dyn CommandQueue>,
    reject: AtomicBool,
}

impl CommandQueue for RejectingQueue {
    fn execute_command_lists(&self, lists: &[&CommandList]) -> Result<(), RenderError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(RenderError::SubmissionFailed("queue rejected the lists".to_string()));
        }
        self.inner.execute_command_lists(lists)
    }

    fn signal(&self, fence: &dyn Fence, value: FenceValue) -> Result<(), RenderError> {
        self.inner.signal(fence, value)
    }
}

fn quad_vertices() -> [Vertex; 3] {
    let normal = [0.0, 0.0, -1.0];
    [
        Vertex::new([0.0, 0.5, 0.0], normal, [0.5, 0.0]),
        Vertex::new([0.5, -0.5, 0.0], normal, [1.0, 1.0]),
        Vertex::new([-0.5, -0.5, 0.0], normal, [0.0, 1.0]),
    ]
}

fn run_frame(renderer: &mut Renderer, draws: &mut [MeshDraw]) -> Result<(), RenderError> {
    renderer.begin_frame()?;
    renderer.clear(ClearValues::default())?;
    for draw in draws.iter_mut() {
        renderer.render(draw)?;
    }
    renderer.end_frame()?;
    renderer.present()
}

fn pipelines_bound(device: &SoftDevice) -> Vec<String> {
    device
        .journal()
        .into_iter()
        .filter_map(|event| match event {
            JournalEvent::PipelineBound { label, .. } => Some(label),
            _ => None,
        })
        .collect()
}

#[test]
fn test_three_frames_with_two_back_buffers() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    let mut draws = vec![quad(&renderer, "Quad", Some(Material::new("Brick")))];
    renderer
        .update_view_constants(
            &Mat4::look_at_lh(Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::Y).unwrap(),
            &Mat4::perspective_lh(std::f32::consts::FRAC_PI_4, 800.0 / 600.0, 0.1, 100.0),
            Vec3::new(0.0, 0.0, -3.0),
        )
        .unwrap();

    // --- 2. ACT ---
    let mut indices = Vec::new();
    for _ in 0..3 {
        indices.push(renderer.frame_index());
        run_frame(&mut renderer, &mut draws).expect("Every frame should render");
    }
    renderer.wait_for_gpu().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(indices, vec![0, 1, 0], "Frames should alternate between back buffers");
    assert_eq!(renderer.stats().frame_number, 3);
    assert_eq!(renderer.stats().draw_calls, 1);
    assert_eq!(renderer.stats().triangles, 2);
    assert_eq!(renderer.frame_state(), FrameState::Idle);
    let draws_executed = device
        .journal()
        .iter()
        .filter(|e| matches!(e, JournalEvent::Draw { index_count: 6, .. }))
        .count();
    assert_eq!(draws_executed, 3, "The GPU should execute one draw per frame");
    let presents = device
        .journal()
        .iter()
        .filter(|e| matches!(e, JournalEvent::Presented { sync_interval: 1, .. }))
        .count();
    assert_eq!(presents, 3, "Every frame should be presented with vsync");
    assert!(
        device.validation_errors().is_empty(),
        "No validation error expected: {:?}",
        device.validation_errors()
    );
}

#[test]
fn test_cpu_never_runs_more_than_one_frame_ahead() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    device.set_execution_delay(Duration::from_millis(10));
    let mut draws = vec![quad(&renderer, "Quad", None)];

    // --- 2. & 3. ACT & ASSERT ---
    for _ in 0..5 {
        run_frame(&mut renderer, &mut draws).unwrap();
        let ahead = renderer.current_fence_value() - renderer.completed_fence_value();
        assert!(ahead <= 1, "The CPU ran {ahead} submissions ahead of the GPU");
    }
    renderer.wait_for_gpu().unwrap();
    let resets_in_flight = device
        .journal()
        .iter()
        .filter(|e| matches!(e, JournalEvent::AllocatorReset { in_flight: true, .. }))
        .count();
    assert_eq!(resets_in_flight, 0, "No allocator may be reset while in flight");
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_frame_calls_out_of_order_are_rejected() {
    // --- 1. ARRANGE ---
    let (_device, _window, mut renderer) = setup(RendererConfig::default());

    // --- 2. ACT ---
    let end_without_begin = renderer.end_frame();
    renderer.begin_frame().unwrap();
    let begin_twice = renderer.begin_frame();
    let resize_while_recording = renderer.resize(1024, 768);

    // --- 3. ASSERT ---
    assert!(matches!(end_without_begin, Err(RenderError::InvalidState(_))));
    assert!(matches!(begin_twice, Err(RenderError::InvalidState(_))));
    assert!(matches!(resize_while_recording, Err(RenderError::InvalidState(_))));
    assert_eq!(renderer.frame_state(), FrameState::Recording);
}

#[test]
fn test_buffer_upload_round_trip() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let mut buffer = renderer
        .create_buffer(
            "Round Trip",
            data.len() as u64,
            HeapKind::Default,
            ResourceState::VertexAndConstantBuffer,
            Some(&data),
        )
        .unwrap();

    // --- 2. ACT ---
    renderer.upload_immediately(&mut buffer).unwrap();
    let read = renderer
        .read_back_buffer(
            buffer.resource(),
            data.len() as u64,
            ResourceState::VertexAndConstantBuffer,
        )
        .unwrap();

    // --- 3. ASSERT ---
    assert_eq!(read, data, "The GPU copy should match the uploaded bytes");
    assert!(!buffer.needs_upload());
    assert_eq!(
        device.resource_state(buffer.resource()),
        Some(ResourceState::VertexAndConstantBuffer),
        "The read back should restore the buffer state"
    );
    assert_eq!(renderer.pending_upload_buffers(), 0);
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_texture_upload_round_trip() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    let data = TextureData::checkerboard(
        5,
        3,
        1,
        LinearRgba::WHITE,
        LinearRgba::rgb(1.0, 0.0, 0.0),
    );
    let mut texture = renderer.create_texture("Checker", &data).unwrap();

    // --- 2. ACT ---
    renderer.upload_immediately(&mut texture).unwrap();
    let read = renderer.read_back_texture(&texture).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(read, data, "Pitched rows should be stripped on the way back");
    assert!(texture.is_bindable());
    assert_eq!(
        device.resource_state(texture.resource()),
        Some(ResourceState::PixelShaderResource)
    );
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_resize_drains_the_gpu_before_releasing_targets() {
    // --- 1. ARRANGE ---
    let (device, window, mut renderer) = setup(RendererConfig::default());
    device.set_execution_delay(Duration::from_millis(20));
    let mut draws = vec![quad(&renderer, "Quad", None)];
    run_frame(&mut renderer, &mut draws).unwrap();
    device.clear_journal();

    // --- 2. ACT ---
    window.set_size(1024, 768);
    renderer.sync_surface_size().unwrap();
    run_frame(&mut renderer, &mut draws).unwrap();

    // --- 3. ASSERT ---
    let journal = device.journal();
    let drained = journal
        .iter()
        .position(|e| matches!(e, JournalEvent::FenceSignaled { .. }))
        .expect("The resize should signal the fence");
    let released = journal
        .iter()
        .position(|e| {
            matches!(e, JournalEvent::ResourceDestroyed { label, .. } if label == "Depth Buffer")
        })
        .expect("The depth buffer should be recreated");
    assert!(drained < released, "The GPU must be drained before targets are released");
    assert!(
        !journal.iter().any(|e| matches!(
            e,
            JournalEvent::ResourceDestroyed { in_flight: true, .. }
                | JournalEvent::BuffersResized { in_flight: true, .. }
        )),
        "Nothing may be released while in flight"
    );
    assert_eq!(renderer.size(), (1024, 768));
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_degenerate_resizes_are_ignored() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    device.clear_journal();

    // --- 2. ACT ---
    renderer.resize(0, 600).unwrap();
    renderer.resize(800, 0).unwrap();
    renderer.resize(800, 600).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(renderer.size(), (800, 600));
    assert!(
        !device
            .journal()
            .iter()
            .any(|e| matches!(e, JournalEvent::BuffersResized { .. })),
        "Zero and unchanged sizes should not touch the swap chain"
    );
}

#[test]
fn test_missing_emissive_pipeline_falls_back_to_basic() {
    // --- 1. ARRANGE ---
    let _ = env_logger::builder().is_test(true).try_init();
    let device = SoftInstance::new()
        .create_soft_device(1, &DeviceOptions::default())
        .unwrap();
    device.fail_shader_compilation("emissive");
    let context = DeviceContext::from_device(device.clone()).unwrap();
    let window = Arc::new(HeadlessWindow::new(640, 480));
    let mut renderer = Renderer::with_device(context, window, RendererConfig::default())
        .expect("A missing optional pipeline should not fail initialization");
    let lamp = Material::new("Key Light").with_color(LinearRgba::rgb(1.0, 0.9, 0.6));
    let mut draws = vec![quad(&renderer, "Lamp", Some(lamp))];

    // --- 2. ACT ---
    run_frame(&mut renderer, &mut draws).unwrap();
    renderer.wait_for_gpu().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(
        pipelines_bound(&device),
        vec!["Basic Mesh PSO".to_string()],
        "Emissive draws should use the basic pipeline"
    );
    assert_eq!(renderer.stats().draw_calls, 1);
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_wireframe_selects_the_wireframe_pipeline() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    let mut draws = vec![quad(&renderer, "Quad", Some(Material::new("Brick")))];
    renderer.set_wireframe(true);

    // --- 2. ACT ---
    run_frame(&mut renderer, &mut draws).unwrap();
    renderer.wait_for_gpu().unwrap();

    // --- 3. ASSERT ---
    assert!(renderer.is_wireframe());
    assert_eq!(pipelines_bound(&device), vec!["Wireframe Mesh PSO".to_string()]);
}

#[test]
fn test_textured_material_binds_its_texture() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    let texture = renderer
        .create_texture(
            "Checker",
            &TextureData::checkerboard(8, 8, 2, LinearRgba::WHITE, LinearRgba::BLACK),
        )
        .unwrap();
    let material = Material::new("Checkered").with_texture(texture);
    let mut draws = vec![quad(&renderer, "Quad", Some(material))];

    // --- 2. ACT ---
    run_frame(&mut renderer, &mut draws).unwrap();
    renderer.wait_for_gpu().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(pipelines_bound(&device), vec!["Textured Mesh PSO".to_string()]);
    assert!(
        device.validation_errors().is_empty(),
        "The texture should be in a shader resource state when drawn: {:?}",
        device.validation_errors()
    );
}

#[test]
fn test_device_loss_on_present_is_fatal() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    renderer.begin_frame().unwrap();
    renderer.clear(ClearValues::default()).unwrap();
    renderer.end_frame().unwrap();

    // --- 2. ACT ---
    device.remove_device("simulated driver reset");
    let result = renderer.present();
    let next = renderer.begin_frame();

    // --- 3. ASSERT ---
    let err = result.expect_err("Presenting on a removed device should fail");
    assert!(err.is_device_lost(), "Expected a device loss, got {err:?}");
    assert!(err.is_fatal());
    assert!(next.is_err(), "The renderer cannot keep rendering on a lost device");
    assert!(renderer.shutdown().is_err(), "The drain should report the loss");
}

#[test]
fn test_object_indices_wrap_around() {
    // --- 1. ARRANGE ---
    let config = RendererConfig {
        max_objects: 4,
        ..RendererConfig::default()
    };
    let (_device, _window, mut renderer) = setup(config);
    renderer.begin_frame().unwrap();

    // --- 2. ACT ---
    let indices: Vec<u32> = (0..6).map(|_| renderer.allocate_object_index()).collect();
    renderer.reset_object_index();
    let after_reset = renderer.allocate_object_index();

    // --- 3. ASSERT ---
    assert_eq!(indices, vec![0, 1, 2, 3, 0, 1]);
    assert_eq!(renderer.constant_pool_overflows(), 2);
    assert_eq!(after_reset, 0);
}

#[test]
fn test_descriptor_exhaustion_disables_texturing() {
    // --- 1. ARRANGE ---
    let config = RendererConfig {
        srv_heap_capacity: 2,
        ..RendererConfig::default()
    };
    let (device, _window, mut renderer) = setup(config);
    let checker = TextureData::checkerboard(4, 4, 1, LinearRgba::WHITE, LinearRgba::BLACK);
    let first = renderer.create_texture("First", &checker).unwrap();

    // --- 2. ACT ---
    let second = renderer.create_texture("Second", &checker).unwrap();
    let extra = renderer.allocate_srv_descriptor();
    let material = Material::new("Starved").with_texture(second);
    let mut draws = vec![quad(&renderer, "Quad", Some(material))];
    run_frame(&mut renderer, &mut draws).unwrap();
    renderer.wait_for_gpu().unwrap();

    // --- 3. ASSERT ---
    assert!(first.srv().is_valid(), "The last free slot should be handed out");
    assert!(!extra.is_valid(), "An exhausted heap returns the invalid index");
    assert_eq!(
        pipelines_bound(&device),
        vec!["Basic Mesh PSO".to_string()],
        "A texture without a view should draw untextured"
    );
    assert_eq!(renderer.stats().draw_calls, 1);
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_staging_buffers_outlive_their_copies() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    device.set_execution_delay(Duration::from_millis(30));
    let mut draws = vec![quad(&renderer, "Quad", None)];
    device.clear_journal();

    // --- 2. ACT ---
    renderer.begin_frame().unwrap();
    renderer.render(&mut draws[0]).unwrap();
    renderer.end_frame().unwrap();
    let pending_after_submit = renderer.pending_upload_buffers();
    let destroyed_early = device
        .journal()
        .iter()
        .any(|e| matches!(e, JournalEvent::ResourceDestroyed { label, .. } if label.ends_with("(upload)")));
    renderer.present().unwrap();
    renderer.wait_for_gpu().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(pending_after_submit, 2, "Vertex and index staging buffers are pending");
    assert!(!destroyed_early, "Staging buffers must survive until their fence");
    assert_eq!(renderer.pending_upload_buffers(), 0);
    let released: Vec<bool> = device
        .journal()
        .into_iter()
        .filter_map(|e| match e {
            JournalEvent::ResourceDestroyed {
                label, in_flight, ..
            } if label.ends_with("(upload)") => Some(in_flight),
            _ => None,
        })
        .collect();
    assert_eq!(released, vec![false, false], "Both staging buffers are released once idle");
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_shutdown_releases_renderer_resources() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    let mut draws = vec![quad(&renderer, "Quad", None)];
    run_frame(&mut renderer, &mut draws).unwrap();

    // --- 2. ACT ---
    renderer.shutdown().unwrap();
    for draw in draws {
        draw.destroy(device.as_ref()).unwrap();
    }
    let live_after_shutdown = device.live_resource_count();
    let restart = renderer.begin_frame();
    drop(renderer);

    // --- 3. ASSERT ---
    assert_eq!(
        live_after_shutdown, 2,
        "Only the back buffers owned by the swap chain should survive shutdown"
    );
    assert!(matches!(restart, Err(RenderError::InvalidState(_))));
    assert_eq!(device.live_resource_count(), 0, "Dropping the renderer frees the swap chain");
    assert!(device.is_idle());
}

#[test]
fn test_waiting_for_the_gpu_mid_frame_is_rejected() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    let mut vertices = renderer
        .create_vertex_buffer("Triangle Vertices", &quad_vertices())
        .unwrap();
    renderer.begin_frame().unwrap();
    renderer.upload(&mut vertices).unwrap();

    // --- 2. ACT ---
    let mid_frame_wait = renderer.wait_for_gpu();
    let pending_mid_frame = renderer.pending_upload_buffers();
    renderer.end_frame().unwrap();
    renderer.present().unwrap();
    renderer.wait_for_gpu().unwrap();
    vertices.mark_completed(renderer.completed_fence_value());

    // --- 3. ASSERT ---
    assert!(
        matches!(mid_frame_wait, Err(RenderError::InvalidState(_))),
        "A drain while recording would complete the upload's fence early"
    );
    assert_eq!(pending_mid_frame, 1, "The staging buffer must outlive the recording frame");
    assert!(!vertices.needs_upload());
    assert_eq!(
        device.resource_state(vertices.resource()),
        Some(ResourceState::VertexAndConstantBuffer),
        "The copy should have executed"
    );
    assert!(
        device.validation_errors().is_empty(),
        "No validation error expected: {:?}",
        device.validation_errors()
    );
}

#[test]
fn test_constants_of_an_executing_frame_are_not_overwritten() {
    // --- 1. ARRANGE ---
    let (device, _window, mut renderer) = setup(RendererConfig::default());
    device.set_execution_delay(Duration::from_millis(200));
    let mut draws = vec![quad(&renderer, "Quad", None)];
    run_frame(&mut renderer, &mut draws).unwrap();
    let gpu_busy = !device.is_idle();
    let before = device.capture_resource(renderer.constant_buffer()).unwrap();

    // --- 2. ACT ---
    let model_write = renderer.update_model_constants(
        &Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0)),
        0,
    );
    let material_write = renderer.update_material_constants(LinearRgba::WHITE, 0, 0.0);
    renderer
        .update_view_constants(
            &Mat4::from_translation(Vec3::new(0.0, 0.0, 7.0)),
            &Mat4::IDENTITY,
            Vec3::new(0.0, 0.0, -7.0),
        )
        .unwrap();
    renderer
        .update_light_constants(Vec3::new(0.0, -1.0, 0.0), LinearRgba::WHITE, 3.0)
        .unwrap();
    let after_idle_updates = device.capture_resource(renderer.constant_buffer()).unwrap();
    renderer.begin_frame().unwrap();
    let after_begin = device.capture_resource(renderer.constant_buffer()).unwrap();

    // --- 3. ASSERT ---
    assert!(gpu_busy, "The first frame should still be executing");
    assert!(matches!(model_write, Err(RenderError::InvalidState(_))));
    assert!(matches!(material_write, Err(RenderError::InvalidState(_))));
    assert_eq!(
        before, after_idle_updates,
        "Updates between frames must not touch memory the GPU is reading"
    );
    assert_ne!(
        before, after_begin,
        "The next frame should receive the kept camera and light"
    );
}

#[test]
fn test_failed_submission_stops_the_renderer() {
    // --- 1. ARRANGE ---
    let _ = env_logger::builder().is_test(true).try_init();
    let device = SoftInstance::new()
        .create_soft_device(1, &DeviceOptions::default())
        .unwrap();
    let mut context = DeviceContext::from_device(device.clone()).unwrap();
    let queue = Arc::new(RejectingQueue {
        inner: context.queue.clone(),
        reject: AtomicBool::new(false),
    });
    context.queue = queue.clone() as Arc<dyn CommandQueue>;
    let window = Arc::new(HeadlessWindow::new(640, 480));
    let mut renderer = Renderer::with_device(context, window, RendererConfig::default()).unwrap();
    let mut draws = vec![quad(&renderer, "Quad", None)];

    // --- 2. ACT ---
    queue.reject.store(true, Ordering::SeqCst);
    renderer.begin_frame().unwrap();
    renderer.render(&mut draws[0]).unwrap();
    let submitted = renderer.end_frame();
    queue.reject.store(false, Ordering::SeqCst);
    let next_frame = renderer.begin_frame();
    let mut late = renderer
        .create_vertex_buffer("Late Vertices", &quad_vertices())
        .unwrap();
    let late_upload = renderer.upload_immediately(&mut late);

    // --- 3. ASSERT ---
    assert!(matches!(submitted, Err(RenderError::SubmissionFailed(_))));
    assert_eq!(renderer.frame_state(), FrameState::Idle);
    assert!(
        matches!(next_frame, Err(RenderError::InvalidState(_))),
        "Uploads of the lost frame never ran, so no frame may draw them"
    );
    assert!(matches!(late_upload, Err(RenderError::InvalidState(_))));
    assert!(renderer.shutdown().is_ok(), "Shutdown still drains and releases");
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_timed_out_read_back_keeps_its_buffer_until_the_copy_ends() {
    // --- 1. ARRANGE ---
    let config = RendererConfig {
        gpu_wait_timeout_ms: Some(20),
        ..RendererConfig::default()
    };
    let (device, _window, mut renderer) = setup(config);
    let data = vec![7u8; 64];
    let mut buffer = renderer
        .create_buffer(
            "Slow Source",
            data.len() as u64,
            HeapKind::Default,
            ResourceState::VertexAndConstantBuffer,
            Some(&data),
        )
        .unwrap();
    renderer.upload_immediately(&mut buffer).unwrap();
    device.set_execution_delay(Duration::from_millis(200));

    // --- 2. ACT ---
    let read = renderer.read_back_buffer(
        buffer.resource(),
        data.len() as u64,
        ResourceState::VertexAndConstantBuffer,
    );
    let pending_after_timeout = renderer.pending_upload_buffers();
    std::thread::sleep(Duration::from_millis(400));
    renderer.wait_for_gpu().unwrap();

    // --- 3. ASSERT ---
    assert!(
        matches!(read, Err(RenderError::GpuTimeout { .. })),
        "The read back should time out, got {read:?}"
    );
    assert_eq!(pending_after_timeout, 1, "The readback buffer waits for its copy");
    assert_eq!(renderer.pending_upload_buffers(), 0);
    let readback_releases: Vec<bool> = device
        .journal()
        .into_iter()
        .filter_map(|e| match e {
            JournalEvent::ResourceDestroyed {
                label, in_flight, ..
            } if label == "Readback Buffer" => Some(in_flight),
            _ => None,
        })
        .collect();
    assert_eq!(readback_releases, vec![false]);
    assert!(device.validation_errors().is_empty());
}
