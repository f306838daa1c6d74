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

use ember_core::renderer::*;
use ember_infra::soft::{JournalEvent, SoftDevice, SoftInstance};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

fn setup() -> (Arc<SoftDevice>, Arc<dyn CommandQueue>, Arc<dyn Fence>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = SoftInstance::new()
        .create_soft_device(1, &DeviceOptions::default())
        .expect("The reference adapter should create a device");
    let queue = device.create_command_queue().unwrap();
    let fence = device.create_fence(0).unwrap();
    (device, queue, fence)
}

/// Signals `value` and blocks until the GPU timeline reaches it.
fn flush(queue: &Arc<dyn CommandQueue>, fence: &Arc<dyn Fence>, value: FenceValue) {
    queue.signal(fence.as_ref(), value).unwrap();
    let event = Arc::new(FenceEvent::new());
    fence.set_event_on_completion(value, event.clone()).unwrap();
    assert!(event.wait(WAIT), "Fence {value} should complete");
}

fn upload_buffer(device: &SoftDevice, label: &str, data: &[u8]) -> ResourceId {
    let id = device
        .create_resource(&ResourceDescriptor::buffer(
            label.to_string(),
            data.len() as u64,
            HeapKind::Upload,
            ResourceState::GenericRead,
        ))
        .unwrap();
    device.write_resource(id, 0, data).unwrap();
    id
}

#[test]
fn test_fence_completes_after_queued_work() {
    // --- 1. ARRANGE ---
    let (device, queue, fence) = setup();
    device.set_execution_delay(Duration::from_millis(30));
    let allocator = device.create_command_allocator("Frame 0").unwrap();
    let mut list = CommandList::new("Slow List");
    list.reset(allocator).unwrap();
    list.close().unwrap();

    // --- 2. ACT ---
    queue.execute_command_lists(&[&list]).unwrap();
    queue.signal(fence.as_ref(), 1).unwrap();
    let completed_right_away = fence.completed_value();
    let event = Arc::new(FenceEvent::new());
    fence.set_event_on_completion(1, event.clone()).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(
        completed_right_away, 0,
        "The CPU should run ahead of the GPU timeline"
    );
    assert!(event.wait(WAIT), "The completion event should fire");
    assert_eq!(fence.completed_value(), 1);
    assert!(device.is_idle(), "Every submission should have retired");
}

#[test]
fn test_lists_execute_in_submission_order() {
    // --- 1. ARRANGE ---
    let (device, queue, fence) = setup();
    let allocator = device.create_command_allocator("Frame 0").unwrap();
    let mut first = CommandList::new("First");
    let mut second = CommandList::new("Second");
    for list in [&mut first, &mut second] {
        list.reset(allocator).unwrap();
        list.close().unwrap();
    }

    // --- 2. ACT ---
    queue.execute_command_lists(&[&first, &second]).unwrap();
    flush(&queue, &fence, 1);

    // --- 3. ASSERT ---
    let executed: Vec<String> = device
        .journal()
        .into_iter()
        .filter_map(|event| match event {
            JournalEvent::Executed { list, .. } => Some(list),
            _ => None,
        })
        .collect();
    assert_eq!(executed, vec!["First".to_string(), "Second".to_string()]);
}

#[test]
fn test_open_command_list_is_rejected() {
    let (device, queue, _fence) = setup();
    let allocator = device.create_command_allocator("Frame 0").unwrap();
    let mut list = CommandList::new("Still Open");
    list.reset(allocator).unwrap();

    let result = queue.execute_command_lists(&[&list]);

    assert!(
        matches!(result, Err(RenderError::SubmissionFailed(_))),
        "Submitting a recording list should fail, got {result:?}"
    );
}

#[test]
fn test_resetting_an_in_flight_allocator_is_reported() {
    // --- 1. ARRANGE ---
    let (device, queue, fence) = setup();
    device.set_execution_delay(Duration::from_millis(50));
    let allocator = device.create_command_allocator("Frame 0").unwrap();
    let mut list = CommandList::new("Frame");
    list.reset(allocator).unwrap();
    list.close().unwrap();
    queue.execute_command_lists(&[&list]).unwrap();

    // --- 2. ACT ---
    device.reset_command_allocator(allocator).unwrap();
    flush(&queue, &fence, 1);
    device.reset_command_allocator(allocator).unwrap();

    // --- 3. ASSERT ---
    let resets: Vec<bool> = device
        .journal()
        .into_iter()
        .filter_map(|event| match event {
            JournalEvent::AllocatorReset { in_flight, .. } => Some(in_flight),
            _ => None,
        })
        .collect();
    assert_eq!(resets, vec![true, false]);
    assert_eq!(
        device.validation_errors().len(),
        1,
        "Only the early reset should be flagged"
    );
}

#[test]
fn test_buffer_copy_goes_through_the_gpu_timeline() {
    // --- 1. ARRANGE ---
    let (device, queue, fence) = setup();
    let payload: Vec<u8> = (0..64).collect();
    let staging = upload_buffer(&device, "Staging", &payload);
    let gpu_buffer = device
        .create_resource(&ResourceDescriptor::buffer(
            "Vertices",
            64,
            HeapKind::Default,
            ResourceState::CopyDest,
        ))
        .unwrap();
    let readback = device
        .create_resource(&ResourceDescriptor::buffer(
            "Readback",
            64,
            HeapKind::Readback,
            ResourceState::CopyDest,
        ))
        .unwrap();
    let allocator = device.create_command_allocator("Copy").unwrap();
    let mut list = CommandList::new("Copy List");
    list.reset(allocator).unwrap();
    list.record(Command::CopyBufferRegion {
        dst: gpu_buffer,
        dst_offset: 0,
        src: staging,
        src_offset: 0,
        size: 64,
    });
    list.resource_barrier(gpu_buffer, ResourceState::CopyDest, ResourceState::CopySource);
    list.record(Command::CopyBufferRegion {
        dst: readback,
        dst_offset: 0,
        src: gpu_buffer,
        src_offset: 0,
        size: 64,
    });
    list.close().unwrap();

    // --- 2. ACT ---
    queue.execute_command_lists(&[&list]).unwrap();
    flush(&queue, &fence, 1);

    // --- 3. ASSERT ---
    assert_eq!(device.read_resource(readback, 0, 64).unwrap(), payload);
    assert!(
        device.validation_errors().is_empty(),
        "A well-formed copy should not trip validation: {:?}",
        device.validation_errors()
    );
    assert!(
        device.read_resource(gpu_buffer, 0, 64).is_err(),
        "Default heap buffers should not be CPU readable"
    );
}

#[test]
fn test_mismatched_barrier_is_reported() {
    let (device, queue, fence) = setup();
    let buffer = device
        .create_resource(&ResourceDescriptor::buffer(
            "Indices",
            16,
            HeapKind::Default,
            ResourceState::CopyDest,
        ))
        .unwrap();
    let allocator = device.create_command_allocator("Frame").unwrap();
    let mut list = CommandList::new("Bad Barrier");
    list.reset(allocator).unwrap();
    list.resource_barrier(buffer, ResourceState::Common, ResourceState::IndexBuffer);
    list.close().unwrap();

    queue.execute_command_lists(&[&list]).unwrap();
    flush(&queue, &fence, 1);

    let errors = device.validation_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("CopyDest"), "Unexpected message: {}", errors[0]);
    assert_eq!(
        device.resource_state(buffer),
        Some(ResourceState::IndexBuffer),
        "The barrier should still apply its after state"
    );
}

#[test]
fn test_device_removal_releases_waiters() {
    // --- 1. ARRANGE ---
    let (device, queue, fence) = setup();
    let event = Arc::new(FenceEvent::new());
    fence.set_event_on_completion(10, event.clone()).unwrap();

    // --- 2. ACT ---
    device.remove_device("DXGI_ERROR_DEVICE_HUNG");

    // --- 3. ASSERT ---
    assert!(event.wait(WAIT), "Pending waiters should be released");
    assert_eq!(fence.completed_value(), FENCE_VALUE_DEVICE_REMOVED);
    assert_eq!(
        device.removed_reason().as_deref(),
        Some("DXGI_ERROR_DEVICE_HUNG")
    );
    let result = queue.signal(fence.as_ref(), 11);
    assert!(
        matches!(result, Err(RenderError::DeviceLost { .. })),
        "A removed device should refuse work"
    );
}

#[test]
fn test_swap_chain_rotates_and_resizes() {
    // --- 1. ARRANGE ---
    let (device, queue, fence) = setup();
    let mut swap_chain = device
        .create_swap_chain(&SwapChainDescriptor {
            width: 64,
            height: 32,
            buffer_count: 3,
            format: TextureFormat::Rgba8Unorm,
        })
        .unwrap();

    // --- 2. ACT ---
    let mut indices = Vec::new();
    for _ in 0..4 {
        indices.push(swap_chain.current_back_buffer_index());
        swap_chain.present(1).unwrap();
    }
    flush(&queue, &fence, 1);
    swap_chain.resize_buffers(128, 64).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(indices, vec![0, 1, 2, 0]);
    assert_eq!(swap_chain.size(), (128, 64));
    assert_eq!(
        swap_chain.current_back_buffer_index(),
        0,
        "A resize restarts the rotation"
    );
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_memory_budget_is_enforced() {
    let device = SoftInstance::new()
        .create_soft_device(1, &DeviceOptions::default())
        .unwrap();
    let result = device.create_resource(&ResourceDescriptor::buffer(
        "Huge",
        u32::MAX as u64,
        HeapKind::Default,
        ResourceState::Common,
    ));
    assert!(matches!(result, Err(ResourceError::OutOfMemory { .. })));
}
