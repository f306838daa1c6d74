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

//! Fence-based CPU/GPU synchronization.

use ember_core::renderer::{
    CommandQueue, Fence, FenceEvent, FenceValue, GraphicsDevice, RenderError,
    FENCE_VALUE_DEVICE_REMOVED,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Signals and awaits a monotonic fence on the direct queue.
///
/// `current_value` is the last value handed to the queue. Every call to
/// [`FenceSynchronizer::signal`] uses a strictly greater value, and
/// [`FenceSynchronizer::wait_for`] only returns `Ok` once the fence reports a
/// completed value at or above the target.
#[derive(Debug)]
pub struct FenceSynchronizer {
    fence: Arc<dyn Fence>,
    queue: Arc<dyn CommandQueue>,
    current_value: FenceValue,
    event: Arc<FenceEvent>,
    timeout: Option<Duration>,
}

impl FenceSynchronizer {
    /// Creates the fence at value 0.
    pub fn new(
        device: &dyn GraphicsDevice,
        queue: Arc<dyn CommandQueue>,
        timeout: Option<Duration>,
    ) -> Result<Self, RenderError> {
        let fence = device.create_fence(0)?;
        Ok(Self {
            fence,
            queue,
            current_value: 0,
            event: Arc::new(FenceEvent::new()),
            timeout,
        })
    }

    /// Enqueues a signal of the next fence value and returns it.
    ///
    /// # Errors
    ///
    /// A failure after device removal is reported as [`RenderError::DeviceLost`].
    pub fn signal(&mut self) -> Result<FenceValue, RenderError> {
        self.current_value += 1;
        let value = self.current_value;
        self.queue
            .signal(self.fence.as_ref(), value)
            .map_err(|e| self.classify(e))?;
        log::trace!("Signaled fence value {value}.");
        Ok(value)
    }

    /// Blocks until the GPU reached `value`.
    ///
    /// # Errors
    ///
    /// * [`RenderError::DeviceLost`] if the device was removed while waiting.
    /// * [`RenderError::GpuTimeout`] if the configured timeout elapsed.
    /// * [`RenderError::InvalidState`] if `value` was never signaled.
    pub fn wait_for(&self, value: FenceValue) -> Result<(), RenderError> {
        if value > self.current_value {
            return Err(RenderError::InvalidState(format!(
                "waiting for fence value {value} which was never signaled (last: {})",
                self.current_value
            )));
        }
        let start = Instant::now();
        loop {
            let completed = self.fence.completed_value();
            if completed == FENCE_VALUE_DEVICE_REMOVED {
                return Err(RenderError::DeviceLost {
                    reason: format!("fence reported device removal while waiting for {value}"),
                });
            }
            if completed >= value {
                return Ok(());
            }

            self.fence
                .set_event_on_completion(value, self.event.clone())
                .map_err(|e| self.classify(e))?;
            let remaining = match self.timeout {
                Some(timeout) => {
                    let waited = start.elapsed();
                    if waited >= timeout {
                        return Err(RenderError::GpuTimeout {
                            fence_value: value,
                            waited,
                        });
                    }
                    Some(timeout - waited)
                }
                None => None,
            };
            // The event is shared between waits, so a wake-up only means "check again".
            self.event.wait(remaining);
        }
    }

    /// Signals a fresh value and waits for it: a full GPU drain.
    pub fn wait_for_idle(&mut self) -> Result<(), RenderError> {
        let value = self.signal()?;
        self.wait_for(value)
    }

    /// The last value the GPU reported as completed.
    pub fn completed_value(&self) -> FenceValue {
        self.fence.completed_value()
    }

    /// The last value handed to the queue.
    pub fn current_value(&self) -> FenceValue {
        self.current_value
    }

    /// The value the next [`FenceSynchronizer::signal`] will use.
    pub fn next_value(&self) -> FenceValue {
        self.current_value + 1
    }

    /// Whether `value` has completed on the GPU.
    pub fn is_complete(&self, value: FenceValue) -> bool {
        let completed = self.completed_value();
        completed != FENCE_VALUE_DEVICE_REMOVED && completed >= value
    }

    fn classify(&self, err: RenderError) -> RenderError {
        if err.is_device_lost() {
            return err;
        }
        if self.fence.completed_value() == FENCE_VALUE_DEVICE_REMOVED {
            return RenderError::DeviceLost {
                reason: err.to_string(),
            };
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::renderer::CommandList;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::any::Any;

    /// A fence completed by hand from the test.
    #[derive(Debug, Default)]
    struct ManualFence {
        completed: AtomicU64,
        waiters: Mutex<Vec<(FenceValue, Arc<FenceEvent>)>>,
    }

    impl ManualFence {
        fn complete(&self, value: FenceValue) {
            self.completed.store(value, Ordering::SeqCst);
            for (target, event) in self.waiters.lock().unwrap().iter() {
                if *target <= value {
                    event.signal();
                }
            }
        }
    }

    impl Fence for ManualFence {
        fn completed_value(&self) -> FenceValue {
            self.completed.load(Ordering::SeqCst)
        }

        fn set_event_on_completion(
            &self,
            value: FenceValue,
            event: Arc<FenceEvent>,
        ) -> Result<(), RenderError> {
            if self.completed_value() >= value {
                event.signal();
            } else {
                self.waiters.lock().unwrap().push((value, event));
            }
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// A queue that records signals without executing them.
    #[derive(Debug, Default)]
    struct RecordingQueue {
        signals: Mutex<Vec<FenceValue>>,
        lost: bool,
    }

    impl CommandQueue for RecordingQueue {
        fn execute_command_lists(&self, _lists: &[&CommandList]) -> Result<(), RenderError> {
            Ok(())
        }

        fn signal(&self, _fence: &dyn Fence, value: FenceValue) -> Result<(), RenderError> {
            if self.lost {
                return Err(RenderError::SubmissionFailed("DXGI_ERROR_DEVICE_REMOVED".into()));
            }
            self.signals.lock().unwrap().push(value);
            Ok(())
        }
    }

    fn synchronizer(
        fence: Arc<ManualFence>,
        queue: Arc<RecordingQueue>,
        timeout: Option<Duration>,
    ) -> FenceSynchronizer {
        FenceSynchronizer {
            fence,
            queue,
            current_value: 0,
            event: Arc::new(FenceEvent::new()),
            timeout,
        }
    }

    #[test]
    fn signaled_values_strictly_increase() {
        let queue = Arc::new(RecordingQueue::default());
        let mut sync = synchronizer(Arc::default(), queue.clone(), None);
        let values: Vec<_> = (0..4).map(|_| sync.signal().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
        assert_eq!(*queue.signals.lock().unwrap(), values);
        assert_eq!(sync.next_value(), 5);
    }

    #[test]
    fn wait_returns_only_after_completion() {
        let fence = Arc::new(ManualFence::default());
        let mut sync = synchronizer(fence.clone(), Arc::default(), None);
        let value = sync.signal().unwrap();

        let completer = {
            let fence = fence.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                fence.complete(value);
            })
        };
        sync.wait_for(value).unwrap();
        assert!(fence.completed_value() >= value);
        completer.join().unwrap();
    }

    #[test]
    fn bounded_wait_times_out() {
        let mut sync = synchronizer(
            Arc::default(),
            Arc::default(),
            Some(Duration::from_millis(10)),
        );
        let value = sync.signal().unwrap();
        let err = sync.wait_for(value).unwrap_err();
        assert!(matches!(err, RenderError::GpuTimeout { fence_value: 1, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn removal_value_is_reported_as_device_lost() {
        let fence = Arc::new(ManualFence::default());
        let mut sync = synchronizer(fence.clone(), Arc::default(), None);
        let value = sync.signal().unwrap();
        fence.complete(FENCE_VALUE_DEVICE_REMOVED);
        assert!(sync.wait_for(value).unwrap_err().is_device_lost());
    }

    #[test]
    fn failed_signal_after_removal_is_device_lost() {
        let fence = Arc::new(ManualFence::default());
        fence.complete(FENCE_VALUE_DEVICE_REMOVED);
        let queue = Arc::new(RecordingQueue {
            lost: true,
            ..Default::default()
        });
        let mut sync = synchronizer(fence, queue, None);
        assert!(sync.signal().unwrap_err().is_device_lost());
    }

    #[test]
    fn waiting_for_an_unsignaled_value_is_rejected() {
        let sync = synchronizer(Arc::default(), Arc::default(), None);
        assert!(matches!(sync.wait_for(3), Err(RenderError::InvalidState(_))));
    }
}
