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

use super::gpu::lock;
use ember_core::renderer::{Fence, FenceEvent, FenceValue, RenderError};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Counter and pending completion events of a soft fence.
#[derive(Debug)]
pub(crate) struct FenceShared {
    label: String,
    completed: AtomicU64,
    waiters: Mutex<Vec<(FenceValue, Arc<FenceEvent>)>>,
}

impl FenceShared {
    pub(crate) fn new(label: String, initial_value: FenceValue) -> Self {
        Self {
            label,
            completed: AtomicU64::new(initial_value),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn completed(&self) -> FenceValue {
        self.completed.load(Ordering::Acquire)
    }

    /// Moves the counter forward and fires every event registered at or below it.
    pub(crate) fn complete(&self, value: FenceValue) {
        self.completed.fetch_max(value, Ordering::AcqRel);
        let reached = self.completed();
        let mut waiters = lock(&self.waiters);
        waiters.retain(|(target, event)| {
            if *target <= reached {
                event.signal();
                false
            } else {
                true
            }
        });
        log::trace!("Fence '{}' reached {}", self.label, reached);
    }
}

/// A fence of the soft backend.
#[derive(Debug, Clone)]
pub struct SoftFence {
    pub(crate) shared: Arc<FenceShared>,
}

impl Fence for SoftFence {
    fn completed_value(&self) -> FenceValue {
        self.shared.completed()
    }

    fn set_event_on_completion(
        &self,
        value: FenceValue,
        event: Arc<FenceEvent>,
    ) -> Result<(), RenderError> {
        let mut waiters = lock(&self.shared.waiters);
        // Checked under the lock so a concurrent `complete` cannot slip between
        // the comparison and the registration.
        if self.shared.completed() >= value {
            event.signal();
        } else {
            waiters.push((value, event));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn completion_fires_only_reached_events() {
        let fence = SoftFence {
            shared: Arc::new(FenceShared::new("test".into(), 0)),
        };
        let early = Arc::new(FenceEvent::new());
        let late = Arc::new(FenceEvent::new());
        fence.set_event_on_completion(1, early.clone()).unwrap();
        fence.set_event_on_completion(3, late.clone()).unwrap();

        fence.shared.complete(2);

        assert!(early.wait(Some(Duration::from_millis(10))));
        assert!(!late.is_signaled());
        assert_eq!(fence.completed_value(), 2);
    }

    #[test]
    fn completed_value_never_moves_backwards() {
        let shared = FenceShared::new("test".into(), 5);
        shared.complete(3);
        assert_eq!(shared.completed(), 5);
    }

    #[test]
    fn registering_a_reached_value_signals_immediately() {
        let fence = SoftFence {
            shared: Arc::new(FenceShared::new("test".into(), 4)),
        };
        let event = Arc::new(FenceEvent::new());
        fence.set_event_on_completion(4, event.clone()).unwrap();
        assert!(event.is_signaled());
    }
}
