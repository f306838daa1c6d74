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

//! The OS-level wait primitive a fence fires when it reaches a value.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// An auto-reset event.
///
/// A fence fires the event once its completed value reaches the value the event
/// was registered for. A successful [`FenceEvent::wait`] consumes the signal.
#[derive(Debug, Default)]
pub struct FenceEvent {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl FenceEvent {
    /// Creates an unsignaled event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event and wakes every waiter.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        *signaled = true;
        self.condvar.notify_all();
    }

    /// Blocks until the event is set, then clears it.
    ///
    /// Returns `false` if `timeout` elapsed first. `None` waits forever.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = timeout.map(|t| Instant::now() + t);
        while !*signaled {
            match deadline {
                None => {
                    signaled = self
                        .condvar
                        .wait(signaled)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    signaled = self
                        .condvar
                        .wait_timeout(signaled, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        *signaled = false;
        true
    }

    /// Whether the event is currently set.
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_consumes_the_signal() {
        let event = FenceEvent::new();
        event.signal();
        assert!(event.is_signaled());
        assert!(event.wait(Some(Duration::from_millis(10))));
        assert!(!event.is_signaled());
        assert!(!event.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn wait_wakes_on_signal_from_another_thread() {
        let event = Arc::new(FenceEvent::new());
        let signaler = {
            let event = event.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                event.signal();
            })
        };
        assert!(event.wait(None));
        signaler.join().unwrap();
    }
}
