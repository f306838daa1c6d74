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

use ember_core::platform::RenderSurface;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// An off-screen surface with a size that can be changed at runtime.
#[derive(Debug)]
pub struct HeadlessWindow {
    size: Mutex<(u32, u32)>,
    id: u64,
}

impl HeadlessWindow {
    /// Creates a surface of `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new((width, height)),
            id: NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Simulates the user resizing the window.
    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner) = (width, height);
    }
}

impl RenderSurface for HeadlessWindow {
    fn inner_size(&self) -> (u32, u32) {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizing_is_visible_through_the_surface() {
        let window = HeadlessWindow::new(800, 600);
        window.set_size(1024, 768);
        assert_eq!(window.inner_size(), (1024, 768));
    }

    #[test]
    fn every_window_gets_its_own_id() {
        assert_ne!(HeadlessWindow::new(1, 1).id(), HeadlessWindow::new(1, 1).id());
    }
}
