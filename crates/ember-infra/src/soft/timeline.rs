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

//! The asynchronous GPU timeline of a soft device.
//!
//! Work is handed to a dedicated thread through a channel and executed strictly
//! in submission order, so the CPU can run ahead of the GPU exactly like it does
//! with a real hardware queue.

use super::fence::FenceShared;
use super::gpu::{lock, GpuState};
use super::journal::JournalEvent;
use ember_core::renderer::{Command, FenceValue, ResourceId};
use std::sync::{Arc, Mutex};
use std::thread;

/// A unit of work queued on the GPU timeline.
#[derive(Debug)]
pub(crate) enum Job {
    Execute {
        serial: u64,
        label: String,
        commands: Vec<Command>,
    },
    Signal {
        serial: u64,
        fence: Arc<FenceShared>,
        value: FenceValue,
    },
    Present {
        serial: u64,
        back_buffer: ResourceId,
    },
    Shutdown,
}

/// Handle to the GPU timeline thread.
#[derive(Debug)]
pub(crate) struct Timeline {
    sender: flume::Sender<Job>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Timeline {
    /// Spawns the timeline thread for a device.
    pub(crate) fn spawn(gpu: Arc<GpuState>) -> std::io::Result<Self> {
        let (sender, receiver) = flume::unbounded::<Job>();
        let handle = thread::Builder::new()
            .name("ember-soft-gpu".to_string())
            .spawn(move || {
                log::debug!("GPU timeline of '{}' started.", gpu.adapter.name);
                while let Ok(job) = receiver.recv() {
                    match job {
                        Job::Execute {
                            serial,
                            label,
                            commands,
                        } => {
                            let delay = gpu.execution_delay();
                            if !delay.is_zero() {
                                thread::sleep(delay);
                            }
                            if !gpu.is_removed() {
                                gpu.execute(serial, &label, &commands);
                            }
                            gpu.complete_serial(serial);
                        }
                        Job::Signal {
                            serial,
                            fence,
                            value,
                        } => {
                            // Waiters woken by the fence must see the serial retired.
                            gpu.complete_serial(serial);
                            if !gpu.is_removed() {
                                gpu.record(JournalEvent::FenceSignaled { value });
                                fence.complete(value);
                            }
                        }
                        Job::Present {
                            serial,
                            back_buffer,
                        } => {
                            if !gpu.is_removed() {
                                gpu.validate_present(back_buffer);
                            }
                            gpu.complete_serial(serial);
                        }
                        Job::Shutdown => break,
                    }
                }
                log::debug!("GPU timeline of '{}' stopped.", gpu.adapter.name);
            })?;
        Ok(Self {
            sender,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queues a job. Fails only once the timeline thread is gone.
    pub(crate) fn submit(&self, job: Job) -> Result<(), String> {
        self.sender
            .send(job)
            .map_err(|_| "the GPU timeline thread has stopped".to_string())
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        let _ = self.sender.send(Job::Shutdown);
        if let Some(handle) = lock(&self.handle).take() {
            if handle.join().is_err() {
                log::error!("GPU timeline thread panicked.");
            }
        }
    }
}
