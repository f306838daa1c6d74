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

use super::fence::SoftFence;
use super::gpu::GpuState;
use super::journal::JournalEvent;
use super::timeline::{Job, Timeline};
use ember_core::renderer::{CommandList, CommandQueue, Fence, FenceValue, RenderError};
use std::sync::Arc;

/// The direct command queue of a soft device.
#[derive(Debug)]
pub struct SoftQueue {
    pub(crate) gpu: Arc<GpuState>,
    pub(crate) timeline: Arc<Timeline>,
}

impl CommandQueue for SoftQueue {
    fn execute_command_lists(&self, lists: &[&CommandList]) -> Result<(), RenderError> {
        self.gpu.check_removed()?;
        if let Some(open) = lists.iter().find(|list| list.is_recording()) {
            return Err(RenderError::SubmissionFailed(format!(
                "command list '{}' was submitted without being closed",
                open.label()
            )));
        }
        for list in lists {
            let serial = self.gpu.next_serial();
            self.gpu.mark_submission(serial, list);
            self.gpu.record(JournalEvent::Submitted {
                serial,
                list: list.label().to_string(),
            });
            self.timeline
                .submit(Job::Execute {
                    serial,
                    label: list.label().to_string(),
                    commands: list.commands().to_vec(),
                })
                .map_err(RenderError::SubmissionFailed)?;
        }
        Ok(())
    }

    fn signal(&self, fence: &dyn Fence, value: FenceValue) -> Result<(), RenderError> {
        self.gpu.check_removed()?;
        let fence = fence.as_any().downcast_ref::<SoftFence>().ok_or_else(|| {
            RenderError::SubmissionFailed("fence does not belong to the soft backend".to_string())
        })?;
        let serial = self.gpu.next_serial();
        self.timeline
            .submit(Job::Signal {
                serial,
                fence: fence.shared.clone(),
                value,
            })
            .map_err(RenderError::SubmissionFailed)
    }
}
