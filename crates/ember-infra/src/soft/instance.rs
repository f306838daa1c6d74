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

use super::device::SoftDevice;
use super::gpu::SoftDeviceConfig;
use ember_core::renderer::*;
use std::sync::Arc;

/// Vendor id Microsoft uses for its software rasterizer.
const SOFTWARE_VENDOR_ID: u32 = 0x1414;

/// The entry point of the soft backend.
///
/// By default it reports two adapters, in the order DXGI typically does on a
/// machine with one discrete GPU: a software adapter first, the hardware one
/// second.
#[derive(Debug, Clone)]
pub struct SoftInstance {
    adapters: Vec<AdapterInfo>,
    config: SoftDeviceConfig,
}

impl Default for SoftInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftInstance {
    /// Creates an instance exposing the default adapters.
    pub fn new() -> Self {
        Self {
            adapters: vec![
                AdapterInfo {
                    name: "Ember Basic Render Driver".to_string(),
                    vendor_id: SOFTWARE_VENDOR_ID,
                    device_id: 0x8c,
                    device_type: AdapterDeviceType::Cpu,
                    dedicated_video_memory: 0,
                    is_software: true,
                },
                AdapterInfo {
                    name: "Ember Reference GPU".to_string(),
                    vendor_id: 0x10de,
                    device_id: 0x2684,
                    device_type: AdapterDeviceType::DiscreteGpu,
                    dedicated_video_memory: 512 * 1024 * 1024,
                    is_software: false,
                },
            ],
            config: SoftDeviceConfig::default(),
        }
    }

    /// Replaces the reported adapters.
    pub fn with_adapters(mut self, adapters: Vec<AdapterInfo>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Sets the tunables applied to every device created from now on.
    pub fn with_config(mut self, config: SoftDeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// Creates a device and returns it with its concrete type, so tests can
    /// reach the inspection hooks.
    pub fn create_soft_device(
        &self,
        adapter_index: usize,
        options: &DeviceOptions,
    ) -> Result<Arc<SoftDevice>, RenderError> {
        let adapter = self.adapters.get(adapter_index).cloned().ok_or_else(|| {
            RenderError::InitializationFailed(format!(
                "adapter index {adapter_index} is out of range ({} adapters)",
                self.adapters.len()
            ))
        })?;
        log::info!(
            "Creating a device on '{}' ({:?}, {} MiB dedicated).",
            adapter.name,
            adapter.device_type,
            adapter.dedicated_video_memory / (1024 * 1024)
        );
        let mut config = self.config.clone();
        if adapter.dedicated_video_memory > 0 {
            config.memory_budget = config.memory_budget.min(adapter.dedicated_video_memory);
        }
        SoftDevice::new(adapter, *options, config).map(Arc::new)
    }
}

impl GraphicsInstance for SoftInstance {
    fn enumerate_adapters(&self) -> Vec<AdapterInfo> {
        self.adapters.clone()
    }

    fn create_device(
        &self,
        adapter_index: usize,
        options: &DeviceOptions,
    ) -> Result<Arc<dyn GraphicsDevice>, RenderError> {
        let device: Arc<dyn GraphicsDevice> = self.create_soft_device(adapter_index, options)?;
        Ok(device)
    }
}
