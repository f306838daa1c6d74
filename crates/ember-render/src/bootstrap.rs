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

//! Adapter selection, device and queue creation.

use crate::config::RendererConfig;
use ember_core::renderer::{
    AdapterInfo, CommandQueue, DeviceOptions, GraphicsDevice, GraphicsInstance, RenderError,
};
use std::sync::Arc;

/// The device, its single direct queue, and the adapter they run on.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    /// The logical device.
    pub device: Arc<dyn GraphicsDevice>,
    /// The direct command queue.
    pub queue: Arc<dyn CommandQueue>,
    /// The adapter the device was created on.
    pub adapter: AdapterInfo,
}

impl DeviceContext {
    /// Wraps an existing device and creates its direct queue.
    pub fn from_device(device: Arc<dyn GraphicsDevice>) -> Result<Self, RenderError> {
        let queue = device.create_command_queue()?;
        let adapter = device.adapter_info();
        Ok(Self {
            device,
            queue,
            adapter,
        })
    }
}

/// Maps the debug toggles of the configuration onto device options.
pub fn device_options(config: &RendererConfig) -> DeviceOptions {
    DeviceOptions {
        debug_layer: config.enable_debug_layer,
        gpu_validation: config.enable_debug_layer && config.enable_gpu_validation,
        break_on_error: config.enable_debug_layer && config.enable_break_on_error,
    }
}

/// Creates a device on the first suitable adapter and its direct queue.
///
/// Adapters are tried in enumeration order. Software adapters are skipped
/// unless the configuration allows them; adapters that fail device creation
/// are logged and skipped.
///
/// # Errors
///
/// Returns [`RenderError::InitializationFailed`] when no adapter yields a device.
pub fn bootstrap_device(
    instance: &dyn GraphicsInstance,
    config: &RendererConfig,
) -> Result<DeviceContext, RenderError> {
    let options = device_options(config);
    let adapters = instance.enumerate_adapters();
    log::info!("Found {} graphics adapter(s).", adapters.len());

    for (index, adapter) in adapters.iter().enumerate() {
        if adapter.is_software && !config.allow_software_adapter {
            log::debug!("Skipping software adapter '{}'.", adapter.name);
            continue;
        }
        match instance.create_device(index, &options) {
            Ok(device) => {
                log::info!(
                    "Using adapter '{}' ({:?}, vendor {:#06x}).",
                    adapter.name,
                    adapter.device_type,
                    adapter.vendor_id
                );
                return DeviceContext::from_device(device);
            }
            Err(e) => log::warn!("Adapter '{}' rejected device creation: {e}", adapter.name),
        }
    }

    Err(RenderError::InitializationFailed(
        "no suitable graphics adapter found".to_string(),
    ))
}
