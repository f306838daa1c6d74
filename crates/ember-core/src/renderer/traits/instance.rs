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

use super::GraphicsDevice;
use crate::renderer::api::{AdapterInfo, DeviceOptions};
use crate::renderer::error::RenderError;
use std::fmt::Debug;
use std::sync::Arc;

/// Entry point of a backend: enumerates adapters and creates devices on them.
pub trait GraphicsInstance: Send + Sync + Debug {
    /// Lists the adapters in the order the system reports them.
    fn enumerate_adapters(&self) -> Vec<AdapterInfo>;

    /// Creates a logical device on the adapter at `adapter_index`.
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If the index is invalid or the
    ///   adapter does not support the required feature level.
    fn create_device(
        &self,
        adapter_index: usize,
        options: &DeviceOptions,
    ) -> Result<Arc<dyn GraphicsDevice>, RenderError>;
}
