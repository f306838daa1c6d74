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

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Errors fall in three groups. Creation failures ([`ShaderError`],
//! [`PipelineError`], [`ResourceError`]) are recoverable by the caller.
//! Frame-lifecycle failures ([`RenderError`]) unwind to the application. Among
//! those, [`RenderError::is_fatal`] singles out device loss and GPU hangs,
//! after which no further frame may be attempted.

use super::api::common::FenceValue;
use super::api::pipeline::{RootSignatureId, ShaderModuleId};
use super::api::resource::{HeapKind, ResourceId};
use std::fmt;
use std::time::Duration;

/// An error related to the compilation of a shader module.
#[derive(Debug)]
pub enum ShaderError {
    /// The shader source failed to compile.
    CompilationError {
        /// The shader label.
        label: String,
        /// Compiler output.
        details: String,
    },
    /// The entry point is not defined by the source.
    InvalidEntryPoint {
        /// The shader label.
        label: String,
        /// The missing entry point.
        entry_point: String,
    },
    /// The requested shader module could not be found.
    NotFound {
        /// The ID of the shader module that was not found.
        id: ShaderModuleId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::InvalidEntryPoint { label, entry_point } => {
                write!(f, "Entry point '{entry_point}' not found in shader '{label}'")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of a root signature or pipeline state object.
#[derive(Debug)]
pub enum PipelineError {
    /// The root signature could not be serialized or created.
    RootSignatureCreationFailed(String),
    /// The backend failed to build the pipeline state object.
    CompilationFailed {
        /// The pipeline label, if any.
        label: Option<String>,
        /// Backend output.
        details: String,
    },
    /// A shader module handed to the pipeline is unknown.
    InvalidShaderModule {
        /// The ID of the invalid shader module.
        id: ShaderModuleId,
        /// The label of the pipeline being created.
        pipeline_label: Option<String>,
    },
    /// The root signature handed to the pipeline is unknown.
    InvalidRootSignature {
        /// The ID of the invalid root signature.
        id: RootSignatureId,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::RootSignatureCreationFailed(msg) => {
                write!(f, "Root signature creation failed: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline state creation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::InvalidShaderModule { id, pipeline_label } => {
                write!(
                    f,
                    "Invalid shader module {:?} for pipeline '{}'",
                    id,
                    pipeline_label.as_deref().unwrap_or("Unknown")
                )
            }
            PipelineError::InvalidRootSignature { id } => {
                write!(f, "Invalid root signature ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// The device ran out of memory for the allocation.
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
        /// Bytes still available.
        available: u64,
    },
    /// The resource lives in a heap the CPU cannot map for this access.
    NotCpuAccessible {
        /// The resource.
        id: ResourceId,
        /// Its heap.
        heap: HeapKind,
    },
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// The creation parameters are invalid.
    InvalidDescriptor(String),
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::OutOfMemory {
                requested,
                available,
            } => write!(
                f,
                "Out of device memory: requested {requested} bytes, {available} available."
            ),
            ResourceError::NotCpuAccessible { id, heap } => {
                write!(f, "Resource {id:?} in heap {heap:?} is not CPU accessible.")
            }
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::InvalidDescriptor(msg) => {
                write!(f, "Invalid resource descriptor: {msg}")
            }
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A frame-lifecycle error of the renderer or the graphics device.
#[derive(Debug)]
pub enum RenderError {
    /// A failure occurred while bootstrapping the device, queue or swap chain.
    InitializationFailed(String),
    /// An operation was called in the wrong frame state.
    InvalidState(String),
    /// Command lists could not be submitted to the queue.
    SubmissionFailed(String),
    /// The swap chain failed to present for a transient reason.
    PresentFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The graphics device was removed or reset. Every pending fence wait is void.
    DeviceLost {
        /// The removal reason reported by the device.
        reason: String,
    },
    /// A fence wait did not complete within the configured timeout.
    GpuTimeout {
        /// The fence value that was awaited.
        fence_value: FenceValue,
        /// How long the wait lasted.
        waited: Duration,
    },
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl RenderError {
    /// Whether the error invalidates the device, so the render loop must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::DeviceLost { .. } | RenderError::GpuTimeout { .. }
        )
    }

    /// Whether the error is a device removal.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RenderError::DeviceLost { .. })
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::InvalidState(msg) => write!(f, "Invalid renderer state: {msg}"),
            RenderError::SubmissionFailed(msg) => {
                write!(f, "Command list submission failed: {msg}")
            }
            RenderError::PresentFailed(msg) => write!(f, "Present failed: {msg}"),
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost { reason } => {
                write!(f, "The graphics device was lost: {reason}")
            }
            RenderError::GpuTimeout {
                fence_value,
                waited,
            } => write!(
                f,
                "GPU did not reach fence value {fence_value} within {} ms",
                waited.as_millis()
            ),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            label: "emissive.hlsl".to_string(),
            details: "X3000: syntax error".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'emissive.hlsl': X3000: syntax error"
        );
    }

    #[test]
    fn render_error_display_wrapping_shader_error() {
        let shader_err = ShaderError::NotFound {
            id: ShaderModuleId(101),
        };
        let res_err: ResourceError = shader_err.into();
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Shader resource error: Shader module not found for ID: ShaderModuleId(101)"
        );
        assert!(render_err.source().is_some());
        assert!(render_err.source().unwrap().source().is_some());
    }

    #[test]
    fn only_device_loss_and_timeouts_are_fatal() {
        assert!(RenderError::DeviceLost {
            reason: "hung".into()
        }
        .is_fatal());
        assert!(RenderError::GpuTimeout {
            fence_value: 3,
            waited: Duration::from_millis(50),
        }
        .is_fatal());
        assert!(!RenderError::PresentFailed("occluded".into()).is_fatal());
        assert!(!RenderError::SubmissionFailed("bad list".into()).is_fatal());
        assert!(!RenderError::from(ResourceError::OutOfBounds).is_device_lost());
    }
}
