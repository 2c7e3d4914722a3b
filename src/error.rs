//! Error types for the rendering core.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Errors raised by pipeline construction and IBL baking.
///
/// None of these are recoverable locally: every variant is fatal to the
/// preparation phase and is expected to propagate to the top-level startup
/// sequence. The inputs to these operations are static, so a retry would
/// fail identically.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A backend resource allocation was rejected.
    #[error("failed to create {what}: {result:?}")]
    ResourceCreation {
        what: &'static str,
        result: vk::Result,
    },

    /// GPU memory allocation through the allocator failed.
    #[error("memory allocation failed: {0}")]
    Allocation(String),

    /// Graphics pipeline assembly was rejected by the driver.
    #[error("failed to create graphics pipeline: {0:?}")]
    PipelineCreation(vk::Result),

    /// Queue submission or fence/idle wait failed.
    #[error("command submission failed during {what}: {result:?}")]
    Submission {
        what: &'static str,
        result: vk::Result,
    },

    /// A SPIR-V shader file could not be read or parsed.
    #[error("failed to load shader {path:?}: {message}")]
    Shader { path: PathBuf, message: String },
}

impl RenderError {
    /// Shorthand used at every backend creation call site.
    pub(crate) fn creation(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::ResourceCreation { what, result }
    }

    /// Shorthand for submission/wait failures.
    pub(crate) fn submission(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Submission { what, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_failing_operation() {
        let err = RenderError::creation("offscreen image")(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let text = err.to_string();
        assert!(text.contains("offscreen image"));
        assert!(text.contains("ERROR_OUT_OF_DEVICE_MEMORY"));
    }

    #[test]
    fn test_submission_error_display() {
        let err = RenderError::submission("bake flush")(vk::Result::ERROR_DEVICE_LOST);
        assert_eq!(
            err.to_string(),
            "command submission failed during bake flush: ERROR_DEVICE_LOST"
        );
    }

    #[test]
    fn test_pipeline_error_carries_status() {
        let err = RenderError::PipelineCreation(vk::Result::ERROR_INVALID_SHADER_NV);
        assert!(err.to_string().contains("ERROR_INVALID_SHADER_NV"));
    }
}
