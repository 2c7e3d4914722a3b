//! SPIR-V shader stage loading.

use std::fs::File;
use std::path::Path;

use ash::util::read_spv;
use ash::vk;

use crate::error::RenderError;

/// Entry point used by every shader in the project.
pub const SHADER_ENTRY: &std::ffi::CStr = c"main";

/// A loaded shader module tagged with its pipeline stage.
#[derive(Debug, Clone, Copy)]
pub struct ShaderStage {
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
}

impl ShaderStage {
    /// Destroy the shader module. The stage descriptor is unusable afterwards.
    ///
    /// # Safety
    ///
    /// No pipeline referencing this module may still be under construction.
    pub unsafe fn destroy(self, device: &ash::Device) {
        unsafe { device.destroy_shader_module(self.module, None) };
    }
}

/// Load a SPIR-V file from `path` and create a shader module for `stage`.
pub fn load_shader(
    device: &ash::Device,
    path: &Path,
    stage: vk::ShaderStageFlags,
) -> Result<ShaderStage, RenderError> {
    let mut file = File::open(path).map_err(|e| RenderError::Shader {
        path: path.to_owned(),
        message: e.to_string(),
    })?;

    let code = read_spv(&mut file).map_err(|e| RenderError::Shader {
        path: path.to_owned(),
        message: e.to_string(),
    })?;

    let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
    let module = unsafe { device.create_shader_module(&create_info, None) }
        .map_err(RenderError::creation("shader module"))?;

    log::debug!("loaded shader {} ({:?})", path.display(), stage);

    Ok(ShaderStage { module, stage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_name() {
        assert_eq!(SHADER_ENTRY.to_str().unwrap(), "main");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = Path::new("/nonexistent/shader.vert.spv");
        let err = File::open(path)
            .map_err(|e| RenderError::Shader {
                path: path.to_owned(),
                message: e.to_string(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/shader.vert.spv"));
    }
}
