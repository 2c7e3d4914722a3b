//! Explicit render context shared by pipeline building and IBL baking.
//!
//! Every operation that needs the device, queue or allocator takes them
//! through a [`RenderContext`] instead of a global, so the baking engine can
//! be driven by any correctly initialized backend.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::Allocator;
use parking_lot::Mutex;

use crate::command;
use crate::error::RenderError;

/// Device, queue and allocator bundle for the preparation path.
///
/// The context owns its command pool and pipeline cache; the device, queue
/// and allocator are created and destroyed by the surrounding application.
pub struct RenderContext {
    device: ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
    command_pool: vk::CommandPool,
    pipeline_cache: vk::PipelineCache,
    allocator: Arc<Mutex<Allocator>>,
    /// Debug utils device fns, present when the extension was enabled.
    debug_utils: Option<ash::ext::debug_utils::Device>,
    destroyed: bool,
}

impl RenderContext {
    /// Create a context around an opened device and graphics queue.
    pub fn new(
        device: ash::Device,
        queue: vk::Queue,
        queue_family_index: u32,
        allocator: Arc<Mutex<Allocator>>,
        debug_utils: Option<ash::ext::debug_utils::Device>,
    ) -> Result<Self, RenderError> {
        let command_pool = command::create_command_pool(&device, queue_family_index)?;

        let cache_info = vk::PipelineCacheCreateInfo::default();
        let pipeline_cache = unsafe { device.create_pipeline_cache(&cache_info, None) }
            .map_err(RenderError::creation("pipeline cache"))?;

        Ok(Self {
            device,
            queue,
            queue_family_index,
            command_pool,
            pipeline_cache,
            allocator,
            debug_utils,
            destroyed: false,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    pub fn allocator(&self) -> &Arc<Mutex<Allocator>> {
        &self.allocator
    }

    /// Allocate and begin a one-time-submit command buffer.
    pub fn begin_one_shot(&self) -> Result<vk::CommandBuffer, RenderError> {
        command::begin_one_shot(&self.device, self.command_pool)
    }

    /// Submit `cmd` and block the calling thread until it has executed.
    pub fn flush(&self, cmd: vk::CommandBuffer) -> Result<(), RenderError> {
        command::flush(&self.device, self.command_pool, self.queue, cmd)
    }

    /// Attach a debug name to a Vulkan object. No-op without debug utils.
    pub fn set_object_name<T: Handle>(&self, object: T, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = std::ffi::CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(object)
            .object_name(&name);
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            log::debug!("failed to set debug name: {:?}", e);
        }
    }

    /// Destroy the context's own resources.
    ///
    /// # Safety
    ///
    /// The GPU must be idle and the device must still be valid. Must be
    /// called before the device is destroyed.
    pub unsafe fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        unsafe {
            self.device.destroy_pipeline_cache(self.pipeline_cache, None);
            self.device.destroy_command_pool(self.command_pool, None);
        }
        self.destroyed = true;
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if !self.destroyed {
            log::warn!(
                "RenderContext dropped without destroy(); command pool and \
                 pipeline cache leaked"
            );
        }
    }
}
