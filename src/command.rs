//! One-shot command buffer helpers for the preparation path.
//!
//! Baking runs synchronously: a command buffer is allocated, recorded,
//! submitted with a fence and waited on before the caller continues. There
//! is deliberately no overlap between bakes or with frame rendering.

use ash::vk;

use crate::error::RenderError;

/// Create a command pool for the graphics queue family.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, RenderError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe { device.create_command_pool(&pool_info, None) }
        .map_err(RenderError::creation("command pool"))
}

/// Allocate and begin a primary command buffer for one-time submission.
pub fn begin_one_shot(
    device: &ash::Device,
    pool: vk::CommandPool,
) -> Result<vk::CommandBuffer, RenderError> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let cmd = unsafe { device.allocate_command_buffers(&alloc_info) }
        .map_err(RenderError::creation("command buffer"))?[0];

    let begin_info = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    unsafe { device.begin_command_buffer(cmd, &begin_info) }
        .map_err(RenderError::submission("command buffer begin"))?;

    Ok(cmd)
}

/// End `cmd`, submit it and block until the fence signals, then free it.
pub fn flush(
    device: &ash::Device,
    pool: vk::CommandPool,
    queue: vk::Queue,
    cmd: vk::CommandBuffer,
) -> Result<(), RenderError> {
    unsafe { device.end_command_buffer(cmd) }
        .map_err(RenderError::submission("command buffer end"))?;

    let fence_info = vk::FenceCreateInfo::default();
    let fence = unsafe { device.create_fence(&fence_info, None) }
        .map_err(RenderError::creation("submit fence"))?;

    let command_buffers = [cmd];
    let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

    let result = unsafe { device.queue_submit(queue, &[submit_info], fence) }
        .map_err(RenderError::submission("queue submit"))
        .and_then(|_| {
            // 100 second timeout, same order of magnitude the driver uses
            // before declaring the device lost.
            unsafe { device.wait_for_fences(&[fence], true, 100_000_000_000) }
                .map_err(RenderError::submission("fence wait"))
        });

    unsafe {
        device.destroy_fence(fence, None);
        device.free_command_buffers(pool, &command_buffers);
    }

    result
}
