//! Image layout transitions for the baking command streams.
//!
//! The bakers move their images through a small, fixed set of layouts
//! (attachment, transfer source/destination, sampled). Each state knows the
//! access masks and pipeline stages a transition into or out of it needs,
//! so call sites only name the two layouts.

use ash::vk;

/// Image layout states the baking passes move through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayoutState {
    /// Initial state, contents undefined.
    #[default]
    Undefined,
    /// Optimal for color attachment writes.
    ColorAttachment,
    /// Optimal for shader sampling.
    ShaderReadOnly,
    /// Optimal as a transfer source.
    TransferSrc,
    /// Optimal as a transfer destination.
    TransferDst,
}

impl ImageLayoutState {
    /// Convert to the Vulkan image layout.
    pub fn to_vk(self) -> vk::ImageLayout {
        match self {
            Self::Undefined => vk::ImageLayout::UNDEFINED,
            Self::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Self::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            Self::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        }
    }

    /// Access mask when leaving this layout.
    pub fn src_access_mask(self) -> vk::AccessFlags {
        match self {
            Self::Undefined => vk::AccessFlags::empty(),
            Self::ColorAttachment => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            Self::ShaderReadOnly => vk::AccessFlags::SHADER_READ,
            Self::TransferSrc => vk::AccessFlags::TRANSFER_READ,
            Self::TransferDst => vk::AccessFlags::TRANSFER_WRITE,
        }
    }

    /// Access mask when entering this layout.
    pub fn dst_access_mask(self) -> vk::AccessFlags {
        match self {
            Self::Undefined => vk::AccessFlags::empty(),
            Self::ColorAttachment => {
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            }
            Self::ShaderReadOnly => vk::AccessFlags::SHADER_READ,
            Self::TransferSrc => vk::AccessFlags::TRANSFER_READ,
            Self::TransferDst => vk::AccessFlags::TRANSFER_WRITE,
        }
    }

    /// Pipeline stage to wait on when leaving this layout.
    pub fn src_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            Self::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
            Self::TransferSrc | Self::TransferDst => vk::PipelineStageFlags::TRANSFER,
        }
    }

    /// Pipeline stage that must wait before entering this layout.
    pub fn dst_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            Self::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
            Self::TransferSrc | Self::TransferDst => vk::PipelineStageFlags::TRANSFER,
        }
    }
}

/// Subresource range covering every mip level and layer of a color image.
pub fn full_color_range(mip_levels: u32, layer_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: mip_levels,
        base_array_layer: 0,
        layer_count,
    }
}

/// Record a layout transition for `image` into `cmd`.
///
/// Transitions where `from == to` are skipped.
pub fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    from: ImageLayoutState,
    to: ImageLayoutState,
    range: vk::ImageSubresourceRange,
) {
    if from == to {
        return;
    }

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(from.to_vk())
        .new_layout(to.to_vk())
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(from.src_access_mask())
        .dst_access_mask(to.dst_access_mask());

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            from.src_stage(),
            to.dst_stage(),
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_to_vk() {
        assert_eq!(ImageLayoutState::Undefined.to_vk(), vk::ImageLayout::UNDEFINED);
        assert_eq!(
            ImageLayoutState::ColorAttachment.to_vk(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );
        assert_eq!(
            ImageLayoutState::ShaderReadOnly.to_vk(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
        assert_eq!(
            ImageLayoutState::TransferSrc.to_vk(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        );
        assert_eq!(
            ImageLayoutState::TransferDst.to_vk(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        );
    }

    #[test]
    fn test_undefined_has_no_source_access() {
        assert_eq!(
            ImageLayoutState::Undefined.src_access_mask(),
            vk::AccessFlags::empty()
        );
        assert_eq!(
            ImageLayoutState::Undefined.src_stage(),
            vk::PipelineStageFlags::TOP_OF_PIPE
        );
    }

    #[test]
    fn test_transfer_access_masks() {
        assert_eq!(
            ImageLayoutState::TransferSrc.dst_access_mask(),
            vk::AccessFlags::TRANSFER_READ
        );
        assert_eq!(
            ImageLayoutState::TransferDst.dst_access_mask(),
            vk::AccessFlags::TRANSFER_WRITE
        );
        assert_eq!(
            ImageLayoutState::TransferDst.src_access_mask(),
            vk::AccessFlags::TRANSFER_WRITE
        );
    }

    #[test]
    fn test_full_color_range() {
        let range = full_color_range(7, 6);
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(range.base_mip_level, 0);
        assert_eq!(range.level_count, 7);
        assert_eq!(range.base_array_layer, 0);
        assert_eq!(range.layer_count, 6);
    }
}
