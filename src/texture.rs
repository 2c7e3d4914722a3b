//! GPU textures backing the baked IBL assets.
//!
//! A [`Texture`] bundles the image, its memory allocation, the sampled view
//! and a sampler. Baked textures are created once on the preparation path,
//! are read-only afterwards, and are destroyed once at engine teardown.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::context::RenderContext;
use crate::error::RenderError;

/// A sampled GPU texture (2D or cube).
pub struct Texture {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    pub layer_count: u32,
    /// Ready-to-write descriptor in `SHADER_READ_ONLY_OPTIMAL`.
    pub descriptor: vk::DescriptorImageInfo,
    allocation: Option<Allocation>,
}

impl Texture {
    /// Create an empty single-mip 2D texture.
    pub fn empty_2d(
        ctx: &RenderContext,
        format: vk::Format,
        dim: u32,
        usage: vk::ImageUsageFlags,
    ) -> Result<Self, RenderError> {
        Self::create(ctx, format, dim, 1, 1, usage, vk::ImageCreateFlags::empty())
    }

    /// Create an empty 6-layer cube texture with `mip_levels` mips.
    pub fn empty_cube(
        ctx: &RenderContext,
        format: vk::Format,
        dim: u32,
        mip_levels: u32,
        usage: vk::ImageUsageFlags,
    ) -> Result<Self, RenderError> {
        Self::create(
            ctx,
            format,
            dim,
            mip_levels,
            6,
            usage,
            vk::ImageCreateFlags::CUBE_COMPATIBLE,
        )
    }

    fn create(
        ctx: &RenderContext,
        format: vk::Format,
        dim: u32,
        mip_levels: u32,
        layer_count: u32,
        usage: vk::ImageUsageFlags,
        flags: vk::ImageCreateFlags,
    ) -> Result<Self, RenderError> {
        let device = ctx.device();

        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: dim,
                height: dim,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(layer_count)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&image_info, None) }
            .map_err(RenderError::creation("texture image"))?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let allocation = ctx
            .allocator()
            .lock()
            .allocate(&AllocationCreateDesc {
                name: "texture",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| RenderError::Allocation(e.to_string()))?;

        // Past this point the image and allocation must be released by hand
        // on failure; the borrow of `allocation` ends with each call.
        let cleanup = |allocation: Allocation| {
            if let Err(e) = ctx.allocator().lock().free(allocation) {
                log::warn!("failed to free texture allocation: {}", e);
            }
            unsafe { device.destroy_image(image, None) };
        };

        if let Err(result) =
            unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
        {
            cleanup(allocation);
            return Err(RenderError::ResourceCreation {
                what: "texture memory binding",
                result,
            });
        }

        let view_type = if layer_count == 6 {
            vk::ImageViewType::CUBE
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count,
            });
        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(result) => {
                cleanup(allocation);
                return Err(RenderError::ResourceCreation {
                    what: "texture image view",
                    result,
                });
            }
        };

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .min_lod(0.0)
            .max_lod(mip_levels as f32)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE);
        let sampler = match unsafe { device.create_sampler(&sampler_info, None) } {
            Ok(sampler) => sampler,
            Err(result) => {
                unsafe { device.destroy_image_view(view, None) };
                cleanup(allocation);
                return Err(RenderError::ResourceCreation {
                    what: "texture sampler",
                    result,
                });
            }
        };

        let descriptor = vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };

        Ok(Self {
            image,
            view,
            sampler,
            format,
            extent: vk::Extent2D {
                width: dim,
                height: dim,
            },
            mip_levels,
            layer_count,
            descriptor,
            allocation: Some(allocation),
        })
    }

    /// Destroy the texture's resources and return its memory. Idempotent.
    pub fn destroy(&mut self, ctx: &RenderContext) {
        let device = ctx.device();
        unsafe {
            device.destroy_sampler(self.sampler, None);
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
        }
        self.sampler = vk::Sampler::null();
        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = ctx.allocator().lock().free(allocation) {
                log::warn!("failed to free texture allocation: {}", e);
            }
        }
    }
}
