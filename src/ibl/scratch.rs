//! Scoped owners for the short-lived Vulkan objects a bake creates.
//!
//! Every intermediate object (render pass, offscreen target, descriptors,
//! pipeline, framebuffer) is wrapped in a guard whose `Drop` destroys it.
//! Declaring the guards in creation order makes teardown run in reverse
//! creation order on every exit path, including early `?` returns.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use log::warn;
use parking_lot::Mutex;

use crate::context::RenderContext;
use crate::error::RenderError;

pub struct ScopedRenderPass {
    device: ash::Device,
    raw: vk::RenderPass,
}

impl ScopedRenderPass {
    pub fn new(device: &ash::Device, raw: vk::RenderPass) -> Self {
        Self {
            device: device.clone(),
            raw,
        }
    }

    pub fn raw(&self) -> vk::RenderPass {
        self.raw
    }
}

impl Drop for ScopedRenderPass {
    fn drop(&mut self) {
        unsafe { self.device.destroy_render_pass(self.raw, None) };
    }
}

pub struct ScopedFramebuffer {
    device: ash::Device,
    raw: vk::Framebuffer,
}

impl ScopedFramebuffer {
    pub fn new(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Self, RenderError> {
        let views = [view];
        let info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let raw = unsafe { device.create_framebuffer(&info, None) }
            .map_err(RenderError::creation("bake framebuffer"))?;
        Ok(Self {
            device: device.clone(),
            raw,
        })
    }

    pub fn raw(&self) -> vk::Framebuffer {
        self.raw
    }
}

impl Drop for ScopedFramebuffer {
    fn drop(&mut self) {
        unsafe { self.device.destroy_framebuffer(self.raw, None) };
    }
}

/// Offscreen color target: image, backing allocation and 2D view.
pub struct ScopedImage {
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

impl ScopedImage {
    /// Create a single-mip, single-layer color target of side `dim`,
    /// usable as both render attachment and transfer source.
    pub fn offscreen_color(
        ctx: &RenderContext,
        format: vk::Format,
        dim: u32,
    ) -> Result<Self, RenderError> {
        let device = ctx.device();
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: dim,
                height: dim,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&image_info, None) }
            .map_err(RenderError::creation("offscreen bake image"))?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let allocation = ctx
            .allocator()
            .lock()
            .allocate(&AllocationCreateDesc {
                name: "ibl.offscreen",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                unsafe { device.destroy_image(image, None) };
                RenderError::Allocation(e.to_string())
            })?;

        if let Err(result) =
            unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
        {
            free_allocation(ctx.allocator(), allocation);
            unsafe { device.destroy_image(image, None) };
            return Err(RenderError::ResourceCreation {
                what: "offscreen bake image memory",
                result,
            });
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(crate::barrier::full_color_range(1, 1));
        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(result) => {
                free_allocation(ctx.allocator(), allocation);
                unsafe { device.destroy_image(image, None) };
                return Err(RenderError::ResourceCreation {
                    what: "offscreen bake image view",
                    result,
                });
            }
        };

        Ok(Self {
            device: device.clone(),
            allocator: Arc::clone(ctx.allocator()),
            image,
            view,
            allocation: Some(allocation),
        })
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ScopedImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            free_allocation(&self.allocator, allocation);
        }
    }
}

/// Descriptor pool, set layout and the single set allocated from them.
pub struct ScopedDescriptors {
    device: ash::Device,
    pool: vk::DescriptorPool,
    set_layout: vk::DescriptorSetLayout,
    set: vk::DescriptorSet,
}

impl ScopedDescriptors {
    /// One pool sized for one set with the given bindings. An empty binding
    /// list yields an empty (but valid) set, as the BRDF pass uses.
    pub fn new(
        device: &ash::Device,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> Result<Self, RenderError> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let set_layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(RenderError::creation("bake descriptor set layout"))?;

        let pool_sizes: Vec<vk::DescriptorPoolSize> = bindings
            .iter()
            .map(|b| vk::DescriptorPoolSize {
                ty: b.descriptor_type,
                descriptor_count: b.descriptor_count,
            })
            .collect();
        // VkDescriptorPoolCreateInfo forbids zero pool sizes; pad for the
        // descriptor-less case.
        let pool_sizes = if pool_sizes.is_empty() {
            vec![vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
            }]
        } else {
            pool_sizes
        };
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = match unsafe { device.create_descriptor_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(result) => {
                unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
                return Err(RenderError::ResourceCreation {
                    what: "bake descriptor pool",
                    result,
                });
            }
        };

        let layouts = [set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let set = match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets[0],
            Err(result) => {
                unsafe {
                    device.destroy_descriptor_pool(pool, None);
                    device.destroy_descriptor_set_layout(set_layout, None);
                }
                return Err(RenderError::ResourceCreation {
                    what: "bake descriptor set",
                    result,
                });
            }
        };

        Ok(Self {
            device: device.clone(),
            pool,
            set_layout,
            set,
        })
    }

    /// Point binding 0 at a combined image sampler.
    pub fn write_image(&self, info: &vk::DescriptorImageInfo) {
        let infos = [*info];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&infos);
        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
    }

    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}

impl Drop for ScopedDescriptors {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

/// Pipeline plus its layout.
pub struct ScopedPipeline {
    device: ash::Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl ScopedPipeline {
    pub fn new(device: &ash::Device, pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> Self {
        Self {
            device: device.clone(),
            pipeline,
            layout,
        }
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for ScopedPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn free_allocation(allocator: &Arc<Mutex<Allocator>>, allocation: Allocation) {
    if let Err(e) = allocator.lock().free(allocation) {
        warn!("leaked bake scratch allocation: {e}");
    }
}
