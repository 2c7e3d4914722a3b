//! BRDF integration LUT baker.
//!
//! Renders the split-sum scale/bias terms for every (NdotV, roughness) pair
//! into a 512x512 two-channel float texture. The texture itself is the
//! render target; the render pass leaves it in `SHADER_READ_ONLY_OPTIMAL`,
//! so no copy is needed.

use std::time::Instant;

use ash::vk;
use log::info;

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::pipeline::{PipelineBuilder, RasterizationState};
use crate::shader::ShaderStage;
use crate::texture::Texture;

use super::scratch::{ScopedDescriptors, ScopedFramebuffer, ScopedPipeline, ScopedRenderPass};
use super::{create_bake_render_pass, BRDF_LUT_DIM, BRDF_LUT_FORMAT};

/// Bake the BRDF integration LUT with the given full-screen-triangle
/// shaders.
pub fn bake_brdf_lut(
    ctx: &RenderContext,
    vert: ShaderStage,
    frag: ShaderStage,
) -> Result<Texture, RenderError> {
    let start = Instant::now();
    let mut target = Texture::empty_2d(
        ctx,
        BRDF_LUT_FORMAT,
        BRDF_LUT_DIM,
        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
    )?;

    if let Err(e) = render(ctx, &target, vert, frag) {
        target.destroy(ctx);
        return Err(e);
    }

    ctx.set_object_name(target.image, "ibl.brdf_lut");
    info!(
        "baked {}x{} BRDF LUT in {:?}",
        BRDF_LUT_DIM,
        BRDF_LUT_DIM,
        start.elapsed()
    );
    Ok(target)
}

fn render(
    ctx: &RenderContext,
    target: &Texture,
    vert: ShaderStage,
    frag: ShaderStage,
) -> Result<(), RenderError> {
    let device = ctx.device();

    let render_pass = ScopedRenderPass::new(
        device,
        create_bake_render_pass(
            device,
            BRDF_LUT_FORMAT,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?,
    );
    let framebuffer = ScopedFramebuffer::new(device, render_pass.raw(), target.view, target.extent)?;

    // The shaders take no resources; the empty set keeps the layout shape
    // shared with the cube bakers.
    let descriptors = ScopedDescriptors::new(device, &[])?;
    let set_layouts = [descriptors.set_layout()];
    let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
    let pipeline_layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
        .map_err(RenderError::creation("BRDF LUT pipeline layout"))?;

    let mut builder = PipelineBuilder::new();
    builder
        .rasterization(RasterizationState {
            cull_mode: vk::CullModeFlags::NONE,
            ..Default::default()
        })
        .add_shader_stage(vert)
        .add_shader_stage(frag);
    let pipeline = builder
        .build(device, render_pass.raw(), ctx.pipeline_cache(), pipeline_layout)
        .map_err(|e| {
            unsafe { device.destroy_pipeline_layout(pipeline_layout, None) };
            e
        })?;
    let pipeline = ScopedPipeline::new(device, pipeline, pipeline_layout);

    let cmd = ctx.begin_one_shot()?;
    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: [0.0; 4],
        },
    }];
    let begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(render_pass.raw())
        .framebuffer(framebuffer.raw())
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        })
        .clear_values(&clear_values);

    unsafe {
        device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        device.cmd_set_viewport(
            cmd,
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: target.extent.width as f32,
                height: target.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        device.cmd_set_scissor(
            cmd,
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            }],
        );
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline());
        device.cmd_draw(cmd, 3, 1, 0, 0);
        device.cmd_end_render_pass(cmd);
    }

    ctx.flush(cmd)
}
