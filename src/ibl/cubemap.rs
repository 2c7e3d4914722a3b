//! Irradiance and prefiltered-environment cube map bakers.
//!
//! Both bakers share one algorithm: render each cube face through a
//! face-oriented camera into a full-resolution offscreen target, then copy
//! the rendered square into the matching (layer, mip) region of the final
//! cube image. Only the fragment shader and the push-constant block differ
//! between the two kinds.

use std::time::Instant;

use ash::vk;
use bytemuck::{bytes_of, Pod, Zeroable};
use log::info;

use crate::barrier::{full_color_range, transition_image, ImageLayoutState};
use crate::context::RenderContext;
use crate::error::RenderError;
use crate::mesh::{CubeMesh, Vertex};
use crate::pipeline::{PipelineBuilder, RasterizationState};
use crate::shader::ShaderStage;
use crate::texture::Texture;

use super::scratch::{
    ScopedDescriptors, ScopedFramebuffer, ScopedImage, ScopedPipeline, ScopedRenderPass,
};
use super::{create_bake_render_pass, face_mvp, mip_level_count, roughness_for_mip, BakePlan};

/// Hemisphere sampling step around the azimuth, radians.
pub const IRRADIANCE_DELTA_PHI: f32 = 2.0 * std::f32::consts::PI / 180.0;
/// Hemisphere sampling step along the zenith, radians.
pub const IRRADIANCE_DELTA_THETA: f32 = 0.5 * std::f32::consts::PI / 64.0;
/// Importance samples per texel of the prefiltered map.
pub const PREFILTER_NUM_SAMPLES: u32 = 32;

/// Which of the two environment convolutions to bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeMapKind {
    /// Cosine-convolved diffuse irradiance, 64x64.
    Irradiance,
    /// GGX-prefiltered specular environment, 512x512, roughness per mip.
    Prefiltered,
}

impl CubeMapKind {
    pub fn format(self) -> vk::Format {
        match self {
            Self::Irradiance => vk::Format::R32G32B32A32_SFLOAT,
            Self::Prefiltered => vk::Format::R16G16B16A16_SFLOAT,
        }
    }

    pub fn dim(self) -> u32 {
        match self {
            Self::Irradiance => 64,
            Self::Prefiltered => 512,
        }
    }

    pub fn mip_level_count(self) -> u32 {
        mip_level_count(self.dim())
    }

    fn name(self) -> &'static str {
        match self {
            Self::Irradiance => "irradiance",
            Self::Prefiltered => "prefiltered environment",
        }
    }

    fn push_size(self) -> u32 {
        match self {
            Self::Irradiance => std::mem::size_of::<IrradiancePush>() as u32,
            Self::Prefiltered => std::mem::size_of::<PrefilterPush>() as u32,
        }
    }
}

// The matrix is stored as a column array rather than a Mat4 so the block
// has no alignment padding and stays `Pod`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct IrradiancePush {
    mvp: [[f32; 4]; 4],
    delta_phi: f32,
    delta_theta: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PrefilterPush {
    mvp: [[f32; 4]; 4],
    roughness: f32,
    num_samples: u32,
}

/// Bake one cube map of the given kind from the environment map `env`.
///
/// `vert` is the shared cube-projection vertex shader; `frag` selects the
/// convolution. The returned texture is in `SHADER_READ_ONLY_OPTIMAL` with
/// its full mip chain populated.
pub fn bake_cube_map(
    ctx: &RenderContext,
    kind: CubeMapKind,
    env: &Texture,
    skybox: &CubeMesh,
    vert: ShaderStage,
    frag: ShaderStage,
) -> Result<Texture, RenderError> {
    let start = Instant::now();
    let num_mips = kind.mip_level_count();
    let mut target = Texture::empty_cube(
        ctx,
        kind.format(),
        kind.dim(),
        num_mips,
        vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
    )?;

    if let Err(e) = render(ctx, kind, &target, env, skybox, vert, frag) {
        target.destroy(ctx);
        return Err(e);
    }

    ctx.set_object_name(
        target.image,
        match kind {
            CubeMapKind::Irradiance => "ibl.irradiance",
            CubeMapKind::Prefiltered => "ibl.prefiltered",
        },
    );
    info!(
        "baked {} cube ({}x{}, {} mips) in {:?}",
        kind.name(),
        kind.dim(),
        kind.dim(),
        num_mips,
        start.elapsed()
    );
    Ok(target)
}

fn render(
    ctx: &RenderContext,
    kind: CubeMapKind,
    target: &Texture,
    env: &Texture,
    skybox: &CubeMesh,
    vert: ShaderStage,
    frag: ShaderStage,
) -> Result<(), RenderError> {
    let device = ctx.device();
    let dim = kind.dim();
    let plan = BakePlan::new(dim);

    // The offscreen target is re-rendered every iteration, so the pass
    // leaves it in COLOR_ATTACHMENT_OPTIMAL rather than a sampled layout.
    let render_pass = ScopedRenderPass::new(
        device,
        create_bake_render_pass(device, kind.format(), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)?,
    );
    let offscreen = ScopedImage::offscreen_color(ctx, kind.format(), dim)?;
    let framebuffer = ScopedFramebuffer::new(
        device,
        render_pass.raw(),
        offscreen.view(),
        vk::Extent2D {
            width: dim,
            height: dim,
        },
    )?;

    // Put the offscreen image into a defined layout before the loop starts.
    let cmd = ctx.begin_one_shot()?;
    transition_image(
        device,
        cmd,
        offscreen.image(),
        ImageLayoutState::Undefined,
        ImageLayoutState::ColorAttachment,
        full_color_range(1, 1),
    );
    ctx.flush(cmd)?;

    let binding = vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::FRAGMENT);
    let descriptors = ScopedDescriptors::new(device, &[binding])?;
    descriptors.write_image(&env.descriptor);

    let push_range = vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: kind.push_size(),
    };
    let set_layouts = [descriptors.set_layout()];
    let push_ranges = [push_range];
    let layout_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_ranges);
    let pipeline_layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
        .map_err(RenderError::creation("cube bake pipeline layout"))?;

    let mut builder = PipelineBuilder::new();
    builder
        .vertex_input(Vertex::input_layout())
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
    let cube_range = full_color_range(plan.num_mips, 6);
    transition_image(
        device,
        cmd,
        target.image,
        ImageLayoutState::Undefined,
        ImageLayoutState::TransferDst,
        cube_range,
    );

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: [0.0, 0.0, 0.2, 0.0],
        },
    }];
    let full_extent = vk::Extent2D {
        width: dim,
        height: dim,
    };
    unsafe {
        device.cmd_set_scissor(
            cmd,
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: full_extent,
            }],
        );
    }

    for step in plan.steps() {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.raw())
            .framebuffer(framebuffer.raw())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: full_extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_set_viewport(
                cmd,
                0,
                &[vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: step.extent.width as f32,
                    height: step.extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                }],
            );
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);

            let mvp = face_mvp(step.face).to_cols_array_2d();
            match kind {
                CubeMapKind::Irradiance => {
                    let push = IrradiancePush {
                        mvp,
                        delta_phi: IRRADIANCE_DELTA_PHI,
                        delta_theta: IRRADIANCE_DELTA_THETA,
                    };
                    device.cmd_push_constants(
                        cmd,
                        pipeline.layout(),
                        push_range.stage_flags,
                        0,
                        bytes_of(&push),
                    );
                }
                CubeMapKind::Prefiltered => {
                    let push = PrefilterPush {
                        mvp,
                        roughness: roughness_for_mip(step.mip, plan.num_mips),
                        num_samples: PREFILTER_NUM_SAMPLES,
                    };
                    device.cmd_push_constants(
                        cmd,
                        pipeline.layout(),
                        push_range.stage_flags,
                        0,
                        bytes_of(&push),
                    );
                }
            }

            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline());
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout(),
                0,
                &[descriptors.set()],
                &[],
            );
            skybox.draw(device, cmd);
            device.cmd_end_render_pass(cmd);
        }

        // Move the rendered square into its (layer, mip) slot of the cube.
        transition_image(
            device,
            cmd,
            offscreen.image(),
            ImageLayoutState::ColorAttachment,
            ImageLayoutState::TransferSrc,
            full_color_range(1, 1),
        );

        let copy = vk::ImageCopy {
            src_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            src_offset: vk::Offset3D::default(),
            dst_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: step.mip,
                base_array_layer: step.face as u32,
                layer_count: 1,
            },
            dst_offset: vk::Offset3D::default(),
            extent: vk::Extent3D {
                width: step.extent.width,
                height: step.extent.height,
                depth: 1,
            },
        };
        unsafe {
            device.cmd_copy_image(
                cmd,
                offscreen.image(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                target.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[copy],
            );
        }

        transition_image(
            device,
            cmd,
            offscreen.image(),
            ImageLayoutState::TransferSrc,
            ImageLayoutState::ColorAttachment,
            full_color_range(1, 1),
        );
    }

    transition_image(
        device,
        cmd,
        target.image,
        ImageLayoutState::TransferDst,
        ImageLayoutState::ShaderReadOnly,
        cube_range,
    );
    ctx.flush(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CubeMapKind::Irradiance, vk::Format::R32G32B32A32_SFLOAT, 64, 7)]
    #[case(CubeMapKind::Prefiltered, vk::Format::R16G16B16A16_SFLOAT, 512, 10)]
    fn test_kind_parameters(
        #[case] kind: CubeMapKind,
        #[case] format: vk::Format,
        #[case] dim: u32,
        #[case] mips: u32,
    ) {
        assert_eq!(kind.format(), format);
        assert_eq!(kind.dim(), dim);
        assert_eq!(kind.mip_level_count(), mips);
    }

    #[test]
    fn test_push_blocks_fit_guaranteed_push_constant_space() {
        // Both blocks are the mvp plus two scalars and must stay within
        // the 128-byte minimum maxPushConstantsSize.
        assert_eq!(std::mem::size_of::<IrradiancePush>(), 72);
        assert_eq!(std::mem::size_of::<PrefilterPush>(), 72);
        assert!(CubeMapKind::Irradiance.push_size() <= 128);
        assert!(CubeMapKind::Prefiltered.push_size() <= 128);
    }

    #[test]
    fn test_sampling_constants() {
        assert!((IRRADIANCE_DELTA_PHI - 0.034906585).abs() < 1e-6);
        assert!((IRRADIANCE_DELTA_THETA - 0.024543693).abs() < 1e-6);
        assert_eq!(PREFILTER_NUM_SAMPLES, 32);
    }
}
