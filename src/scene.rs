//! Steady-state scene pipelines: skybox background and PBR geometry.
//!
//! Both pipelines share one layout and one vertex input layout and are
//! produced from a single [`PipelineBuilder`], which is reused between the
//! two constructions.

use ash::vk;

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::mesh::Vertex;
use crate::pipeline::{DepthStencilState, PipelineBuilder, RasterizationState};
use crate::shader::ShaderStage;

/// Shader stages for the two scene passes.
#[derive(Debug, Clone, Copy)]
pub struct SceneShaders {
    pub skybox_vert: ShaderStage,
    pub skybox_frag: ShaderStage,
    pub pbr_vert: ShaderStage,
    pub pbr_frag: ShaderStage,
}

/// The two scene pipelines and their shared layout.
pub struct ScenePipelines {
    pub layout: vk::PipelineLayout,
    pub skybox: vk::Pipeline,
    pub pbr: vk::Pipeline,
}

impl ScenePipelines {
    /// Build both pipelines against `render_pass`.
    ///
    /// The skybox is drawn from inside the cube, so it culls front faces and
    /// ignores depth. PBR geometry culls back faces with depth test and
    /// write enabled.
    pub fn new(
        ctx: &RenderContext,
        render_pass: vk::RenderPass,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        shaders: &SceneShaders,
    ) -> Result<Self, RenderError> {
        let device = ctx.device();
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(RenderError::creation("scene pipeline layout"))?;

        let mut builder = PipelineBuilder::new();
        builder.vertex_input(Vertex::input_layout());

        builder
            .rasterization(RasterizationState {
                cull_mode: vk::CullModeFlags::FRONT,
                ..Default::default()
            })
            .add_shader_stage(shaders.skybox_vert)
            .add_shader_stage(shaders.skybox_frag);
        let skybox = builder
            .build(device, render_pass, ctx.pipeline_cache(), layout)
            .map_err(|e| {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                e
            })?;

        builder
            .clear_shader_stages()
            .rasterization(RasterizationState::default())
            .depth_stencil(DepthStencilState {
                depth_test: true,
                depth_write: true,
                ..Default::default()
            })
            .add_shader_stage(shaders.pbr_vert)
            .add_shader_stage(shaders.pbr_frag);
        let pbr = builder
            .build(device, render_pass, ctx.pipeline_cache(), layout)
            .map_err(|e| {
                unsafe {
                    device.destroy_pipeline(skybox, None);
                    device.destroy_pipeline_layout(layout, None);
                }
                e
            })?;

        ctx.set_object_name(skybox, "pipeline.scene.skybox");
        ctx.set_object_name(pbr, "pipeline.scene.pbr");

        Ok(Self {
            layout,
            skybox,
            pbr,
        })
    }

    /// Destroy both pipelines and the shared layout.
    ///
    /// # Safety
    /// The pipelines must not be referenced by any pending command buffer.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        device.destroy_pipeline(self.pbr, None);
        device.destroy_pipeline(self.skybox, None);
        device.destroy_pipeline_layout(self.layout, None);
        self.pbr = vk::Pipeline::null();
        self.skybox = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
    }
}
