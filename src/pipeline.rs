//! Graphics pipeline configuration builder.
//!
//! The builder accumulates pipeline sub-state with engine-standard defaults
//! and assembles a complete `VkGraphicsPipelineCreateInfo` in one call.
//! Callers only override what differs from the common case:
//!
//! ```ignore
//! let pipeline = PipelineBuilder::new()
//!     .rasterization(RasterizationState {
//!         cull_mode: vk::CullModeFlags::FRONT,
//!         ..Default::default()
//!     })
//!     .vertex_input(Vertex::input_layout())
//!     .add_shader_stage(vert)
//!     .add_shader_stage(frag)
//!     .build(device, render_pass, pipeline_cache, pipeline_layout)?;
//! ```
//!
//! The builder is plain data: it holds no Vulkan objects of its own and may
//! be reused for any number of `build` calls. Shader stages are NOT cleared
//! automatically between builds; call [`PipelineBuilder::clear_shader_stages`]
//! when moving on to an unrelated pipeline.

use ash::vk;

use crate::error::RenderError;
use crate::mesh::VertexInputLayout;
use crate::shader::{ShaderStage, SHADER_ENTRY};

/// Input assembly sub-state. Default: triangle list, no primitive restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputAssemblyState {
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
}

impl Default for InputAssemblyState {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
        }
    }
}

/// Rasterization sub-state. Default: filled polygons, back-face culling,
/// counter-clockwise front face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizationState {
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        }
    }
}

/// Single color attachment blend sub-state. Default: all channels written,
/// blending disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendAttachmentState {
    pub write_mask: vk::ColorComponentFlags,
    pub blend_enable: bool,
}

impl Default for ColorBlendAttachmentState {
    fn default() -> Self {
        Self {
            write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: false,
        }
    }
}

/// Depth/stencil sub-state. Default: depth test and write disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare_op: vk::CompareOp,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            compare_op: vk::CompareOp::LESS_OR_EQUAL,
        }
    }
}

/// Viewport sub-state; only counts, the rectangles themselves are dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportState {
    pub viewport_count: u32,
    pub scissor_count: u32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            viewport_count: 1,
            scissor_count: 1,
        }
    }
}

/// Multisample sub-state. Default: no multisampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultisampleState {
    pub samples: vk::SampleCountFlags,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }
}

/// Accumulates pipeline sub-state and assembles pipelines on demand.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    input_assembly: InputAssemblyState,
    rasterization: RasterizationState,
    color_blend_attachment: ColorBlendAttachmentState,
    depth_stencil: DepthStencilState,
    viewport: ViewportState,
    multisample: MultisampleState,
    dynamic_states: Vec<vk::DynamicState>,
    vertex_input: VertexInputLayout,
    shader_stages: Vec<ShaderStage>,
}

/// Fully-resolved snapshot of the state a `build` call would submit.
///
/// Exists so the assembled configuration can be inspected without a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPipelineState {
    pub input_assembly: InputAssemblyState,
    pub rasterization: RasterizationState,
    pub color_blend_attachment: ColorBlendAttachmentState,
    pub depth_stencil: DepthStencilState,
    pub viewport: ViewportState,
    pub multisample: MultisampleState,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub vertex_binding_count: usize,
    pub vertex_attribute_count: usize,
    pub stage_count: usize,
}

impl PipelineBuilder {
    /// A builder with every sub-state at its default.
    pub fn new() -> Self {
        Self {
            input_assembly: InputAssemblyState::default(),
            rasterization: RasterizationState::default(),
            color_blend_attachment: ColorBlendAttachmentState::default(),
            depth_stencil: DepthStencilState::default(),
            viewport: ViewportState::default(),
            multisample: MultisampleState::default(),
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            vertex_input: VertexInputLayout::default(),
            shader_stages: Vec::new(),
        }
    }

    pub fn input_assembly(&mut self, state: InputAssemblyState) -> &mut Self {
        self.input_assembly = state;
        self
    }

    pub fn rasterization(&mut self, state: RasterizationState) -> &mut Self {
        self.rasterization = state;
        self
    }

    pub fn color_blend_attachment(&mut self, state: ColorBlendAttachmentState) -> &mut Self {
        self.color_blend_attachment = state;
        self
    }

    pub fn depth_stencil(&mut self, state: DepthStencilState) -> &mut Self {
        self.depth_stencil = state;
        self
    }

    pub fn viewport_counts(&mut self, state: ViewportState) -> &mut Self {
        self.viewport = state;
        self
    }

    pub fn multisample(&mut self, state: MultisampleState) -> &mut Self {
        self.multisample = state;
        self
    }

    /// Replace the list of state categories deferred to command recording.
    pub fn dynamic_states(&mut self, states: &[vk::DynamicState]) -> &mut Self {
        self.dynamic_states = states.to_vec();
        self
    }

    /// Set the vertex input layout. An empty layout (the default) means no
    /// vertex input, as used by the full-screen-triangle pass.
    pub fn vertex_input(&mut self, layout: VertexInputLayout) -> &mut Self {
        self.vertex_input = layout;
        self
    }

    /// Append one shader stage. Stages persist across `build` calls.
    pub fn add_shader_stage(&mut self, stage: ShaderStage) -> &mut Self {
        self.shader_stages.push(stage);
        self
    }

    /// Empty the shader stage list. Must be called before reusing the
    /// builder for a logically distinct pipeline.
    pub fn clear_shader_stages(&mut self) -> &mut Self {
        self.shader_stages.clear();
        self
    }

    /// Restore every sub-state to its default and clear shader stages.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn shader_stages(&self) -> &[ShaderStage] {
        &self.shader_stages
    }

    /// Snapshot the state that `build` would submit.
    pub fn resolve(&self) -> ResolvedPipelineState {
        ResolvedPipelineState {
            input_assembly: self.input_assembly,
            rasterization: self.rasterization,
            color_blend_attachment: self.color_blend_attachment,
            depth_stencil: self.depth_stencil,
            viewport: self.viewport,
            multisample: self.multisample,
            dynamic_states: self.dynamic_states.clone(),
            vertex_binding_count: self.vertex_input.bindings.len(),
            vertex_attribute_count: self.vertex_input.attributes.len(),
            stage_count: self.shader_stages.len(),
        }
    }

    /// Assemble the creation request from the current sub-states and submit
    /// it. The builder is unchanged and immediately reusable.
    pub fn build(
        &self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        pipeline_cache: vk::PipelineCache,
        pipeline_layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline, RenderError> {
        let stages: Vec<vk::PipelineShaderStageCreateInfo> = self
            .shader_stages
            .iter()
            .map(|s| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(s.stage)
                    .module(s.module)
                    .name(SHADER_ENTRY)
            })
            .collect();

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.input_assembly.topology)
            .primitive_restart_enable(self.input_assembly.primitive_restart);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(self.rasterization.polygon_mode)
            .cull_mode(self.rasterization.cull_mode)
            .front_face(self.rasterization.front_face)
            .line_width(1.0);

        // The attachment array and the aggregate blend state are derived
        // together here, so the aggregate can never refer to a stale
        // attachment descriptor.
        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(self.color_blend_attachment.write_mask)
            .blend_enable(self.color_blend_attachment.blend_enable)];
        let color_blend_state =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_stencil.depth_test)
            .depth_write_enable(self.depth_stencil.depth_write)
            .depth_compare_op(self.depth_stencil.compare_op);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(self.viewport.viewport_count)
            .scissor_count(self.viewport.scissor_count);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(self.multisample.samples);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&self.dynamic_states);

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_input.bindings)
            .vertex_attribute_descriptions(&self.vertex_input.attributes);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .rasterization_state(&rasterization_state)
            .color_blend_state(&color_blend_state)
            .depth_stencil_state(&depth_stencil_state)
            .viewport_state(&viewport_state)
            .multisample_state(&multisample_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass);

        let pipelines = unsafe {
            device.create_graphics_pipelines(pipeline_cache, &[pipeline_info], None)
        }
        .map_err(|(_, e)| RenderError::PipelineCreation(e))?;

        Ok(pipelines[0])
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn mock_stage(stage: vk::ShaderStageFlags, raw: u64) -> ShaderStage {
        ShaderStage {
            module: vk::ShaderModule::from_raw(raw),
            stage,
        }
    }

    #[test]
    fn test_default_state() {
        let resolved = PipelineBuilder::new().resolve();
        assert_eq!(
            resolved.input_assembly.topology,
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert!(!resolved.input_assembly.primitive_restart);
        assert_eq!(resolved.rasterization.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(
            resolved.rasterization.front_face,
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(
            resolved.color_blend_attachment.write_mask,
            vk::ColorComponentFlags::RGBA
        );
        assert!(!resolved.color_blend_attachment.blend_enable);
        assert!(!resolved.depth_stencil.depth_test);
        assert!(!resolved.depth_stencil.depth_write);
        assert_eq!(resolved.viewport.viewport_count, 1);
        assert_eq!(resolved.viewport.scissor_count, 1);
        assert_eq!(resolved.multisample.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(
            resolved.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(resolved.vertex_binding_count, 0);
        assert_eq!(resolved.vertex_attribute_count, 0);
        assert_eq!(resolved.stage_count, 0);
    }

    #[test]
    fn test_two_stages_leave_other_state_default() {
        let mut builder = PipelineBuilder::new();
        builder
            .add_shader_stage(mock_stage(vk::ShaderStageFlags::VERTEX, 1))
            .add_shader_stage(mock_stage(vk::ShaderStageFlags::FRAGMENT, 2));

        let resolved = builder.resolve();
        assert_eq!(resolved.stage_count, 2);
        // Everything else stays at the documented defaults.
        let defaults = PipelineBuilder::new().resolve();
        assert_eq!(resolved.input_assembly, defaults.input_assembly);
        assert_eq!(resolved.rasterization, defaults.rasterization);
        assert_eq!(resolved.depth_stencil, defaults.depth_stencil);
        assert_eq!(resolved.dynamic_states, defaults.dynamic_states);
    }

    #[test]
    fn test_stages_persist_across_builds() {
        let mut builder = PipelineBuilder::new();
        builder
            .add_shader_stage(mock_stage(vk::ShaderStageFlags::VERTEX, 1))
            .add_shader_stage(mock_stage(vk::ShaderStageFlags::FRAGMENT, 2));

        // A second resolve without clear_shader_stages sees the same list:
        // the builder does not auto-clear between pipeline constructions.
        assert_eq!(builder.resolve().stage_count, 2);
        builder.rasterization(RasterizationState {
            cull_mode: vk::CullModeFlags::FRONT,
            ..Default::default()
        });
        assert_eq!(builder.resolve().stage_count, 2);
    }

    #[test]
    fn test_clear_shader_stages() {
        let mut builder = PipelineBuilder::new();
        builder.add_shader_stage(mock_stage(vk::ShaderStageFlags::VERTEX, 1));
        builder.clear_shader_stages();
        assert_eq!(builder.resolve().stage_count, 0);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut builder = PipelineBuilder::new();
        builder
            .rasterization(RasterizationState {
                cull_mode: vk::CullModeFlags::NONE,
                ..Default::default()
            })
            .depth_stencil(DepthStencilState {
                depth_test: true,
                depth_write: true,
                ..Default::default()
            })
            .add_shader_stage(mock_stage(vk::ShaderStageFlags::VERTEX, 1));

        builder.reset();
        assert_eq!(builder.resolve(), PipelineBuilder::new().resolve());
    }

    #[test]
    fn test_setters_are_chainable() {
        let mut builder = PipelineBuilder::new();
        builder
            .input_assembly(InputAssemblyState::default())
            .rasterization(RasterizationState::default())
            .color_blend_attachment(ColorBlendAttachmentState::default())
            .depth_stencil(DepthStencilState::default())
            .viewport_counts(ViewportState::default())
            .multisample(MultisampleState::default())
            .dynamic_states(&[vk::DynamicState::VIEWPORT]);
        assert_eq!(builder.resolve().dynamic_states.len(), 1);
    }
}
