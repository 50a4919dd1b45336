//! Pipeline layout and graphics pipeline creation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::pipeline::{
//!     GraphicsPipelineBuilder, PipelineLayout, material_push_constant_range,
//! };
//! use meshview_rhi::shader::Shader;
//! use meshview_rhi::vertex::Vertex;
//! use ash::vk;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     set_layout: vk::DescriptorSetLayout,
//! #     render_pass: vk::RenderPass,
//! #     vert: &Shader,
//! #     frag: &Shader,
//! # ) -> meshview_rhi::RhiResult<()> {
//! let push_ranges = [material_push_constant_range()];
//! let layout = PipelineLayout::new(device.clone(), &[set_layout], &push_ranges)?;
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(vert)
//!     .fragment_shader(frag)
//!     .vertex_binding(Vertex::binding_description())
//!     .vertex_attributes(&Vertex::attribute_descriptions())
//!     .render_pass(render_pass, 0)
//!     .build(device, &layout)?;
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::handle::OwnedHandle;
use crate::shader::Shader;

/// Push constant range carrying the `u32` material index to the fragment stage.
pub fn material_push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::FRAGMENT)
        .offset(0)
        .size(std::mem::size_of::<u32>() as u32)
}

/// Pipeline layout.
pub struct PipelineLayout {
    inner: OwnedHandle<vk::PipelineLayout>,
}

impl PipelineLayout {
    /// Create a layout over `set_layouts` and `push_constant_ranges`.
    ///
    /// # Errors
    ///
    /// Returns the native error of `vkCreatePipelineLayout`.
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None) }
            .context("vkCreatePipelineLayout")?;

        debug!(
            "Created pipeline layout: {} set layout(s), {} push constant range(s)",
            set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, layout) },
        })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.inner.handle()
    }
}

/// Graphics pipeline.
pub struct Pipeline {
    inner: OwnedHandle<vk::Pipeline>,
}

impl Pipeline {
    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.inner.handle()
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

impl CullMode {
    /// Vulkan equivalent.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Winding of front-facing triangles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

impl FrontFace {
    /// Vulkan equivalent.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Builder for the fixed-function triangle-list pipeline.
///
/// Viewport and scissor are always dynamic. Depth test and write default to
/// on with `LESS`.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    cull_mode: CullMode,
    front_face: FrontFace,
    depth_test_enable: bool,
    depth_write_enable: bool,
    render_pass: vk::RenderPass,
    subpass: u32,
    dynamic_states: Vec<vk::DynamicState>,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Builder with back-face culling and depth test and write enabled.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_test_enable: true,
            depth_write_enable: true,
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
        }
    }

    /// Set the vertex stage.
    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    /// Set the fragment stage.
    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Add a vertex input binding.
    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    /// Append vertex attributes.
    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    /// Set face culling.
    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Set the front-face winding.
    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Enable or disable the depth test.
    pub fn depth_test_enable(mut self, enable: bool) -> Self {
        self.depth_test_enable = enable;
        self
    }

    /// Enable or disable depth writes.
    pub fn depth_write_enable(mut self, enable: bool) -> Self {
        self.depth_write_enable = enable;
        self
    }

    /// Render pass and subpass the pipeline will be used in.
    pub fn render_pass(mut self, render_pass: vk::RenderPass, subpass: u32) -> Self {
        self.render_pass = render_pass;
        self.subpass = subpass;
        self
    }

    /// Add a dynamic state. Duplicates are ignored.
    pub fn dynamic_state(mut self, state: vk::DynamicState) -> Self {
        if !self.dynamic_states.contains(&state) {
            self.dynamic_states.push(state);
        }
        self
    }

    /// Create the pipeline.
    ///
    /// # Errors
    ///
    /// [`RhiError::Precondition`] when a shader stage or the render pass is
    /// missing, or the native error from `vkCreateGraphicsPipelines`.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::Precondition("vertex shader is required".into()))?;
        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::Precondition("fragment shader is required".into()))?;
        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::Precondition(
                "graphics pipeline needs a render pass".into(),
            ));
        }

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test_enable)
            .depth_write_enable(self.depth_write_enable)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&self.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(self.render_pass)
            .subpass(self.subpass);

        let pipelines = unsafe {
            device.handle().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        }
        .map_err(|(_, result)| result)
        .context("vkCreateGraphicsPipelines")?;

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::Precondition("driver returned no pipeline".into()))?;

        debug!("Created graphics pipeline");

        Ok(Pipeline {
            inner: unsafe { OwnedHandle::from_raw(device, pipeline) },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_push_constant_range() {
        let range = material_push_constant_range();
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 4);
    }

    #[test]
    fn test_builder_defaults() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert_eq!(builder.cull_mode, CullMode::Back);
        assert_eq!(builder.front_face, FrontFace::CounterClockwise);
        assert!(builder.depth_test_enable);
        assert!(builder.depth_write_enable);
        assert_eq!(builder.render_pass, vk::RenderPass::null());
        assert_eq!(
            builder.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
    }

    #[test]
    fn test_dynamic_state_deduplicated() {
        let builder = GraphicsPipelineBuilder::new()
            .dynamic_state(vk::DynamicState::VIEWPORT)
            .dynamic_state(vk::DynamicState::LINE_WIDTH)
            .dynamic_state(vk::DynamicState::LINE_WIDTH);
        assert_eq!(builder.dynamic_states.len(), 3);
    }

    #[test]
    fn test_render_pass_and_subpass_recorded() {
        use ash::vk::Handle;
        let pass = vk::RenderPass::from_raw(0x42);
        let builder = GraphicsPipelineBuilder::new().render_pass(pass, 0);
        assert_eq!(builder.render_pass, pass);
        assert_eq!(builder.subpass, 0);
    }

    #[test]
    fn test_state_enums_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
        assert_eq!(FrontFace::default(), FrontFace::CounterClockwise);
    }
}
