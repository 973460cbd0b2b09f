//! Graphics pipeline creation.
//!
//! [`GraphicsPipelineBuilder`] covers the pipeline shapes the technique demos
//! need: a classic vertex pipeline (optionally with a geometry stage), or a
//! task/mesh pipeline, always followed by a fragment stage. Viewport and
//! scissor are dynamic; the viewport count is fixed at build time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use showcase_rhi::device::Device;
//! use showcase_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, PipelineLayout};
//! use showcase_rhi::shader::Shader;
//!
//! # fn example(device: Arc<Device>, vert: &Shader, geom: &Shader, frag: &Shader)
//! #     -> Result<(), showcase_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(vert)
//!     .geometry_shader(geom)
//!     .fragment_shader(frag)
//!     .viewport_count(2)
//!     .color_attachment_format(vk::Format::B8G8R8A8_SRGB)
//!     .depth_attachment_format(vk::Format::D32_SFLOAT)
//!     .cull_mode(CullMode::Back)
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout from descriptor set layouts and push
    /// constant ranges.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} descriptor set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Vulkan graphics pipeline wrapper, destroyed on drop.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    fn create_graphics_internal(
        device: Arc<Device>,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> RhiResult<Self> {
        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[*create_info], None)
                .map_err(|(_, result)| result)?
        };
        let pipeline = pipelines.into_iter().next().ok_or_else(|| {
            RhiError::PipelineError("Driver returned no pipeline".to_string())
        })?;

        info!("Graphics pipeline created");

        Ok(Self { device, pipeline })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

impl CullMode {
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

impl FrontFace {
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Geometry front end of a graphics pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryPath {
    /// Vertex stage, optionally followed by a geometry stage.
    Vertex { with_geometry: bool },
    /// Mesh stage, optionally preceded by a task stage.
    Mesh { with_task: bool },
}

/// Builder for graphics pipelines rendering through dynamic rendering.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    geometry_shader: Option<&'a Shader>,
    task_shader: Option<&'a Shader>,
    mesh_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,

    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,

    viewport_count: u32,
    cull_mode: CullMode,
    front_face: FrontFace,

    depth_test_enable: bool,
    depth_write_enable: bool,

    color_attachment_format: Option<vk::Format>,
    depth_attachment_format: Option<vk::Format>,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            geometry_shader: None,
            task_shader: None,
            mesh_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            viewport_count: 1,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_test_enable: true,
            depth_write_enable: true,
            color_attachment_format: None,
            depth_attachment_format: None,
        }
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn geometry_shader(mut self, shader: &'a Shader) -> Self {
        self.geometry_shader = Some(shader);
        self
    }

    pub fn task_shader(mut self, shader: &'a Shader) -> Self {
        self.task_shader = Some(shader);
        self
    }

    pub fn mesh_shader(mut self, shader: &'a Shader) -> Self {
        self.mesh_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    /// Number of viewports (and scissors) the pipeline renders to.
    pub fn viewport_count(mut self, count: u32) -> Self {
        self.viewport_count = count.max(1);
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    pub fn depth_test_enable(mut self, enable: bool) -> Self {
        self.depth_test_enable = enable;
        self
    }

    pub fn depth_write_enable(mut self, enable: bool) -> Self {
        self.depth_write_enable = enable;
        self
    }

    pub fn color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_attachment_format = Some(format);
        self
    }

    pub fn depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_attachment_format = Some(format);
        self
    }

    pub fn depth_attachment_format_opt(mut self, format: Option<vk::Format>) -> Self {
        self.depth_attachment_format = format;
        self
    }

    /// Works out which geometry front end the configured stages form.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] when both or neither of the vertex
    /// and mesh stages are set, or when a stage is set that does not belong
    /// to the chosen path.
    pub fn geometry_path(&self) -> RhiResult<GeometryPath> {
        match (self.vertex_shader.is_some(), self.mesh_shader.is_some()) {
            (true, false) => {
                if self.task_shader.is_some() {
                    return Err(RhiError::PipelineError(
                        "Task shader requires a mesh shader".to_string(),
                    ));
                }
                Ok(GeometryPath::Vertex {
                    with_geometry: self.geometry_shader.is_some(),
                })
            }
            (false, true) => {
                if self.geometry_shader.is_some() {
                    return Err(RhiError::PipelineError(
                        "Geometry shader cannot be combined with a mesh shader".to_string(),
                    ));
                }
                Ok(GeometryPath::Mesh {
                    with_task: self.task_shader.is_some(),
                })
            }
            (true, true) => Err(RhiError::PipelineError(
                "Vertex and mesh shaders are mutually exclusive".to_string(),
            )),
            (false, false) => Err(RhiError::PipelineError(
                "Either a vertex or a mesh shader is required".to_string(),
            )),
        }
    }

    /// Builds the graphics pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage combination is invalid, the fragment
    /// shader or color format is missing, or pipeline creation fails.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let path = self.geometry_path()?;

        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("Fragment shader is required".to_string()))?;

        let color_format = self.color_attachment_format.ok_or_else(|| {
            RhiError::PipelineError("A color attachment format is required".to_string())
        })?;

        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = [
            self.task_shader,
            self.mesh_shader,
            self.vertex_shader,
            self.geometry_shader,
            Some(fragment_shader),
        ]
        .into_iter()
        .flatten()
        .map(Shader::stage_create_info)
        .collect();

        debug!(
            "Building {:?} pipeline with {} stage(s), {} viewport(s)",
            path,
            shader_stages.len(),
            self.viewport_count
        );

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(self.viewport_count)
            .scissor_count(self.viewport_count);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk());

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let has_depth = self.depth_attachment_format.is_some();
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth && self.depth_test_enable)
            .depth_write_enable(has_depth && self.depth_write_enable)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend_state =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [color_format];
        let mut rendering_info =
            vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);
        if let Some(depth_format) = self.depth_attachment_format {
            rendering_info = rendering_info.depth_attachment_format(depth_format);
        }

        let mut pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        // Mesh pipelines take no vertex input or input assembly state.
        if let GeometryPath::Vertex { .. } = path {
            pipeline_info = pipeline_info
                .vertex_input_state(&vertex_input_state)
                .input_assembly_state(&input_assembly_state);
        }

        Pipeline::create_graphics_internal(device, &pipeline_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
        assert_eq!(CullMode::default(), CullMode::Back);
    }

    #[test]
    fn test_front_face_to_vk() {
        assert_eq!(
            FrontFace::CounterClockwise.to_vk(),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
    }

    #[test]
    fn test_builder_defaults() {
        let builder = GraphicsPipelineBuilder::new();
        assert_eq!(builder.viewport_count, 1);
        assert_eq!(builder.cull_mode, CullMode::Back);
        assert!(builder.depth_test_enable);
        assert!(builder.depth_write_enable);
        assert!(builder.color_attachment_format.is_none());
        assert!(builder.depth_attachment_format.is_none());
    }

    #[test]
    fn test_viewport_count_never_zero() {
        let builder = GraphicsPipelineBuilder::new().viewport_count(0);
        assert_eq!(builder.viewport_count, 1);
        let builder = GraphicsPipelineBuilder::new().viewport_count(2);
        assert_eq!(builder.viewport_count, 2);
    }

    #[test]
    fn test_geometry_path_requires_a_front_end() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(matches!(
            builder.geometry_path(),
            Err(RhiError::PipelineError(_))
        ));
    }

    #[test]
    fn test_depth_format_opt() {
        let builder =
            GraphicsPipelineBuilder::new().depth_attachment_format_opt(Some(vk::Format::D32_SFLOAT));
        assert_eq!(builder.depth_attachment_format, Some(vk::Format::D32_SFLOAT));
        let builder = builder.depth_attachment_format_opt(None);
        assert!(builder.depth_attachment_format.is_none());
    }
}
