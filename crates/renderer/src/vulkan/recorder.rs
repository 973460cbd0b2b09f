//! [`CommandRecorder`] writing into a Vulkan command buffer.

use std::sync::Arc;

use ash::vk;

use showcase_rhi::command::CommandBuffer;
use showcase_rhi::device::Device;

use super::context::{SharedResources, lock};
use crate::error::{RendererError, RendererResult};
use crate::handles::{DescriptorSetHandle, ModelHandle, PipelineHandle, PipelineLayoutHandle};
use crate::recorder::{CommandRecorder, Rect2D, RenderPassBegin, Viewport};

/// Images a frame renders into.
#[derive(Clone, Copy, Debug)]
pub struct RenderTarget {
    pub color_image: vk::Image,
    pub color_view: vk::ImageView,
    pub depth_image: vk::Image,
    pub depth_view: vk::ImageView,
}

/// Records one frame into a command buffer.
///
/// Color goes UNDEFINED -> COLOR_ATTACHMENT_OPTIMAL when the pass begins and
/// on to PRESENT_SRC_KHR when it ends.
pub struct VulkanRecorder {
    cmd: CommandBuffer,
    resources: SharedResources,
    target: RenderTarget,
    in_pass: bool,
}

impl VulkanRecorder {
    pub(super) fn new(
        device: Arc<Device>,
        cmd: vk::CommandBuffer,
        resources: SharedResources,
        target: RenderTarget,
    ) -> Self {
        Self {
            cmd: CommandBuffer::from_handle(device, cmd),
            resources,
            target,
            in_pass: false,
        }
    }

    fn require_pass(&self, what: &str) -> RendererResult<()> {
        if self.in_pass {
            Ok(())
        } else {
            Err(RendererError::Recording(format!(
                "{} outside a render pass",
                what
            )))
        }
    }
}

impl CommandRecorder for VulkanRecorder {
    fn begin(&mut self) -> RendererResult<()> {
        self.cmd.begin()?;
        Ok(())
    }

    fn begin_render_pass(&mut self, info: &RenderPassBegin) -> RendererResult<()> {
        if self.in_pass {
            return Err(RendererError::Recording(
                "render pass begun while another is open".to_string(),
            ));
        }

        self.cmd.transition_image_layout(
            self.target.color_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.target.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: info.clear.color,
                },
            });

        let depth_attachment = info.clear.depth_stencil.map(|(depth, stencil)| {
            vk::RenderingAttachmentInfo::default()
                .image_view(self.target.depth_view)
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                })
        });

        let render_area = Rect2D::full(info.extent).to_vk();
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        if let Some(depth_attachment) = depth_attachment.as_ref() {
            self.cmd.transition_image_layout(
                self.target.depth_image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                vk::ImageAspectFlags::DEPTH,
            );
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        self.cmd.begin_rendering(&rendering_info);
        self.in_pass = true;
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> RendererResult<()> {
        let viewports: Vec<vk::Viewport> = viewports.iter().map(|v| v.to_vk()).collect();
        self.cmd.set_viewports(&viewports);
        Ok(())
    }

    fn set_scissors(&mut self, scissors: &[Rect2D]) -> RendererResult<()> {
        let scissors: Vec<vk::Rect2D> = scissors.iter().map(|s| s.to_vk()).collect();
        self.cmd.set_scissors(&scissors);
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        layout: PipelineLayoutHandle,
        set: DescriptorSetHandle,
    ) -> RendererResult<()> {
        let resources = lock(&self.resources)?;
        let layout = resources
            .pipeline_layouts
            .get(&layout)
            .ok_or_else(|| RendererError::InvalidHandle(layout.to_string()))?;
        let set = resources
            .sets
            .get(&set)
            .ok_or_else(|| RendererError::InvalidHandle(set.to_string()))?;
        self.cmd.bind_descriptor_sets(layout.handle(), &[*set]);
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> RendererResult<()> {
        let resources = lock(&self.resources)?;
        let pipeline = resources
            .pipelines
            .get(&pipeline)
            .ok_or_else(|| RendererError::InvalidHandle(pipeline.to_string()))?;
        self.cmd.bind_graphics_pipeline(pipeline.handle());
        Ok(())
    }

    fn push_constants(
        &mut self,
        layout: PipelineLayoutHandle,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> RendererResult<()> {
        let resources = lock(&self.resources)?;
        let layout = resources
            .pipeline_layouts
            .get(&layout)
            .ok_or_else(|| RendererError::InvalidHandle(layout.to_string()))?;
        self.cmd.push_constants(layout.handle(), stages, offset, data);
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) -> RendererResult<()> {
        self.require_pass("draw")?;
        self.cmd.draw(vertex_count, instance_count);
        Ok(())
    }

    fn draw_model(&mut self, model: ModelHandle) -> RendererResult<()> {
        self.require_pass("draw_model")?;
        let resources = lock(&self.resources)?;
        let meshes = resources
            .models
            .get(&model)
            .ok_or_else(|| RendererError::InvalidHandle(model.to_string()))?;
        for mesh in meshes {
            self.cmd.bind_vertex_buffer(mesh.vertex_buffer.handle());
            self.cmd
                .bind_index_buffer(mesh.index_buffer.handle(), vk::IndexType::UINT32);
            self.cmd.draw_indexed(mesh.index_count, 1);
        }
        Ok(())
    }

    fn draw_mesh_tasks(&mut self, x: u32, y: u32, z: u32) -> RendererResult<()> {
        self.require_pass("draw_mesh_tasks")?;
        self.cmd.draw_mesh_tasks(x, y, z)?;
        Ok(())
    }

    fn end_render_pass(&mut self) -> RendererResult<()> {
        self.require_pass("end_render_pass")?;
        self.cmd.end_rendering();
        self.cmd.transition_image_layout(
            self.target.color_image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        );
        self.in_pass = false;
        Ok(())
    }

    fn end(&mut self) -> RendererResult<()> {
        if self.in_pass {
            return Err(RendererError::Recording(
                "end called with an open render pass".to_string(),
            ));
        }
        self.cmd.end()?;
        Ok(())
    }
}
