//! Single-subpass forward render pass with a color and a depth attachment.
//!
//! Color is cleared and ends in `PRESENT_SRC_KHR`; depth is cleared and
//! discarded. The external dependency orders the first color and depth
//! writes after the swapchain image is acquired.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};
use crate::handle::OwnedHandle;

/// Attachment index of the swapchain color image.
pub const COLOR_ATTACHMENT: u32 = 0;

/// Attachment index of the depth image.
pub const DEPTH_ATTACHMENT: u32 = 1;

/// Attachment descriptions in attachment-index order.
pub fn attachment_descriptions(
    color_format: vk::Format,
    depth_format: vk::Format,
) -> [vk::AttachmentDescription; 2] {
    [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ]
}

/// Dependency from the acquire to subpass 0.
pub fn external_dependency() -> vk::SubpassDependency {
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(stages)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
}

/// Render pass compatible with one color/depth format pair.
pub struct RenderPass {
    inner: OwnedHandle<vk::RenderPass>,
    color_format: vk::Format,
    depth_format: vk::Format,
}

impl RenderPass {
    /// Single-subpass pass clearing color and depth, presenting the color attachment.
    ///
    /// # Errors
    ///
    /// Returns the native error of `vkCreateRenderPass`.
    pub fn new(
        device: Arc<Device>,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let attachments = attachment_descriptions(color_format, depth_format);

        let color_refs = [vk::AttachmentReference::default()
            .attachment(COLOR_ATTACHMENT)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
        let depth_ref = vk::AttachmentReference::default()
            .attachment(DEPTH_ATTACHMENT)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        let dependencies = [external_dependency()];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None) }
            .context("vkCreateRenderPass")?;

        debug!(
            "Created render pass: color {:?}, depth {:?}",
            color_format, depth_format
        );

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, render_pass) },
            color_format,
            depth_format,
        })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.inner.handle()
    }

    /// Color attachment format.
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    /// Depth attachment format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_is_presented() {
        let [color, _] =
            attachment_descriptions(vk::Format::B8G8R8A8_SRGB, vk::Format::D32_SFLOAT);
        assert_eq!(color.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_depth_attachment_is_discarded() {
        let [_, depth] =
            attachment_descriptions(vk::Format::B8G8R8A8_SRGB, vk::Format::D24_UNORM_S8_UINT);
        assert_eq!(depth.format, vk::Format::D24_UNORM_S8_UINT);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(
            depth.final_layout,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        );
    }

    #[test]
    fn test_external_dependency_waits_for_color_output() {
        let dep = external_dependency();
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert!(
            dep.src_stage_mask
                .contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        );
        assert!(
            dep.dst_access_mask
                .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
    }
}
