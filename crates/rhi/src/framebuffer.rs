//! Framebuffers.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::handle::OwnedHandle;

/// Framebuffer with the extent it was created at.
pub struct Framebuffer {
    inner: OwnedHandle<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Create a single-layer framebuffer. `attachments` must follow the
    /// render pass attachment order.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::Precondition(
                "framebuffer extent must be nonzero".into(),
            ));
        }

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None) }
            .context("vkCreateFramebuffer")?;

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, framebuffer) },
            extent,
        })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.inner.handle()
    }

    /// Extent the framebuffer was created at.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}
