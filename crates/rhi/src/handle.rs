//! Owned device-child handles.
//!
//! Most Vulkan objects carry nothing but their handle and need only the
//! device to be destroyed. [`OwnedHandle`] covers all of them with one
//! type; objects that carry extra state (buffers, images, swapchains) wrap
//! an `OwnedHandle` or implement `Drop` themselves.

use std::fmt;
use std::sync::Arc;

use ash::vk;

use crate::device::Device;

/// A Vulkan handle destroyed through the logical device.
pub trait DeviceChild: vk::Handle + Copy {
    /// Short name used in logs.
    const KIND: &'static str;

    /// Destroy the object.
    ///
    /// # Safety
    ///
    /// `self` must have been created from `device`, must not be in use by
    /// the GPU, and must not be used again.
    unsafe fn destroy(self, device: &ash::Device);
}

macro_rules! device_child {
    ($ty:ty, $kind:literal, $destroy:ident) => {
        impl DeviceChild for $ty {
            const KIND: &'static str = $kind;

            unsafe fn destroy(self, device: &ash::Device) {
                unsafe { device.$destroy(self, None) };
            }
        }
    };
}

device_child!(vk::Semaphore, "semaphore", destroy_semaphore);
device_child!(vk::Fence, "fence", destroy_fence);
device_child!(vk::ImageView, "image view", destroy_image_view);
device_child!(vk::Framebuffer, "framebuffer", destroy_framebuffer);
device_child!(vk::RenderPass, "render pass", destroy_render_pass);
device_child!(vk::PipelineLayout, "pipeline layout", destroy_pipeline_layout);
device_child!(vk::Pipeline, "pipeline", destroy_pipeline);
device_child!(vk::ShaderModule, "shader module", destroy_shader_module);
device_child!(vk::Sampler, "sampler", destroy_sampler);
device_child!(vk::DescriptorSetLayout, "descriptor set layout", destroy_descriptor_set_layout);
device_child!(vk::DescriptorPool, "descriptor pool", destroy_descriptor_pool);
device_child!(vk::CommandPool, "command pool", destroy_command_pool);

/// Exclusive owner of a device child; destroys it on drop.
pub struct OwnedHandle<T: DeviceChild> {
    device: Arc<Device>,
    handle: T,
}

impl<T: DeviceChild> OwnedHandle<T> {
    /// Take ownership of `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must have been created from `device` and must not be owned
    /// elsewhere.
    pub unsafe fn from_raw(device: Arc<Device>, handle: T) -> Self {
        Self { device, handle }
    }

    /// Raw handle. Valid while `self` is alive.
    #[inline]
    pub fn handle(&self) -> T {
        self.handle
    }

    /// Device the handle belongs to.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl<T: DeviceChild> Drop for OwnedHandle<T> {
    fn drop(&mut self) {
        // SAFETY: from_raw guarantees sole ownership and the device is kept
        // alive by the Arc.
        unsafe { self.handle.destroy(self.device.handle()) };
        tracing::trace!("{} destroyed", T::KIND);
    }
}

impl<T: DeviceChild> fmt::Debug for OwnedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("kind", &T::KIND)
            .field("raw", &format_args!("{:#x}", self.handle.as_raw()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let kinds = [
            vk::Semaphore::KIND,
            vk::Fence::KIND,
            vk::ImageView::KIND,
            vk::Framebuffer::KIND,
            vk::RenderPass::KIND,
            vk::PipelineLayout::KIND,
            vk::Pipeline::KIND,
            vk::ShaderModule::KIND,
            vk::Sampler::KIND,
            vk::DescriptorSetLayout::KIND,
            vk::DescriptorPool::KIND,
            vk::CommandPool::KIND,
        ];
        let mut sorted = kinds.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), kinds.len());
    }

    #[test]
    fn test_owned_handle_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OwnedHandle<vk::Fence>>();
        assert_send_sync::<OwnedHandle<vk::Framebuffer>>();
    }
}
