//! Command pool and command buffer management.
//!
//! - [`CommandPool`] owns a `VkCommandPool` and allocates buffers from it
//! - [`CommandBuffer`] wraps a `VkCommandBuffer` with recording methods
//! - [`GraphicsCommands`] is the subset of recording used to draw a frame,
//!   so draw recording can run against a recording double in tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::command::{CommandBuffer, CommandPool};
//!
//! # fn example(device: Arc<Device>) -> meshview_rhi::RhiResult<()> {
//! let pool = CommandPool::new(device.clone(), device.queue_families().graphics)?;
//! let cmd = CommandBuffer::new(device, &pool)?;
//!
//! cmd.begin()?;
//! // ... record ...
//! cmd.end()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::handle::OwnedHandle;

/// Vulkan command pool.
///
/// Buffers allocated from the pool are freed when the pool is destroyed.
/// Not thread-safe: record from one thread per pool.
pub struct CommandPool {
    inner: OwnedHandle<vk::CommandPool>,
    queue_family_index: u32,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Create a pool for short-lived one-time-submit buffers.
    pub fn new_transient(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                | vk::CommandPoolCreateFlags::TRANSIENT,
        )
    }

    fn with_flags(
        device: Arc<Device>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(flags);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None) }
            .context("vkCreateCommandPool")?;

        debug!(
            "Command pool created for queue family {} ({:?})",
            queue_family_index, flags
        );

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, pool) },
            queue_family_index,
        })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.inner.handle()
    }

    /// Queue family the pool's buffers are submitted to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Device the pool belongs to.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        self.inner.device()
    }

    /// Allocate `count` primary command buffers.
    pub fn allocate_command_buffers(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device().handle().allocate_command_buffers(&alloc_info) }
            .context("vkAllocateCommandBuffers")
    }

    /// Allocate one primary command buffer.
    pub fn allocate_command_buffer(&self) -> RhiResult<vk::CommandBuffer> {
        self.allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::Precondition("driver returned no command buffer".into()))
    }

    /// Record `record` into a fresh buffer, submit it to the graphics queue
    /// and wait for the queue to go idle.
    ///
    /// Used for staging uploads and layout transitions at load time.
    pub fn submit_once<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        let device = self.device().clone();
        let cmd = CommandBuffer::new(device.clone(), self)?;

        let result = (|| {
            cmd.begin()?;
            record(&cmd)?;
            cmd.end()?;

            let buffers = [cmd.handle()];
            let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
            unsafe {
                device.submit_graphics(std::slice::from_ref(&submit_info), vk::Fence::null())
            }?;
            device.graphics_queue_wait_idle()
        })();

        unsafe {
            device
                .handle()
                .free_command_buffers(self.handle(), &[cmd.handle()]);
        }

        result
    }
}

/// Commands needed to draw one frame of the textured mesh.
///
/// Implemented by [`CommandBuffer`]; tests implement it with a recorder.
pub trait GraphicsCommands {
    /// Begin `render_pass` on `framebuffer` covering `extent`.
    fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );

    /// End the current render pass.
    fn end_render_pass(&self);

    /// Bind a graphics pipeline.
    fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline);

    /// Set viewport 0.
    fn set_viewport(&self, viewport: vk::Viewport);

    /// Set scissor 0.
    fn set_scissor(&self, scissor: vk::Rect2D);

    /// Update push constants.
    fn push_constants(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    /// Bind `buffer` to vertex binding 0.
    fn bind_vertex_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize);

    /// Bind an index buffer starting at byte `offset`.
    fn bind_index_buffer(
        &self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    );

    /// Bind descriptor set 0 for the graphics bind point.
    fn bind_descriptor_set(&self, layout: vk::PipelineLayout, set: vk::DescriptorSet);

    /// Indexed draw of a single instance.
    fn draw_indexed(&self, index_count: u32, first_index: u32, vertex_offset: i32);
}

/// Vulkan command buffer.
///
/// Does not own the handle; it is freed with its [`CommandPool`].
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Allocate a primary buffer from `pool`.
    pub fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let buffer = pool.allocate_command_buffer()?;
        Ok(Self { device, buffer })
    }

    /// Wrap a buffer allocated elsewhere.
    #[inline]
    pub fn from_handle(device: Arc<Device>, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Begin one-time-submit recording.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)
        }
        .context("vkBeginCommandBuffer")
    }

    /// Finish recording.
    pub fn end(&self) -> RhiResult<()> {
        unsafe { self.device.handle().end_command_buffer(self.buffer) }
            .context("vkEndCommandBuffer")
    }

    /// Return to the initial state. The buffer must not be pending.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())
        }
        .context("vkResetCommandBuffer")
    }

    /// Buffer-to-buffer copy.
    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe {
            self.device
                .handle()
                .cmd_copy_buffer(self.buffer, src, dst, regions);
        }
    }

    /// Buffer-to-image copy.
    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                dst,
                dst_layout,
                regions,
            );
        }
    }

    /// Scaled image copy.
    pub fn blit_image(
        &self,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        unsafe {
            self.device.handle().cmd_blit_image(
                self.buffer,
                src,
                src_layout,
                dst,
                dst_layout,
                regions,
                filter,
            );
        }
    }

    /// Pipeline barrier with image barriers only.
    pub fn pipeline_barrier(
        &self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.handle().cmd_pipeline_barrier(
                self.buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            );
        }
    }
}

impl GraphicsCommands for CommandBuffer {
    fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    fn end_render_pass(&self) {
        unsafe {
            self.device.handle().cmd_end_render_pass(self.buffer);
        }
    }

    fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    fn set_viewport(&self, viewport: vk::Viewport) {
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, &[viewport]);
        }
    }

    fn set_scissor(&self, scissor: vk::Rect2D) {
        unsafe {
            self.device
                .handle()
                .cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }

    fn push_constants(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .handle()
                .cmd_push_constants(self.buffer, layout, stages, offset, data);
        }
    }

    fn bind_vertex_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[offset]);
        }
    }

    fn bind_index_buffer(
        &self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_index_buffer(self.buffer, buffer, offset, index_type);
        }
    }

    fn bind_descriptor_set(&self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn draw_indexed(&self, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe {
            self.device.handle().cmd_draw_indexed(
                self.buffer,
                index_count,
                1,
                first_index,
                vertex_offset,
                0,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandBuffer>();
    }

    #[test]
    fn test_command_pool_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandPool>();
    }

    #[test]
    fn test_graphics_commands_is_object_safe() {
        fn takes_dyn(_: &dyn GraphicsCommands) {}
        let _ = takes_dyn;
    }
}
