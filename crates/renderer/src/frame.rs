//! Per-frame-slot resources.
//!
//! Each slot owns a command buffer and the semaphore/semaphore/fence triple
//! that orders its acquire, submit and present:
//!
//! ```text
//! 1. Wait on in_flight fence (host waits for the slot's previous submit)
//! 2. Acquire swapchain image (signals image_available)
//! 3. Reset fence and command buffer, record
//! 4. Submit: wait image_available at COLOR_ATTACHMENT_OUTPUT,
//!    signal render_finished and in_flight
//! 5. Present (waits on render_finished)
//! ```

use std::sync::Arc;

use meshview_rhi::command::{CommandBuffer, CommandPool};
use meshview_rhi::device::Device;
use meshview_rhi::sync::FrameSync;
use meshview_rhi::{RhiResult, vk};
use tracing::debug;

/// Where a slot is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    /// Fence signaled; resources may be touched by the host.
    #[default]
    Idle,
    /// Command buffer is being recorded.
    Recording,
    /// Submitted; the GPU may still be using the slot's resources.
    Submitted,
}

/// Command buffer and synchronization objects of one frame in flight.
pub struct FrameSlot {
    command_buffer: CommandBuffer,
    sync: FrameSync,
}

impl FrameSlot {
    /// Allocate a slot. Its fence starts signaled.
    pub fn new(device: Arc<Device>, command_pool: &CommandPool) -> RhiResult<Self> {
        Ok(Self {
            command_buffer: CommandBuffer::new(device.clone(), command_pool)?,
            sync: FrameSync::new(device)?,
        })
    }

    /// Allocate `count` slots up front.
    pub fn create_all(
        device: &Arc<Device>,
        command_pool: &CommandPool,
        count: usize,
    ) -> RhiResult<Vec<Self>> {
        (0..count)
            .map(|i| {
                debug!("Creating frame slot {}", i);
                Self::new(device.clone(), command_pool)
            })
            .collect()
    }

    /// Command buffer re-recorded every time this slot is used.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    /// Semaphores and in-flight fence of this slot.
    #[inline]
    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }

    /// Block until the slot's last submission has completed.
    pub fn wait(&self) -> RhiResult<()> {
        self.sync.in_flight_fence().wait()
    }

    /// Reset the fence and command buffer and begin recording.
    ///
    /// Only valid after [`wait`](Self::wait) and once a submission is certain
    /// to follow; a reset fence that is never submitted would block the next
    /// wait on this slot forever.
    pub fn begin(&self) -> RhiResult<()> {
        self.sync.in_flight_fence().reset()?;
        self.command_buffer.reset()?;
        self.command_buffer.begin()
    }

    /// Submit the recorded commands to the graphics queue.
    pub fn submit(&self, device: &Device) -> RhiResult<()> {
        let wait_semaphores = [self.sync.image_available_semaphore().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished_semaphore().handle()];
        let command_buffers = [self.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer was fully recorded by the caller and the fence
        // was reset in `begin`.
        unsafe {
            device.submit_graphics(
                std::slice::from_ref(&submit_info),
                self.sync.in_flight_fence().handle(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_state_default_is_idle() {
        assert_eq!(SlotState::default(), SlotState::Idle);
    }

    #[test]
    fn test_frame_slot_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameSlot>();
    }
}
