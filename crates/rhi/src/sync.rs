//! Synchronization primitives.
//!
//! - [`Semaphore`]: GPU-side ordering between acquire, submit and present
//! - [`Fence`]: lets the host wait for a submission to finish
//! - [`FrameSync`]: the semaphore/semaphore/fence triple owned by one frame slot
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::sync::FrameSync;
//!
//! # fn example(device: Arc<Device>) -> meshview_rhi::RhiResult<()> {
//! let sync = FrameSync::new(device)?;
//! sync.in_flight_fence().wait()?;
//! sync.in_flight_fence().reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};
use crate::handle::OwnedHandle;

/// Binary semaphore, created unsignaled.
pub struct Semaphore {
    inner: OwnedHandle<vk::Semaphore>,
}

impl Semaphore {
    /// Create an unsignaled semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None) }
            .context("vkCreateSemaphore")?;

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, semaphore) },
        })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.inner.handle()
    }
}

/// Host-waitable fence.
pub struct Fence {
    inner: OwnedHandle<vk::Fence>,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    ///
    /// Frame-slot fences start signaled so the first wait on each slot
    /// returns immediately.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None) }
            .context("vkCreateFence")?;

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, fence) },
        })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.inner.handle()
    }

    /// Block until signaled. No timeout.
    pub fn wait(&self) -> RhiResult<()> {
        let fences = [self.handle()];
        unsafe {
            self.inner
                .device()
                .handle()
                .wait_for_fences(&fences, true, u64::MAX)
        }
        .context("vkWaitForFences")
    }

    /// Return to the unsignaled state.
    ///
    /// The fence must not be pending on any queue.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.handle()];
        unsafe { self.inner.device().handle().reset_fences(&fences) }.context("vkResetFences")
    }

    /// Non-blocking status query.
    pub fn is_signaled(&self) -> RhiResult<bool> {
        unsafe { self.inner.device().handle().get_fence_status(self.handle()) }
            .context("vkGetFenceStatus")
    }
}

/// Synchronization objects of one frame slot.
///
/// ```text
/// wait(in_flight) -> acquire(signal image_available)
///   -> reset(in_flight) -> submit(wait image_available, signal render_finished + in_flight)
///   -> present(wait render_finished)
/// ```
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSync {
    /// Create the triple. The fence starts signaled.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }

    /// Signaled by image acquisition, waited on by the submission.
    #[inline]
    pub fn image_available_semaphore(&self) -> &Semaphore {
        &self.image_available
    }

    /// Signaled by the submission, waited on by presentation.
    #[inline]
    pub fn render_finished_semaphore(&self) -> &Semaphore {
        &self.render_finished
    }

    /// Signaled when the slot's submission completes.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSync>();
    }
}
