//! Frame lifecycle state machine.
//!
//! [`FrameManager`] decides *what* happens each frame; a [`FrameBackend`]
//! does it. The renderer's backend talks to Vulkan, tests use a recording
//! double. One call to [`FrameManager::draw_frame`] runs the protocol for
//! slot `i = frame_counter mod N`:
//!
//! 1. Retry a deferred swapchain recreation, if any.
//! 2. Wait on slot `i`'s fence (no timeout).
//! 3. Acquire an image. Out-of-date → recreate and return without
//!    submitting or advancing. Suboptimal → proceed.
//! 4. Update the slot's uniforms.
//! 5. Reset fence and command buffer, record.
//! 6. Submit.
//! 7. Present. Out-of-date, suboptimal or a pending resize → recreate.
//! 8. Advance `frame_counter`.
//!
//! ```text
//!   Idle ──begin_slot──▶ Recording ──submit──▶ Submitted ──wait_for_slot──▶ Idle
//! ```

use meshview_rhi::swapchain::{AcquireOutcome, PresentOutcome};
use tracing::{debug, trace};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::error::RendererResult;
use crate::frame::SlotState;
use crate::render_target::RecreateStatus;

/// GPU-facing operations used by [`FrameManager`].
pub trait FrameBackend {
    /// Block until `slot`'s previous submission completed.
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Acquire the next swapchain image, signalling `slot`'s
    /// image-available semaphore.
    fn acquire(&mut self, slot: usize) -> RendererResult<AcquireOutcome>;

    /// Write this frame's uniforms into `slot`'s mapped buffer.
    fn update_uniforms(&mut self, slot: usize) -> RendererResult<()>;

    /// Reset `slot`'s fence and command buffer and begin recording.
    fn begin_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Record the frame's draw commands for `image_index` and end recording.
    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()>;

    /// Submit `slot`'s command buffer.
    fn submit(&mut self, slot: usize) -> RendererResult<()>;

    /// Present `image_index` after `slot`'s render-finished semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome>;

    /// Rebuild the swapchain render target at the current surface extent.
    fn recreate(&mut self) -> RendererResult<RecreateStatus>;
}

/// What a call to [`FrameManager::draw_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and presented.
    Presented,
    /// A frame was presented and the swapchain was rebuilt afterwards.
    PresentedAndRecreated,
    /// Acquisition found the swapchain out of date; nothing was submitted.
    AcquireAborted,
    /// The surface has zero extent; nothing was drawn.
    Suspended,
}

/// Frame counter, slot states and recreation flags.
#[derive(Debug)]
pub struct FrameManager {
    frame_counter: u64,
    slot_states: [SlotState; MAX_FRAMES_IN_FLIGHT],
    resize_pending: bool,
    recreate_pending: bool,
}

impl Default for FrameManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameManager {
    /// Manager at frame 0 with every slot idle and nothing pending.
    pub fn new() -> Self {
        Self {
            frame_counter: 0,
            slot_states: [SlotState::Idle; MAX_FRAMES_IN_FLIGHT],
            resize_pending: false,
            recreate_pending: false,
        }
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        (self.frame_counter % MAX_FRAMES_IN_FLIGHT as u64) as usize
    }

    /// Frames completed so far (including deferred-recreation frames).
    #[inline]
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// State of `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not below [`MAX_FRAMES_IN_FLIGHT`].
    #[inline]
    pub fn slot_state(&self, slot: usize) -> SlotState {
        self.slot_states[slot]
    }

    /// Note that the window was resized. Honoured after the next present.
    #[inline]
    pub fn notify_resized(&mut self) {
        self.resize_pending = true;
    }

    /// Whether a resize has been noted and not yet honoured.
    #[inline]
    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// A recreation is waiting for a nonzero surface extent.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.recreate_pending
    }

    /// Run one frame against `backend`.
    ///
    /// Errors from the backend abort the frame and are returned unchanged.
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> RendererResult<FrameOutcome> {
        if self.recreate_pending {
            match backend.recreate()? {
                RecreateStatus::Deferred => return Ok(FrameOutcome::Suspended),
                RecreateStatus::Recreated => {
                    self.recreate_pending = false;
                    self.resize_pending = false;
                }
            }
        }

        let slot = self.current_slot();

        backend.wait_for_slot(slot)?;
        self.slot_states[slot] = SlotState::Idle;

        let image_index = match backend.acquire(slot)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    trace!("Acquired suboptimal image {}", image_index);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date on acquire, recreating");
                self.recreate(backend)?;
                return Ok(FrameOutcome::AcquireAborted);
            }
        };

        backend.update_uniforms(slot)?;

        backend.begin_slot(slot)?;
        self.slot_states[slot] = SlotState::Recording;
        backend.record(slot, image_index)?;

        backend.submit(slot)?;
        self.slot_states[slot] = SlotState::Submitted;

        let present = backend.present(slot, image_index)?;
        let recreate = present.needs_recreation() || self.resize_pending;
        if recreate {
            debug!(
                "Recreating after present ({:?}, resize pending: {})",
                present, self.resize_pending
            );
            self.recreate(backend)?;
        }

        self.frame_counter += 1;

        Ok(if recreate {
            FrameOutcome::PresentedAndRecreated
        } else {
            FrameOutcome::Presented
        })
    }

    fn recreate<B: FrameBackend>(&mut self, backend: &mut B) -> RendererResult<()> {
        self.resize_pending = false;
        match backend.recreate()? {
            RecreateStatus::Recreated => self.recreate_pending = false,
            RecreateStatus::Deferred => self.recreate_pending = true,
        }
        Ok(())
    }
}
