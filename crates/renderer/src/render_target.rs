//! Swapchain render target.
//!
//! A [`RenderTarget`] bundles everything that depends on the swapchain
//! extent: the swapchain itself, one view per presentable image, the depth
//! buffer and one framebuffer per view. Fields are declared in destruction
//! order (framebuffers, image views, depth, swapchain handle).
//!
//! Recreation never patches a live target: the old one is dropped with the
//! device idle and a fresh one is built at the current surface extent.

use std::sync::Arc;

use meshview_rhi::device::Device;
use meshview_rhi::framebuffer::Framebuffer;
use meshview_rhi::image::{ImageView, create_image_view};
use meshview_rhi::swapchain::{
    Swapchain, SwapchainConfig, SwapchainSupportDetails, choose_extent,
};
use meshview_rhi::{RhiError, RhiResult, vk};
use tracing::{debug, info, warn};

use crate::depth_buffer::DepthBuffer;

/// Outcome of a recreation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecreateStatus {
    /// A new target was built.
    Recreated,
    /// The surface has zero extent; try again after the next window event.
    Deferred,
}

/// `extent` if both sides are nonzero.
#[inline]
pub fn usable_extent(extent: vk::Extent2D) -> Option<vk::Extent2D> {
    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// Extent of a target rebuilt for `window_extent` under `capabilities`.
///
/// The swapchain, depth buffer and every framebuffer of the rebuilt target
/// share this extent. `None` while the window or the surface is zero-sized.
pub fn target_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> Option<vk::Extent2D> {
    let window_extent = usable_extent(window_extent)?;
    usable_extent(choose_extent(capabilities, window_extent))
}

/// Swapchain plus the per-image resources built on top of it.
pub struct RenderTarget {
    framebuffers: Vec<Framebuffer>,
    image_views: Vec<ImageView>,
    depth: DepthBuffer,
    swapchain: Swapchain,
}

/// Everything needed to (re)build a [`RenderTarget`].
pub struct TargetParams<'a> {
    pub device: &'a Arc<Device>,
    pub surface_loader: &'a ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub preferred_present_mode: vk::PresentModeKHR,
    pub depth_format: vk::Format,
}

impl RenderTarget {
    /// Build the swapchain, its image views and the depth buffer.
    ///
    /// Framebuffers are created separately by
    /// [`create_framebuffers`](Self::create_framebuffers) once a render pass
    /// exists.
    pub fn create(params: &TargetParams<'_>, window_extent: vk::Extent2D) -> RhiResult<Self> {
        let swapchain = Swapchain::new(
            params.device.clone(),
            params.surface_loader,
            params.surface,
            SwapchainConfig {
                extent: window_extent,
                preferred_present_mode: params.preferred_present_mode,
            },
        )?;

        let image_views = swapchain
            .images()
            .iter()
            .map(|&image| {
                create_image_view(
                    params.device.clone(),
                    image,
                    swapchain.format(),
                    vk::ImageAspectFlags::COLOR,
                    1,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let depth = DepthBuffer::new(
            params.device.clone(),
            swapchain.extent(),
            params.depth_format,
        )?;

        debug!(
            "Render target: {} image views at {}x{}",
            image_views.len(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            framebuffers: Vec::new(),
            image_views,
            depth,
            swapchain,
        })
    }

    /// Create one framebuffer per image view, each paired with the shared
    /// depth view. Replaces any existing framebuffers.
    pub fn create_framebuffers(&mut self, render_pass: vk::RenderPass) -> RhiResult<()> {
        self.framebuffers.clear();

        let device = self.swapchain.device().clone();
        let extent = self.swapchain.extent();
        self.framebuffers = self
            .image_views
            .iter()
            .map(|view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass,
                    &[view.handle(), self.depth.view()],
                    extent,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        debug!("Created {} framebuffers", self.framebuffers.len());
        Ok(())
    }

    /// Replace `current` with a target at the surface's present extent.
    ///
    /// Returns [`RecreateStatus::Deferred`] without touching `current` while
    /// the surface or window reports a zero extent. Otherwise waits for the
    /// device to go idle, drops the old target and builds a new one with
    /// framebuffers for `render_pass`.
    pub fn recreate(
        current: &mut Option<RenderTarget>,
        params: &TargetParams<'_>,
        window_extent: vk::Extent2D,
        render_pass: vk::RenderPass,
    ) -> RhiResult<RecreateStatus> {
        if usable_extent(window_extent).is_none() {
            debug!("Window extent is zero, deferring swapchain recreation");
            return Ok(RecreateStatus::Deferred);
        }

        let support = SwapchainSupportDetails::query(
            params.surface_loader,
            params.device.physical_device(),
            params.surface,
        )?;
        let Some(extent) = target_extent(&support.capabilities, window_extent) else {
            debug!("Surface extent is zero, deferring swapchain recreation");
            return Ok(RecreateStatus::Deferred);
        };

        params.device.wait_idle()?;

        let old_format = current.as_ref().map(|t| t.color_format());
        // Dropped here, before the replacement swapchain is created.
        *current = None;

        let mut target = Self::create(params, extent)?;
        if let Some(old_format) = old_format
            && old_format != target.color_format()
        {
            warn!(
                "Swapchain format changed from {:?} to {:?}; the render pass was built for the old one",
                old_format,
                target.color_format()
            );
        }
        target.create_framebuffers(render_pass)?;

        info!(
            "Swapchain recreated at {}x{}",
            target.extent().width,
            target.extent().height
        );

        *current = Some(target);
        Ok(RecreateStatus::Recreated)
    }

    /// Underlying swapchain.
    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Extent shared by the swapchain, depth buffer and framebuffers.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Swapchain image format.
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// Depth attachment format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth.format()
    }

    /// Number of swapchain images actually created.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.image_views.len()
    }

    /// Framebuffer for a swapchain image.
    pub fn framebuffer(&self, image_index: u32) -> RhiResult<&Framebuffer> {
        self.framebuffers.get(image_index as usize).ok_or_else(|| {
            RhiError::Precondition(format!(
                "no framebuffer for swapchain image {} ({} created)",
                image_index,
                self.framebuffers.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_usable_extent() {
        assert_eq!(usable_extent(extent(800, 600)), Some(extent(800, 600)));
        assert_eq!(usable_extent(extent(0, 600)), None);
        assert_eq!(usable_extent(extent(800, 0)), None);
    }

    fn free_size_caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        }
    }

    #[test]
    fn test_recreating_twice_at_same_window_extent_keeps_extent() {
        let caps = free_size_caps();

        let first = target_extent(&caps, extent(1024, 768));
        let second = target_extent(&caps, extent(1024, 768));
        assert_eq!(first, Some(extent(1024, 768)));
        assert_eq!(first, second);
    }

    #[test]
    fn test_target_extent_follows_fixed_surface_extent() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            min_image_extent: extent(1920, 1080),
            max_image_extent: extent(1920, 1080),
            ..Default::default()
        };

        assert_eq!(target_extent(&caps, extent(800, 600)), Some(extent(1920, 1080)));
        assert_eq!(target_extent(&caps, extent(1024, 768)), Some(extent(1920, 1080)));
    }

    #[test]
    fn test_target_extent_is_stable_once_clamped() {
        let caps = free_size_caps();

        let clamped = target_extent(&caps, extent(8000, 300)).unwrap();
        assert_eq!(clamped, extent(4096, 300));
        // Rebuilding from the clamped extent must not drift.
        assert_eq!(target_extent(&caps, clamped), Some(clamped));
    }

    #[test]
    fn test_zero_window_defers() {
        assert_eq!(target_extent(&free_size_caps(), extent(0, 600)), None);
        assert_eq!(target_extent(&free_size_caps(), extent(800, 0)), None);
    }

    #[test]
    fn test_minimized_surface_defers() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(0, 0),
            min_image_extent: extent(0, 0),
            max_image_extent: extent(0, 0),
            ..Default::default()
        };
        assert_eq!(target_extent(&caps, extent(800, 600)), None);
    }
}
