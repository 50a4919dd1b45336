//! Swapchain creation, acquisition and presentation.
//!
//! [`Swapchain`] owns only the `VkSwapchainKHR`; its images are borrowed
//! from the presentation engine. Views, depth and framebuffers built on top
//! of it live with the caller so their destruction order can be controlled.
//!
//! Out-of-date and suboptimal results are reported as [`AcquireOutcome`] /
//! [`PresentOutcome`] values rather than errors.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// Surface capabilities, formats and present modes for one device.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Query capabilities, formats and present modes of `surface`.
    ///
    /// # Errors
    ///
    /// Returns the native error of the first failing query.
    pub fn query(
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)
        }
        .context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)
        }
        .context("vkGetPhysicalDeviceSurfaceFormatsKHR")?;

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
        }
        .context("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Result of acquiring an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. `suboptimal` images are still rendered.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain should be rebuilt.
    #[inline]
    pub fn needs_recreation(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Parameters chosen by the caller rather than the surface.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainConfig {
    /// Drawable size of the window, used when the surface leaves it open.
    pub extent: vk::Extent2D,
    /// Present mode to use when supported.
    pub preferred_present_mode: vk::PresentModeKHR,
}

/// Swapchain handle with the parameters it was built with.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Build a swapchain against the surface's current capabilities.
    ///
    /// # Errors
    ///
    /// [`RhiError::Surface`] when the surface reports no formats or present
    /// modes, otherwise the native error of the failing call.
    pub fn new(
        device: Arc<Device>,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        config: SwapchainConfig,
    ) -> RhiResult<Self> {
        let support =
            SwapchainSupportDetails::query(surface_loader, device.physical_device(), surface)?;

        if !support.is_adequate() {
            return Err(RhiError::Surface(
                "surface reports no formats or present modes".into(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode =
            choose_present_mode(&support.present_modes, config.preferred_present_mode);
        let extent = choose_extent(&support.capabilities, config.extent);
        let image_count = determine_image_count(&support.capabilities);

        let families = device.queue_families();
        let family_indices = [families.graphics, families.present];
        let (sharing_mode, family_slice) = if families.is_split() {
            debug!(
                "CONCURRENT sharing between graphics ({}) and present ({}) families",
                families.graphics, families.present
            );
            (vk::SharingMode::CONCURRENT, &family_indices[..])
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let loader = ash::khr::swapchain::Device::new(device.instance(), device.handle());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .context("vkCreateSwapchainKHR")?;

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(result) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(RhiError::Vulkan {
                    operation: "vkGetSwapchainImagesKHR",
                    result,
                });
            }
        };

        info!(
            "Swapchain created: {}x{}, {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            images.len()
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
        })
    }

    /// Acquire the next image, signalling `semaphore`. Waits without timeout.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<AcquireOutcome> {
        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(result) => Err(RhiError::Vulkan {
                operation: "vkAcquireNextImageKHR",
                result,
            }),
        }
    }

    /// Queue `image_index` for presentation after `wait_semaphore`.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(result) => Err(RhiError::Vulkan {
                operation: "vkQueuePresentKHR",
                result,
            }),
        }
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Swapchain color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    /// Extent chosen at creation.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Present mode actually in use, after fallback.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Presentation engine images, in index order.
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Device the swapchain belongs to.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!(
            "Swapchain destroyed ({}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Prefer B8G8R8A8_SRGB / SRGB_NONLINEAR, else the first reported format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    if let Some(&format) = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    }) {
        return Ok(format);
    }

    let first = formats
        .first()
        .copied()
        .ok_or_else(|| RhiError::Surface("surface reports no formats".into()))?;
    warn!("Preferred surface format unavailable, using {:?}", first.format);
    Ok(first)
}

/// `preferred` when the surface supports it, else FIFO.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        preferred
    } else {
        debug!("{:?} unavailable, falling back to FIFO", preferred);
        vk::PresentModeKHR::FIFO
    }
}

/// Surface extent, or the window extent clamped to the surface limits when
/// the surface leaves it to the swapchain.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        let selected = choose_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_choose_surface_format_fallback_and_empty() {
        let formats = [surface_format(vk::Format::R8G8B8A8_UNORM)];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::R8G8B8A8_UNORM
        );
        assert!(matches!(
            choose_surface_format(&[]),
            Err(RhiError::Surface(_))
        ));
    }

    #[test]
    fn test_choose_present_mode_honours_preference() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn test_choose_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };
        assert_eq!(
            choose_extent(&capabilities, extent(800, 600)),
            extent(1920, 1080)
        );
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(100, 100),
            max_image_extent: extent(2000, 2000),
            ..Default::default()
        };
        assert_eq!(
            choose_extent(&capabilities, extent(3000, 3000)),
            extent(2000, 2000)
        );
        assert_eq!(
            choose_extent(&capabilities, extent(50, 50)),
            extent(100, 100)
        );
        assert_eq!(
            choose_extent(&capabilities, extent(800, 600)),
            extent(800, 600)
        );
    }

    #[test]
    fn test_determine_image_count() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capped), 2);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unbounded), 3);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate.clone()
        };
        assert!(!no_modes.is_adequate());
    }

    #[test]
    fn test_present_outcome_recreation() {
        assert!(!PresentOutcome::Presented.needs_recreation());
        assert!(PresentOutcome::Suboptimal.needs_recreation());
        assert!(PresentOutcome::OutOfDate.needs_recreation());
    }
}
