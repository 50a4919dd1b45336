//! Depth buffer management.
//!
//! The depth format is the first of [`DEPTH_FORMAT_CANDIDATES`] whose
//! optimal-tiling features include `DEPTH_STENCIL_ATTACHMENT`. Format
//! properties are supplied through a closure so selection can be tested
//! without a device.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::vk;
//! use meshview_renderer::depth_buffer::{
//!     DEPTH_FORMAT_CANDIDATES, DepthBuffer, select_depth_format,
//! };
//!
//! # fn example(device: Arc<Device>) -> meshview_rhi::RhiResult<()> {
//! let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |f| device.format_properties(f))?;
//! let depth = DepthBuffer::new(device, vk::Extent2D { width: 1920, height: 1080 }, format)?;
//! let _view = depth.view();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use meshview_rhi::device::Device;
use meshview_rhi::image::{Image, ImageDesc, ImageView};
use meshview_rhi::{RhiError, RhiResult, vk};
use tracing::info;

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate usable as an optimally tiled depth attachment.
///
/// # Errors
///
/// [`RhiError::FeatureNotFound`] when no candidate qualifies.
pub fn select_depth_format<F>(candidates: &[vk::Format], mut properties: F) -> RhiResult<vk::Format>
where
    F: FnMut(vk::Format) -> vk::FormatProperties,
{
    candidates
        .iter()
        .copied()
        .find(|&format| {
            properties(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| RhiError::FeatureNotFound("no supported depth format".into()))
}

/// Depth image shared by every framebuffer of a swapchain.
///
/// The view is declared first so it is destroyed before the image.
pub struct DepthBuffer {
    view: ImageView,
    image: Image,
}

impl DepthBuffer {
    /// Create a depth image of `extent` with device-local memory and a view.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D, format: vk::Format) -> RhiResult<Self> {
        let image = Image::new_bound(
            device,
            ImageDesc {
                extent,
                format,
                mip_levels: 1,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                name: "depth",
            },
        )?;
        let view = image.create_view()?;

        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, format
        );

        Ok(Self { view, image })
    }

    /// Raw image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    /// Depth view, bound as framebuffer attachment 1.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Selected depth format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    /// Always equals the swapchain extent it was built for.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supports(
        supported: &'static [vk::Format],
    ) -> impl FnMut(vk::Format) -> vk::FormatProperties {
        move |format| vk::FormatProperties {
            optimal_tiling_features: if supported.contains(&format) {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::SAMPLED_IMAGE
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_first_candidate() {
        let format = select_depth_format(
            &DEPTH_FORMAT_CANDIDATES,
            supports(&[vk::Format::D32_SFLOAT, vk::Format::D24_UNORM_S8_UINT]),
        )
        .unwrap();
        assert_eq!(format, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_only_d24_supported() {
        let format = select_depth_format(
            &DEPTH_FORMAT_CANDIDATES,
            supports(&[vk::Format::D24_UNORM_S8_UINT]),
        )
        .unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_linear_tiling_support_is_not_enough() {
        let result = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        });
        assert!(matches!(result, Err(RhiError::FeatureNotFound(_))));
    }

    #[test]
    fn test_no_supported_format() {
        let result = select_depth_format(&DEPTH_FORMAT_CANDIDATES, supports(&[]));
        match result {
            Err(RhiError::FeatureNotFound(msg)) => assert_eq!(msg, "no supported depth format"),
            other => panic!("expected FeatureNotFound, got {:?}", other.map(|_| ())),
        }
    }
}
