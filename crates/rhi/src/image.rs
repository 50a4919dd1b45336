//! GPU images, views and samplers.
//!
//! [`Image`] mirrors [`Buffer`](crate::buffer::Buffer): `new` creates the
//! `VkImage`, `allocate` obtains device-local memory, `bind` attaches it.
//! Views and samplers are plain [`OwnedHandle`]s.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::handle::OwnedHandle;

/// Owned image view.
pub type ImageView = OwnedHandle<vk::ImageView>;

/// Owned sampler.
pub type Sampler = OwnedHandle<vk::Sampler>;

/// Creation parameters of a 2D image.
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub usage: vk::ImageUsageFlags,
    pub name: &'static str,
}

/// Number of levels in a full mip chain for `width`×`height`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Aspect flags of a format.
pub fn aspect_flags(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT | vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D32_SFLOAT_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D16_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Access and stage masks of a supported layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Masks for `old` → `new`, or a precondition error for an unsupported pair.
pub fn transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RhiResult<TransitionMasks> {
    use vk::AccessFlags as A;
    use vk::ImageLayout as L;
    use vk::PipelineStageFlags as S;

    let (src_access, dst_access, src_stage, dst_stage) = match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => {
            (A::empty(), A::TRANSFER_WRITE, S::TOP_OF_PIPE, S::TRANSFER)
        }
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => {
            (A::TRANSFER_WRITE, A::TRANSFER_READ, S::TRANSFER, S::TRANSFER)
        }
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            A::TRANSFER_WRITE,
            A::SHADER_READ,
            S::TRANSFER,
            S::FRAGMENT_SHADER,
        ),
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            A::TRANSFER_READ,
            A::SHADER_READ,
            S::TRANSFER,
            S::FRAGMENT_SHADER,
        ),
        _ => {
            return Err(RhiError::Precondition(format!(
                "unsupported image layout transition {:?} -> {:?}",
                old, new
            )));
        }
    };

    Ok(TransitionMasks {
        src_access,
        dst_access,
        src_stage,
        dst_stage,
    })
}

/// Barrier moving `levels` mip levels starting at `base_level` from `old` to `new`.
pub fn layout_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    base_level: u32,
    levels: u32,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RhiResult<(vk::ImageMemoryBarrier<'static>, TransitionMasks)> {
    let masks = transition_masks(old, new)?;
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(base_level)
                .level_count(levels)
                .base_array_layer(0)
                .layer_count(1),
        )
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access);
    Ok((barrier, masks))
}

/// 2D image with explicitly allocated and bound memory.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    allocation: Option<Allocation>,
    bound: bool,
    desc: ImageDesc,
}

impl Image {
    /// Create an unbound image.
    pub fn new(device: Arc<Device>, desc: ImageDesc) -> RhiResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(RhiError::Precondition(format!(
                "{} image dimensions must be greater than 0",
                desc.name
            )));
        }
        if desc.mip_levels == 0 {
            return Err(RhiError::Precondition(format!(
                "{} image needs at least one mip level",
                desc.name
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image =
            unsafe { device.handle().create_image(&image_info, None) }.context("vkCreateImage")?;

        Ok(Self {
            device,
            image,
            allocation: None,
            bound: false,
            desc,
        })
    }

    /// Create, allocate device-local memory and bind.
    pub fn new_bound(device: Arc<Device>, desc: ImageDesc) -> RhiResult<Self> {
        let mut image = Self::new(device, desc)?;
        image.allocate()?;
        image.bind()?;
        debug!(
            "Created {} image: {}x{} {:?}, {} mip level(s)",
            desc.name, desc.extent.width, desc.extent.height, desc.format, desc.mip_levels
        );
        Ok(image)
    }

    /// Allocate device-local memory for the image.
    pub fn allocate(&mut self) -> RhiResult<()> {
        if self.allocation.is_some() {
            return Err(RhiError::Precondition(format!(
                "{} image already has memory",
                self.desc.name
            )));
        }

        let requirements = unsafe {
            self.device
                .handle()
                .get_image_memory_requirements(self.image)
        };

        let allocation = self.device.lock_allocator()?.allocate(&AllocationCreateDesc {
            name: self.desc.name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        self.allocation = Some(allocation);
        Ok(())
    }

    /// Bind the allocated memory.
    pub fn bind(&mut self) -> RhiResult<()> {
        if self.bound {
            return Err(RhiError::Precondition(format!(
                "{} image is already bound",
                self.desc.name
            )));
        }
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::Precondition(format!("{} image bound before allocation", self.desc.name))
        })?;

        unsafe {
            self.device.handle().bind_image_memory(
                self.image,
                allocation.memory(),
                allocation.offset(),
            )
        }
        .context("vkBindImageMemory")?;

        self.bound = true;
        Ok(())
    }

    /// View covering every mip level.
    pub fn create_view(&self) -> RhiResult<ImageView> {
        if !self.bound {
            return Err(RhiError::Precondition(format!(
                "view requested for unbound {} image",
                self.desc.name
            )));
        }
        create_image_view(
            self.device.clone(),
            self.image,
            self.desc.format,
            aspect_flags(self.desc.format),
            self.desc.mip_levels,
        )
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    /// Image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }

    /// Number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.desc.mip_levels
    }

    /// Aspect derived from the format.
    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        aspect_flags(self.desc.format)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} image memory: {:?}", self.desc.name, e);
                    }
                }
                Err(e) => error!("Leaking {} image memory: {}", self.desc.name, e),
            }
        }

        debug!("Destroyed {} image", self.desc.name);
    }
}

/// Create a 2D view of `image`. Also used for borrowed swapchain images.
pub fn create_image_view(
    device: Arc<Device>,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> RhiResult<ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(mip_levels)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = unsafe { device.handle().create_image_view(&view_info, None) }
        .context("vkCreateImageView")?;

    Ok(unsafe { OwnedHandle::from_raw(device, view) })
}

/// Linear, repeating sampler covering `mip_levels` levels.
///
/// Anisotropy is enabled at `max_anisotropy` when it is above 1.
pub fn create_sampler(
    device: Arc<Device>,
    mip_levels: u32,
    max_anisotropy: f32,
) -> RhiResult<Sampler> {
    let anisotropy = max_anisotropy > 1.0;
    let sampler_info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(anisotropy)
        .max_anisotropy(if anisotropy { max_anisotropy } else { 1.0 })
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32);

    let sampler = unsafe { device.handle().create_sampler(&sampler_info, None) }
        .context("vkCreateSampler")?;

    Ok(unsafe { OwnedHandle::from_raw(device, sampler) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(16, 16), 5);
        assert_eq!(mip_level_count(1024, 512), 11);
        assert_eq!(mip_level_count(1000, 3), 10);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn test_aspect_flags() {
        assert_eq!(
            aspect_flags(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            aspect_flags(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_flags(vk::Format::R8G8B8A8_SRGB),
            vk::ImageAspectFlags::COLOR
        );
    }

    #[test]
    fn test_upload_transition_masks() {
        let masks = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_unsupported_transition_rejected() {
        let result = transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::UNDEFINED,
        );
        assert!(matches!(result, Err(RhiError::Precondition(_))));
    }

    #[test]
    fn test_layout_barrier_covers_requested_levels() {
        let (barrier, _) = layout_barrier(
            vk::Image::null(),
            vk::ImageAspectFlags::COLOR,
            3,
            1,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )
        .unwrap();
        assert_eq!(barrier.subresource_range.base_mip_level, 3);
        assert_eq!(barrier.subresource_range.level_count, 1);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }
}
