//! Material textures on the GPU.
//!
//! Pixels are uploaded through a host-visible staging buffer. The image is
//! moved UNDEFINED → TRANSFER_DST, filled, then, when the format supports
//! linear blits, each mip level is blitted from the previous one. Every
//! level ends in SHADER_READ_ONLY_OPTIMAL.

use std::sync::Arc;

use meshview_resources::{MaterialInfo, TextureData};
use meshview_rhi::buffer::Buffer;
use meshview_rhi::command::{CommandBuffer, CommandPool};
use meshview_rhi::descriptor::sampled_image_info;
use meshview_rhi::device::Device;
use meshview_rhi::image::{
    Image, ImageDesc, ImageView, Sampler, create_sampler, layout_barrier, mip_level_count,
};
use meshview_rhi::{RhiError, RhiResult, vk};
use tracing::{debug, warn};

use crate::MAX_TEXTURES;
use crate::error::RendererResult;

/// Format of every material texture.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Whether mip levels of a format can be generated with linear blits.
#[inline]
pub fn supports_linear_blit(properties: vk::FormatProperties) -> bool {
    properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
}

fn color_layer(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Blits producing levels `1..mip_levels`, each halving the previous level.
pub fn mip_blits(extent: vk::Extent2D, mip_levels: u32) -> Vec<vk::ImageBlit> {
    let mut width = extent.width.max(1) as i32;
    let mut height = extent.height.max(1) as i32;

    (1..mip_levels)
        .map(|level| {
            let next_width = (width / 2).max(1);
            let next_height = (height / 2).max(1);
            let blit = vk::ImageBlit {
                src_subresource: color_layer(level - 1),
                src_offsets: [
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: width,
                        y: height,
                        z: 1,
                    },
                ],
                dst_subresource: color_layer(level),
                dst_offsets: [
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: next_width,
                        y: next_height,
                        z: 1,
                    },
                ],
            };
            width = next_width;
            height = next_height;
            blit
        })
        .collect()
}

fn transition(
    cmd: &CommandBuffer,
    image: vk::Image,
    base_level: u32,
    levels: u32,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RhiResult<()> {
    let (barrier, masks) = layout_barrier(
        image,
        vk::ImageAspectFlags::COLOR,
        base_level,
        levels,
        old,
        new,
    )?;
    cmd.pipeline_barrier(masks.src_stage, masks.dst_stage, &[barrier]);
    Ok(())
}

/// Sampled texture: image, full-chain view and its own sampler.
///
/// Declared so the sampler and view are destroyed before the image.
pub struct GpuTexture {
    sampler: Sampler,
    view: ImageView,
    image: Image,
}

impl GpuTexture {
    /// Upload `data` and generate its mip chain on the graphics queue.
    pub fn upload(
        device: &Arc<Device>,
        command_pool: &CommandPool,
        data: &TextureData,
        max_anisotropy: f32,
    ) -> RhiResult<Self> {
        let expected = data.width as usize * data.height as usize * 4;
        if data.pixels.len() != expected {
            return Err(RhiError::Precondition(format!(
                "texture is {}x{} but holds {} bytes, expected {}",
                data.width,
                data.height,
                data.pixels.len(),
                expected
            )));
        }

        let extent = vk::Extent2D {
            width: data.width,
            height: data.height,
        };
        let mip_levels = if supports_linear_blit(device.format_properties(TEXTURE_FORMAT)) {
            mip_level_count(data.width, data.height)
        } else {
            warn!("{:?} does not support linear blits, skipping mipmaps", TEXTURE_FORMAT);
            1
        };

        let staging = Buffer::staging_with_data(device.clone(), &data.pixels)?;
        let image = Image::new_bound(
            device.clone(),
            ImageDesc {
                extent,
                format: TEXTURE_FORMAT,
                mip_levels,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                name: "texture",
            },
        )?;

        command_pool.submit_once(|cmd| {
            use vk::ImageLayout as L;
            let handle = image.handle();

            transition(cmd, handle, 0, mip_levels, L::UNDEFINED, L::TRANSFER_DST_OPTIMAL)?;

            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: color_layer(0),
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
            };
            cmd.copy_buffer_to_image(
                staging.handle(),
                handle,
                L::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            for (i, blit) in mip_blits(extent, mip_levels).iter().enumerate() {
                let src_level = i as u32;
                transition(
                    cmd,
                    handle,
                    src_level,
                    1,
                    L::TRANSFER_DST_OPTIMAL,
                    L::TRANSFER_SRC_OPTIMAL,
                )?;
                cmd.blit_image(
                    handle,
                    L::TRANSFER_SRC_OPTIMAL,
                    handle,
                    L::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(blit),
                    vk::Filter::LINEAR,
                );
                transition(
                    cmd,
                    handle,
                    src_level,
                    1,
                    L::TRANSFER_SRC_OPTIMAL,
                    L::SHADER_READ_ONLY_OPTIMAL,
                )?;
            }

            // The last level was only ever written.
            transition(
                cmd,
                handle,
                mip_levels - 1,
                1,
                L::TRANSFER_DST_OPTIMAL,
                L::SHADER_READ_ONLY_OPTIMAL,
            )
        })?;

        let view = image.create_view()?;
        let sampler = create_sampler(device.clone(), mip_levels, max_anisotropy)?;

        debug!(
            "Uploaded texture {}x{} with {} mip level(s)",
            data.width, data.height, mip_levels
        );

        Ok(Self {
            sampler,
            view,
            image,
        })
    }

    /// Descriptor for binding the texture in shader-read layout.
    #[inline]
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        sampled_image_info(self.sampler.handle(), self.view.handle())
    }

    /// Full mip chain length, or 1 when blits were unavailable.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.image.mip_levels()
    }
}

/// Diffuse pixels for each material, in material order.
///
/// Materials without a diffuse map, or whose map cannot be decoded, get the
/// white placeholder.
///
/// # Errors
///
/// [`RhiError::Precondition`] when there are more than [`MAX_TEXTURES`]
/// materials.
pub fn material_textures(materials: &[MaterialInfo]) -> RendererResult<Vec<TextureData>> {
    if materials.len() > MAX_TEXTURES as usize {
        return Err(RhiError::Precondition(format!(
            "model has {} materials but at most {} textures can be bound",
            materials.len(),
            MAX_TEXTURES
        ))
        .into());
    }

    Ok(materials
        .iter()
        .map(|material| match &material.diffuse_texture {
            Some(path) => TextureData::load(path).unwrap_or_else(|e| {
                warn!(
                    "Material '{}': cannot load {:?} ({}), using placeholder",
                    material.name, path, e
                );
                TextureData::placeholder()
            }),
            None => TextureData::placeholder(),
        })
        .collect())
}

/// Fill a texture array of `len` slots: `textures` first, `fallback` after.
pub fn fill_texture_array(
    textures: &[vk::DescriptorImageInfo],
    fallback: vk::DescriptorImageInfo,
    len: usize,
) -> Vec<vk::DescriptorImageInfo> {
    textures
        .iter()
        .copied()
        .chain(std::iter::repeat(fallback))
        .take(len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use meshview_rhi::vk::Handle;

    #[test]
    fn test_mip_blits_halve_each_level() {
        let blits = mip_blits(
            vk::Extent2D {
                width: 16,
                height: 4,
            },
            mip_level_count(16, 4),
        );

        let dst: Vec<(i32, i32)> = blits
            .iter()
            .map(|b| (b.dst_offsets[1].x, b.dst_offsets[1].y))
            .collect();
        assert_eq!(dst, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);

        for (i, blit) in blits.iter().enumerate() {
            assert_eq!(blit.src_subresource.mip_level, i as u32);
            assert_eq!(blit.dst_subresource.mip_level, i as u32 + 1);
        }
        // Each source region is the previous destination.
        assert_eq!(blits[1].src_offsets[1].x, blits[0].dst_offsets[1].x);
    }

    #[test]
    fn test_single_level_has_no_blits() {
        let blits = mip_blits(
            vk::Extent2D {
                width: 16,
                height: 16,
            },
            1,
        );
        assert!(blits.is_empty());
    }

    #[test]
    fn test_supports_linear_blit() {
        let props = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE
                | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ..Default::default()
        };
        assert!(supports_linear_blit(props));
        assert!(!supports_linear_blit(vk::FormatProperties::default()));
    }

    #[test]
    fn test_material_textures_fall_back_to_placeholder() {
        let materials = vec![
            MaterialInfo::fallback(),
            MaterialInfo {
                name: "broken".into(),
                diffuse_texture: Some(PathBuf::from("/nonexistent/diffuse.png")),
                ..Default::default()
            },
        ];

        let textures = material_textures(&materials).unwrap();
        assert_eq!(textures.len(), 2);
        assert!(textures.iter().all(|t| *t == TextureData::placeholder()));
    }

    #[test]
    fn test_too_many_materials() {
        let materials = vec![MaterialInfo::fallback(); MAX_TEXTURES as usize + 1];
        assert!(material_textures(&materials).is_err());
    }

    #[test]
    fn test_fill_texture_array() {
        let info = |raw: u64| {
            vk::DescriptorImageInfo::default().image_view(vk::ImageView::from_raw(raw))
        };

        let filled = fill_texture_array(&[info(1), info(2)], info(99), 4);
        let views: Vec<u64> = filled.iter().map(|i| i.image_view.as_raw()).collect();
        assert_eq!(views, vec![1, 2, 99, 99]);
    }
}
