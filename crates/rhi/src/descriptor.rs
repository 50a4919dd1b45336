//! Descriptor set layout, pool and writes for the mesh pipeline.
//!
//! The mesh pipeline uses a single set:
//!
//! | binding | type                          | count            | stage    |
//! |---------|-------------------------------|------------------|----------|
//! | 0       | uniform buffer                | 1                | vertex   |
//! | 1       | combined image sampler array  | `texture_count`  | fragment |
//!
//! One set is allocated per frame slot so each slot binds its own uniform
//! buffer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::descriptor::{DescriptorPool, DescriptorSetLayout};
//!
//! # fn example(device: Arc<Device>) -> meshview_rhi::RhiResult<()> {
//! let layout = DescriptorSetLayout::for_mesh(device.clone(), 16)?;
//! let pool = DescriptorPool::for_mesh(device, 2, 16)?;
//! let sets = pool.allocate(&[layout.handle(); 2])?;
//! # let _ = sets;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::handle::OwnedHandle;

/// Binding of the per-frame uniform buffer.
pub const UNIFORM_BINDING: u32 = 0;

/// Binding of the material texture array.
pub const TEXTURE_BINDING: u32 = 1;

/// Layout bindings of the mesh descriptor set.
pub fn mesh_bindings(texture_count: u32) -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        vk::DescriptorSetLayoutBinding::default()
            .binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(TEXTURE_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(texture_count)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// Pool sizes for `set_count` mesh sets.
pub fn mesh_pool_sizes(set_count: u32, texture_count: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(set_count),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(set_count * texture_count),
    ]
}

/// Descriptor set layout.
pub struct DescriptorSetLayout {
    inner: OwnedHandle<vk::DescriptorSetLayout>,
}

impl DescriptorSetLayout {
    /// Create a layout from explicit bindings.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)
        }
        .context("vkCreateDescriptorSetLayout")?;

        debug!("Created descriptor set layout with {} binding(s)", bindings.len());

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, layout) },
        })
    }

    /// Layout of the mesh set with `texture_count` texture slots.
    pub fn for_mesh(device: Arc<Device>, texture_count: u32) -> RhiResult<Self> {
        if texture_count == 0 {
            return Err(RhiError::Precondition(
                "texture array must have at least one slot".into(),
            ));
        }
        Self::new(device, &mesh_bindings(texture_count))
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.inner.handle()
    }
}

/// Descriptor pool. Sets are freed with the pool.
pub struct DescriptorPool {
    inner: OwnedHandle<vk::DescriptorPool>,
    max_sets: u32,
}

impl DescriptorPool {
    /// Create a pool holding up to `max_sets` sets.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None) }
            .context("vkCreateDescriptorPool")?;

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self {
            inner: unsafe { OwnedHandle::from_raw(device, pool) },
            max_sets,
        })
    }

    /// Pool sized for `set_count` mesh sets.
    pub fn for_mesh(device: Arc<Device>, set_count: u32, texture_count: u32) -> RhiResult<Self> {
        Self::new(device, set_count, &mesh_pool_sizes(set_count, texture_count))
    }

    /// Allocate one set per layout.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        if layouts.len() as u32 > self.max_sets {
            return Err(RhiError::Precondition(format!(
                "requested {} descriptor sets from a pool of {}",
                layouts.len(),
                self.max_sets
            )));
        }

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle())
            .set_layouts(layouts);

        let sets = unsafe {
            self.inner
                .device()
                .handle()
                .allocate_descriptor_sets(&alloc_info)
        }
        .context("vkAllocateDescriptorSets")?;

        debug!("Allocated {} descriptor set(s)", sets.len());
        Ok(sets)
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.inner.handle()
    }

    /// Capacity in sets.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

/// Point a mesh set at its uniform buffer and the material textures.
///
/// `textures` must fill every slot of the texture array.
pub fn write_mesh_set(
    device: &Device,
    set: vk::DescriptorSet,
    uniform_buffer: vk::Buffer,
    uniform_range: vk::DeviceSize,
    textures: &[vk::DescriptorImageInfo],
) {
    let buffer_infos = [vk::DescriptorBufferInfo::default()
        .buffer(uniform_buffer)
        .offset(0)
        .range(uniform_range)];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(UNIFORM_BINDING)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(TEXTURE_BINDING)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(textures),
    ];

    unsafe {
        device.handle().update_descriptor_sets(&writes, &[]);
    }
}

/// Descriptor for a sampled texture in shader-read layout.
#[inline]
pub fn sampled_image_info(sampler: vk::Sampler, view: vk::ImageView) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(view)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_bindings() {
        let [ubo, textures] = mesh_bindings(16);

        assert_eq!(ubo.binding, 0);
        assert_eq!(ubo.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(ubo.descriptor_count, 1);
        assert_eq!(ubo.stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(textures.binding, 1);
        assert_eq!(
            textures.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(textures.descriptor_count, 16);
        assert_eq!(textures.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_mesh_pool_sizes_scale_with_sets() {
        let [ubo, textures] = mesh_pool_sizes(2, 16);
        assert_eq!(ubo.ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(ubo.descriptor_count, 2);
        assert_eq!(textures.ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(textures.descriptor_count, 32);
    }

    #[test]
    fn test_sampled_image_info_layout() {
        let info = sampled_image_info(vk::Sampler::null(), vk::ImageView::null());
        assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }
}
