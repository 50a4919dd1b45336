//! GPU copy of a loaded OBJ model.
//!
//! Vertex and index data live in device-local buffers filled through
//! staging copies. Each frame slot gets its own host-visible uniform buffer
//! and descriptor set so the host never writes a buffer the GPU may still
//! be reading.

use std::sync::Arc;

use meshview_resources::{DrawRanges, MeshVertex, ObjModel, TextureData};
use meshview_rhi::buffer::{Buffer, BufferUsage};
use meshview_rhi::command::CommandPool;
use meshview_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, write_mesh_set};
use meshview_rhi::device::Device;
use meshview_rhi::vertex::Vertex;
use meshview_rhi::{RhiError, RhiResult, vk};
use tracing::{debug, info};

use crate::error::RendererResult;
use crate::texture::{GpuTexture, fill_texture_array, material_textures};
use crate::ubo::UniformBufferObject;
use crate::{MAX_FRAMES_IN_FLIGHT, MAX_TEXTURES};

/// Convert loader vertices to the pipeline's vertex layout.
pub fn to_gpu_vertices(vertices: &[MeshVertex]) -> Vec<Vertex> {
    vertices
        .iter()
        .map(|v| Vertex::new(v.position, v.normal, v.tex_coord))
        .collect()
}

/// Create a device-local buffer and fill it with `data` via a staging copy.
fn upload_device_local(
    device: &Arc<Device>,
    command_pool: &CommandPool,
    usage: BufferUsage,
    data: &[u8],
) -> RhiResult<Buffer> {
    let staging = Buffer::staging_with_data(device.clone(), data)?;
    let buffer = Buffer::new_bound(device.clone(), usage, data.len() as vk::DeviceSize)?;

    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: data.len() as vk::DeviceSize,
    };
    command_pool.submit_once(|cmd| {
        cmd.copy_buffer(staging.handle(), buffer.handle(), &[region]);
        Ok(())
    })?;

    Ok(buffer)
}

/// Uniform buffer and descriptor set of one frame slot.
struct SlotBinding {
    uniform_buffer: Buffer,
    descriptor_set: vk::DescriptorSet,
}

/// Mesh buffers, material textures and per-slot bindings.
///
/// The descriptor pool is declared first so its sets are released before
/// the buffers and textures they reference.
pub struct GpuModel {
    descriptor_pool: DescriptorPool,
    slots: Vec<SlotBinding>,
    textures: Vec<GpuTexture>,
    placeholder: GpuTexture,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    draw_ranges: DrawRanges,
}

impl GpuModel {
    /// Upload `model` and write one descriptor set per frame slot.
    pub fn upload(
        device: &Arc<Device>,
        command_pool: &CommandPool,
        set_layout: &DescriptorSetLayout,
        model: &ObjModel,
    ) -> RendererResult<Self> {
        let vertices = to_gpu_vertices(model.vertices());
        let vertex_buffer = upload_device_local(
            device,
            command_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = upload_device_local(
            device,
            command_pool,
            BufferUsage::Index,
            bytemuck::cast_slice(model.indices()),
        )?;

        let max_anisotropy = device.physical_device_info().max_sampler_anisotropy();
        let textures = material_textures(model.materials())?
            .iter()
            .map(|data| GpuTexture::upload(device, command_pool, data, max_anisotropy))
            .collect::<RhiResult<Vec<_>>>()?;
        let placeholder = GpuTexture::upload(
            device,
            command_pool,
            &TextureData::placeholder(),
            max_anisotropy,
        )?;

        let texture_infos: Vec<vk::DescriptorImageInfo> =
            textures.iter().map(GpuTexture::descriptor_info).collect();
        let image_infos = fill_texture_array(
            &texture_infos,
            placeholder.descriptor_info(),
            MAX_TEXTURES as usize,
        );

        let descriptor_pool =
            DescriptorPool::for_mesh(device.clone(), MAX_FRAMES_IN_FLIGHT as u32, MAX_TEXTURES)?;
        let layouts = [set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let sets = descriptor_pool.allocate(&layouts)?;

        let ubo_size = UniformBufferObject::SIZE as vk::DeviceSize;
        let slots = sets
            .into_iter()
            .map(|descriptor_set| {
                let uniform_buffer =
                    Buffer::new_bound(device.clone(), BufferUsage::Uniform, ubo_size)?;
                write_mesh_set(
                    device,
                    descriptor_set,
                    uniform_buffer.handle(),
                    ubo_size,
                    &image_infos,
                );
                Ok(SlotBinding {
                    uniform_buffer,
                    descriptor_set,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Uploaded model: {} vertices, {} triangles, {} material(s)",
            model.vertex_count(),
            model.triangle_count(),
            textures.len()
        );
        debug!("Draw ranges: {:?}", model.draw_ranges().as_slice());

        Ok(Self {
            descriptor_pool,
            slots,
            textures,
            placeholder,
            vertex_buffer,
            index_buffer,
            draw_ranges: model.draw_ranges().clone(),
        })
    }

    fn slot(&self, slot: usize) -> RhiResult<&SlotBinding> {
        self.slots.get(slot).ok_or_else(|| {
            RhiError::Precondition(format!(
                "frame slot {} out of range ({} slots)",
                slot,
                self.slots.len()
            ))
        })
    }

    /// Write `ubo` into `slot`'s uniform buffer.
    ///
    /// The caller must have waited on the slot's fence.
    pub fn update_uniforms(&self, slot: usize, ubo: &UniformBufferObject) -> RhiResult<()> {
        self.slot(slot)?.uniform_buffer.write_pod(ubo)
    }

    /// Descriptor set bound while recording `slot`.
    ///
    /// # Errors
    ///
    /// [`RhiError::Precondition`] if `slot` is out of range.
    pub fn descriptor_set(&self, slot: usize) -> RhiResult<vk::DescriptorSet> {
        Ok(self.slot(slot)?.descriptor_set)
    }

    /// Device-local vertex buffer.
    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Device-local `u32` index buffer.
    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Per-material index ranges, in index order.
    #[inline]
    pub fn draw_ranges(&self) -> &DrawRanges {
        &self.draw_ranges
    }

    /// Number of uploaded material textures, excluding the placeholder.
    #[inline]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Texture written into the unused array elements.
    #[inline]
    pub fn placeholder(&self) -> &GpuTexture {
        &self.placeholder
    }

    /// Pool the per-slot sets were allocated from.
    #[inline]
    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.descriptor_pool
    }
}
