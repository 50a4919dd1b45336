//! GPU buffers.
//!
//! Buffers follow Vulkan's two-phase lifetime explicitly:
//!
//! 1. [`Buffer::new`] creates the `VkBuffer` with no memory
//! 2. [`Buffer::allocate`] obtains memory from gpu-allocator
//! 3. [`Buffer::bind`] binds that memory to the buffer
//!
//! [`Buffer::new_bound`] runs all three for the common case.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> meshview_rhi::RhiResult<()> {
//! let mut staging = Buffer::new(device, BufferUsage::Staging, 1024)?;
//! staging.allocate(BufferUsage::Staging.memory_location())?;
//! staging.bind()?;
//! staging.write(0, &[0u8; 16])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// Intended use of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data, filled by a transfer.
    Vertex,
    /// Device-local index data, filled by a transfer.
    Index,
    /// Host-visible uniform data, written every frame.
    Uniform,
    /// Host-visible transfer source.
    Staging,
}

impl BufferUsage {
    /// Vulkan usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Default memory location.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Name used for allocations and logs.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// `VkBuffer` plus its gpu-allocator allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    bound: bool,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Create an unbound buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// [`RhiError::Precondition`] for a zero size, or the native error from
    /// `vkCreateBuffer`.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::Precondition(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer =
            unsafe { device.handle().create_buffer(&buffer_info, None) }.context("vkCreateBuffer")?;

        Ok(Self {
            device,
            buffer,
            allocation: None,
            bound: false,
            size,
            usage,
        })
    }

    /// Create, allocate at the usage's default location, and bind.
    pub fn new_bound(
        device: Arc<Device>,
        usage: BufferUsage,
        size: vk::DeviceSize,
    ) -> RhiResult<Self> {
        let mut buffer = Self::new(device, usage, size)?;
        buffer.allocate(usage.memory_location())?;
        buffer.bind()?;
        debug!("Created {} buffer: {} bytes", usage.name(), size);
        Ok(buffer)
    }

    /// Create a bound staging buffer holding `data`.
    pub fn staging_with_data(device: Arc<Device>, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new_bound(device, BufferUsage::Staging, data.len() as vk::DeviceSize)?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    /// Allocate memory satisfying the buffer's requirements.
    ///
    /// # Errors
    ///
    /// [`RhiError::Precondition`] if memory was already allocated.
    pub fn allocate(&mut self, location: MemoryLocation) -> RhiResult<()> {
        if self.allocation.is_some() {
            return Err(RhiError::Precondition(format!(
                "{} buffer already has memory",
                self.usage.name()
            )));
        }

        let requirements = unsafe {
            self.device
                .handle()
                .get_buffer_memory_requirements(self.buffer)
        };

        let allocation = self.device.lock_allocator()?.allocate(&AllocationCreateDesc {
            name: self.usage.name(),
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        self.allocation = Some(allocation);
        Ok(())
    }

    /// Bind the allocated memory.
    ///
    /// # Errors
    ///
    /// [`RhiError::Precondition`] if no memory is allocated or the buffer is
    /// already bound.
    pub fn bind(&mut self) -> RhiResult<()> {
        if self.bound {
            return Err(RhiError::Precondition(format!(
                "{} buffer is already bound",
                self.usage.name()
            )));
        }
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::Precondition(format!(
                "{} buffer bound before allocation",
                self.usage.name()
            ))
        })?;

        unsafe {
            self.device.handle().bind_buffer_memory(
                self.buffer,
                allocation.memory(),
                allocation.offset(),
            )
        }
        .context("vkBindBufferMemory")?;

        self.bound = true;
        Ok(())
    }

    /// Copy `data` into host-visible memory at `offset`.
    ///
    /// # Errors
    ///
    /// [`RhiError::Precondition`] if the buffer is unbound, not host-visible,
    /// or the write would run past the end.
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::Precondition(format!(
                "write past end of {} buffer: offset {} + {} > {}",
                self.usage.name(),
                offset,
                data.len(),
                self.size
            )));
        }

        let dst = self.mapped_ptr()?;

        // SAFETY: the range was checked against the buffer size, and the
        // mapping covers the whole allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst.add(offset as usize), data.len());
        }

        Ok(())
    }

    /// Write a single `Pod` value at offset 0.
    pub fn write_pod<T: Pod>(&self, value: &T) -> RhiResult<()> {
        self.write(0, bytemuck::bytes_of(value))
    }

    /// Start of the persistent host mapping.
    pub fn mapped_ptr(&self) -> RhiResult<*mut u8> {
        if !self.bound {
            return Err(RhiError::Precondition(format!(
                "{} buffer is not bound",
                self.usage.name()
            )));
        }
        self.allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .map(|ptr| ptr.as_ptr().cast::<u8>())
            .ok_or_else(|| {
                RhiError::Precondition(format!(
                    "{} buffer memory is not host-visible",
                    self.usage.name()
                ))
            })
    }

    /// Raw handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Usage the buffer was created with.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Memory is allocated and bound.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} buffer memory: {:?}", self.usage.name(), e);
                    }
                }
                Err(e) => error!("Leaking {} buffer memory: {}", self.usage.name(), e),
            }
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_buffers_are_transfer_targets() {
        for usage in [BufferUsage::Vertex, BufferUsage::Index] {
            assert!(
                usage
                    .to_vk_usage()
                    .contains(vk::BufferUsageFlags::TRANSFER_DST)
            );
            assert_eq!(usage.memory_location(), MemoryLocation::GpuOnly);
        }
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
    }

    #[test]
    fn test_host_written_buffers_are_mappable() {
        assert_eq!(
            BufferUsage::Uniform.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            BufferUsage::Staging.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_usage_names() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }

    #[test]
    fn test_buffer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Buffer>();
    }
}
