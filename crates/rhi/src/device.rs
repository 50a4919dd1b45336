//! Vulkan logical device and queue management.
//!
//! The [`Device`] owns:
//! - the logical device with the swapchain extension enabled
//! - the graphics and present queues
//! - the gpu-allocator used by every buffer and image
//!
//! Every other RHI object holds an `Arc<Device>` and is destroyed before it.
//!
//! # Example
//!
//! ```no_run
//! use meshview_rhi::device::Device;
//! use meshview_rhi::instance::{Instance, InstanceConfig};
//! use meshview_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(&InstanceConfig::default(), None).unwrap();
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let info = select_physical_device(instance.handle(), surface, &surface_loader).unwrap();
//! let device = Device::new(&instance, &info).unwrap();
//! let _queue = device.graphics_queue();
//! ```

use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilies};

/// Required device extensions.
pub const DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device.
///
/// Shared through `Arc`; the allocator sits behind a `Mutex`.
pub struct Device {
    device: ash::Device,
    instance: ash::Instance,
    physical_device: PhysicalDeviceInfo,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl Device {
    /// Create the logical device, fetch its queues and set up the allocator.
    ///
    /// One queue is created per unique family. Sampler anisotropy and
    /// dynamic indexing of sampled image arrays are enabled.
    ///
    /// # Errors
    ///
    /// Fails when `vkCreateDevice` or allocator creation fails.
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let families = physical_device.queue_families;
        let unique_families = families.unique();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .shader_sampled_image_array_dynamic_indexing(true);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device.device, &create_info, None)
        }
        .context("vkCreateDevice")?;

        info!(
            "Logical device created on '{}'",
            physical_device.device_name()
        );

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        debug!(
            "Queues retrieved: graphics family {}, present family {}",
            families.graphics, families.present
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical_device: physical_device.clone(),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
        }))
    }

    /// Raw logical device.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Raw instance the device was created from.
    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device.device
    }

    /// Properties and queue families of the physical device.
    #[inline]
    pub fn physical_device_info(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Graphics queue.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Present queue. May equal the graphics queue.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Queue family indices.
    #[inline]
    pub fn queue_families(&self) -> QueueFamilies {
        self.physical_device.queue_families
    }

    /// GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Lock the allocator.
    ///
    /// A poisoned lock is reported as [`RhiError::Precondition`].
    pub fn lock_allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::Precondition("GPU allocator lock poisoned".into()))
    }

    /// Format feature support of the physical device.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
    }

    /// Block until every queue is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle() }.context("vkDeviceWaitIdle")
    }

    /// Block until the graphics queue is idle.
    pub fn graphics_queue_wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.queue_wait_idle(self.graphics_queue) }.context("vkQueueWaitIdle")
    }

    /// Submit work to the graphics queue.
    ///
    /// # Safety
    ///
    /// Command buffers must be fully recorded, semaphores must be in the
    /// state the submission expects, and `fence` must be unsignaled and not
    /// already pending.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)
        }
        .context("vkQueueSubmit")
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device and ash::Instance are function tables plus handles,
// queue handles are plain values, and the allocator is behind a Mutex.
// Queue submission is externally synchronized by the single render thread.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert_eq!(DEVICE_EXTENSIONS, &[ash::khr::swapchain::NAME]);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
