//! Physical device (GPU) selection.
//!
//! A device is suitable when it exposes:
//! 1. a graphics queue family and a family that can present to the surface
//! 2. the swapchain extension
//! 3. at least one surface format and one present mode
//! 4. sampler anisotropy and dynamic indexing of sampled image arrays
//!
//! Suitable devices are scored and the highest score wins.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::DEVICE_EXTENSIONS;
use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::swapchain::SwapchainSupportDetails;

/// Queue family indices discovered while scanning a device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family supporting graphics operations.
    pub graphics_family: Option<u32>,
    /// Family supporting presentation to the target surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both required families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Resolved indices, if complete.
    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }
}

/// Graphics and present queue family indices of the selected device.
///
/// The two may be the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics family index.
    pub graphics: u32,
    /// Present family index.
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Graphics and present live in different families.
    #[inline]
    pub fn is_split(&self) -> bool {
        self.graphics != self.present
    }
}

/// Selected physical device and the data needed to build a logical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Queue families chosen for graphics and present.
    pub queue_families: QueueFamilies,
}

impl PhysicalDeviceInfo {
    /// Device name reported by the driver.
    pub fn device_name(&self) -> &str {
        device_name(&self.properties)
    }

    /// Human-readable device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Largest anisotropy the sampler may request.
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.properties.api_version;
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field(
                "api_version",
                &format!(
                    "{}.{}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version),
                    vk::api_version_patch(version)
                ),
            )
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> &str {
    properties
        .device_name_as_c_str()
        .ok()
        .and_then(|name| name.to_str().ok())
        .unwrap_or("Unknown Device")
}

/// Pick the best physical device for rendering to `surface`.
///
/// # Errors
///
/// [`RhiError::NoSuitableGpu`] when no device passes the suitability checks.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices =
        unsafe { instance.enumerate_physical_devices() }.context("vkEnumeratePhysicalDevices")?;

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| check_device_suitability(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device(&info.properties);
            debug!(
                "GPU '{}' ({}) - Score: {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            (info, score)
        })
        .max_by_key(|(_, score)| *score);

    let Some((selected, score)) = best else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    info!(
        "Selected GPU: '{}' ({}), score {}",
        selected.device_name(),
        selected.device_type_name(),
        score
    );

    Ok(selected)
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let name = device_name(&properties);

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let indices = find_queue_families(&families, |index| unsafe {
        surface_loader
            .get_physical_device_surface_support(device, index, surface)
            .unwrap_or(false)
    });

    let Some(queue_families) = indices.resolve() else {
        debug!(
            "GPU '{}' skipped: missing queue families (graphics={}, present={})",
            name,
            indices.graphics_family.is_some(),
            indices.present_family.is_some()
        );
        return None;
    };

    let extensions = unsafe { instance.enumerate_device_extension_properties(device) }.ok()?;
    let has_extensions = DEVICE_EXTENSIONS.iter().all(|required| {
        extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str().ok() == Some(*required))
    });
    if !has_extensions {
        debug!("GPU '{}' skipped: swapchain extension missing", name);
        return None;
    }

    match SwapchainSupportDetails::query(surface_loader, device, surface) {
        Ok(support) if support.is_adequate() => {}
        _ => {
            debug!("GPU '{}' skipped: no usable surface formats", name);
            return None;
        }
    }

    if features.sampler_anisotropy == vk::FALSE {
        debug!("GPU '{}' skipped: sampler anisotropy not supported", name);
        return None;
    }

    if features.shader_sampled_image_array_dynamic_indexing == vk::FALSE {
        debug!("GPU '{}' skipped: texture array indexing not supported", name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        queue_families,
    })
}

/// Find graphics and present families.
///
/// A family supporting both is preferred so that a single queue can do both
/// jobs; otherwise the first graphics family and first present family win.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present = supports_present(i);

        if graphics && present {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

/// Score a device. Discrete beats integrated beats virtual beats CPU; the
/// maximum 2D image dimension breaks ties.
pub fn rate_device(properties: &vk::PhysicalDeviceProperties) -> u32 {
    let type_score = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 100,
        _ => 1,
    };
    type_score + properties.limits.max_image_dimension2_d.min(65_536) / 10
}
