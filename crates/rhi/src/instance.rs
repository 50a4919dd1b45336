//! Vulkan instance management.
//!
//! Validation and debug messaging are configured explicitly through
//! [`InstanceConfig`]; nothing about the messenger lives in global state.
//!
//! # Example
//!
//! ```no_run
//! use meshview_rhi::instance::{Instance, InstanceConfig};
//!
//! let config = InstanceConfig {
//!     enable_validation: cfg!(debug_assertions),
//!     ..Default::default()
//! };
//! let instance = Instance::new(&config, None).expect("Failed to create Vulkan instance");
//! let _raw = instance.handle();
//! ```

use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult, VkResultExt};

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance creation settings.
#[derive(Clone, Debug)]
pub struct InstanceConfig {
    /// Application name reported to the driver.
    pub application_name: String,
    /// Request the validation layer and a debug messenger.
    pub enable_validation: bool,
    /// Severities forwarded from the validation layer to the log.
    pub message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            application_name: String::from("meshview"),
            enable_validation: false,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        }
    }
}

/// Vulkan instance with an optional debug messenger.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Instance {
    /// Create a Vulkan instance.
    ///
    /// `display` selects the platform surface extensions via `ash-window`;
    /// pass `None` for a headless instance. When validation is requested but
    /// the layer is missing, a warning is logged and creation continues
    /// without it.
    ///
    /// # Errors
    ///
    /// Fails if the loader cannot be found, the surface extensions cannot be
    /// enumerated, or `vkCreateInstance` fails.
    pub fn new(config: &InstanceConfig, display: Option<RawDisplayHandle>) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            config.enable_validation && Self::is_validation_layer_available(&entry)?;
        if config.enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|_| RhiError::Precondition("application name contains NUL".into()))?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"meshview")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = Self::required_extensions(display)?;
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let flags = if cfg!(target_os = "macos") {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        // Chained so instance creation and destruction are covered too.
        let mut messenger_info = Self::messenger_create_info(config.message_severity);

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers)
            .flags(flags);
        if validation_available {
            create_info = create_info.push_next(&mut messenger_info);
        }

        let instance =
            unsafe { entry.create_instance(&create_info, None) }.context("vkCreateInstance")?;

        info!("Vulkan instance created ({} extensions)", extensions.len());

        let (debug_utils, debug_messenger) = if validation_available {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let info = Self::messenger_create_info(config.message_severity);
            let messenger = unsafe { debug_utils.create_debug_utils_messenger(&info, None) }
                .context("vkCreateDebugUtilsMessengerEXT");
            match messenger {
                Ok(messenger) => {
                    info!("Validation layers enabled");
                    (Some(debug_utils), Some(messenger))
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
        })
    }

    /// Raw instance.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Whether the debug messenger is active.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    fn required_extensions(display: Option<RawDisplayHandle>) -> RhiResult<Vec<*const c_char>> {
        let mut extensions = match display {
            Some(display) => ash_window::enumerate_required_extensions(display)
                .context("vkEnumerateInstanceExtensionProperties")?
                .to_vec(),
            None => Vec::new(),
        };

        if cfg!(target_os = "macos") {
            extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
            extensions.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
        }

        for &ext in &extensions {
            // SAFETY: every entry points at a static NUL-terminated name.
            debug!("Instance extension: {:?}", unsafe { CStr::from_ptr(ext) });
        }

        Ok(extensions)
    }

    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }
            .context("vkEnumerateInstanceLayerProperties")?;

        Ok(layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().ok() == Some(VALIDATION_LAYER_NAME)))
    }

    fn messenger_create_info(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity)
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Forwards validation-layer messages to `tracing`.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid (or null) callback data pointer.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "general",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "other",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!(target: "vulkan", "[{}] {}", kind, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!(target: "vulkan", "[{}] {}", kind, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            info!(target: "vulkan", "[{}] {}", kind, message)
        }
        _ => debug!(target: "vulkan", "[{}] {}", kind, message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InstanceConfig::default();
        assert!(!config.enable_validation);
        assert!(
            config
                .message_severity
                .contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR)
        );
        assert!(
            !config
                .message_severity
                .contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE)
        );
    }

    #[test]
    fn test_headless_instance_without_validation() {
        match Instance::new(&InstanceConfig::default(), None) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(RhiError::Loading(_)) => eprintln!("Skipping test: Vulkan not available"),
            Err(RhiError::Vulkan { .. }) => eprintln!("Skipping test: no usable Vulkan driver"),
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_headless_instance_with_validation_request() {
        let config = InstanceConfig {
            enable_validation: true,
            ..Default::default()
        };
        match Instance::new(&config, None) {
            Ok(instance) => {
                if instance.has_validation() {
                    assert!(instance.debug_utils.is_some());
                }
            }
            Err(RhiError::Loading(_)) => eprintln!("Skipping test: Vulkan not available"),
            Err(RhiError::Vulkan { .. }) => eprintln!("Skipping test: no usable Vulkan driver"),
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_nul_in_application_name_rejected() {
        let config = InstanceConfig {
            application_name: String::from("bad\0name"),
            ..Default::default()
        };
        match Instance::new(&config, None) {
            Err(RhiError::Precondition(_)) | Err(RhiError::Loading(_)) => {}
            other => panic!("Unexpected result: {:?}", other.err()),
        }
    }
}
