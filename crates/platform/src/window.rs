//! Window management using winit.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use meshview_core::{Error, Result};

/// Owned `vk::SurfaceKHR`.
///
/// The surface is destroyed on drop. The instance it was created from must
/// outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle. Valid only while `self` is alive.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader for capability/format/present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: The handle came from ash_window::create_surface with the same
        // instance the loader was built from, and is destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Application window.
///
/// Holds the winit window behind an `Arc` so the renderer can query the
/// drawable extent while rebuilding the swapchain.
pub struct Window {
    window: Arc<WinitWindow>,
}

impl Window {
    /// Create a resizable window with the given inner size and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// Underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Shared handle to the underlying winit window.
    pub fn inner_arc(&self) -> Arc<WinitWindow> {
        self.window.clone()
    }

    /// Current drawable size in physical pixels.
    ///
    /// Reads the live size from the window system, so a minimized window
    /// reports `0x0` here even before any resize event has been delivered.
    pub fn drawable_extent(&self) -> vk::Extent2D {
        drawable_extent(&self.window)
    }

    /// Raw display handle, needed to pick instance extensions.
    pub fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        self.window
            .display_handle()
            .map(|h| h.as_raw())
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Create a Vulkan surface for this window.
    ///
    /// # Errors
    /// Fails when the window or display handle is unavailable or the driver
    /// rejects surface creation.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid for the duration of the call, the
        // handles come from a live winit window, and the surface is destroyed in
        // Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Surface(format!("vkCreateSurfaceKHR failed: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

/// Drawable size of a winit window as a Vulkan extent.
pub fn drawable_extent(window: &WinitWindow) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}
