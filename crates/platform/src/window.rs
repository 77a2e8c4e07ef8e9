//! Window management using winit.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{CursorGrabMode, Window as WinitWindow, WindowAttributes};

use dreams_core::{Error, Result};

/// RAII wrapper for a Vulkan surface.
///
/// The caller must ensure the Vulkan instance outlives this surface.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw Vulkan surface handle, valid while this `Surface` exists.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// The surface extension loader, for capability queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Window wrapper providing raw handles for Vulkan surface creation.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Creates a resizable window.
    ///
    /// # Errors
    ///
    /// Returns an error if window creation fails.
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
            width,
            height,
        })
    }

    /// The underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Current window width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current window height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records new dimensions after a resize event.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Requests a redraw.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Grabs and hides the cursor for orbit-camera mouse look. Falls back to
    /// locked grab where confinement is unsupported; failure is logged, not
    /// fatal.
    pub fn capture_cursor(&self) {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Locked));
        if let Err(e) = grabbed {
            tracing::warn!("Cursor grab unavailable: {e}");
        }
        self.window.set_cursor_visible(false);
    }

    /// Creates a Vulkan surface for this window.
    ///
    /// # Errors
    ///
    /// Returns an error if the handles cannot be obtained or surface
    /// creation fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("failed to get display handle: {e}")))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("failed to get window handle: {e}")))?;

        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("failed to create surface: {e}")))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);
        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}
