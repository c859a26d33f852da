//! Window management using winit.
//!
//! This module provides window creation, Vulkan surface creation and the
//! [`SurfaceSource`] view of the window that the renderer consumes.

use std::ffi::c_char;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, trace};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkframe_core::{Error, Result};

/// Sleep between size polls while the window is minimized.
const MINIMIZED_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What the frame loop needs to know about the window it presents into.
///
/// The renderer never owns the window; it only reads the current drawable
/// extent and consumes the "resize requested" flag.
pub trait SurfaceSource {
    /// Current drawable size in pixels. Zero in either dimension while minimized.
    fn drawable_extent(&self) -> vk::Extent2D;

    /// Blocks briefly so the platform can deliver size changes.
    ///
    /// Called in a loop while the drawable extent is zero.
    ///
    /// The winit implementation only sleeps; it cannot pump the event loop
    /// from inside a handler. Backends that refresh `inner_size()` from
    /// dispatched events (Wayland) never report the restore here. The host
    /// avoids the loop by letting `begin_frame` skip zero-sized frames and
    /// return to the event loop instead.
    fn wait_for_events(&mut self);

    /// Returns `true` once per resize notification and clears the flag.
    fn take_resize_request(&mut self) -> bool;
}

/// RAII wrapper for a Vulkan surface.
///
/// The Vulkan instance must outlive this surface.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle, valid while `self` lives.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for surface capability, format and present mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: created by ash_window::create_surface from the same instance
        // as the loader; destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}

/// A winit window plus the resize bookkeeping the renderer reads.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resize_requested: bool,
}

impl Window {
    /// Create a new window with the given dimensions and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
            resize_requested: false,
        })
    }

    /// Get a reference to the underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Last size reported through [`Window::resize`].
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records a `Resized` event and raises the resize flag.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resize_requested = true;
        debug!("Window resized: {}x{}", width, height);
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions needed to create a surface for this window.
    ///
    /// # Errors
    ///
    /// Returns an error if the display handle is unavailable or the platform
    /// is not supported by ash-window.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;
        required_extensions(display_handle.as_raw())
    }

    /// Create a Vulkan surface for this window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window or display handle is unavailable or
    /// surface creation fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid; the handles come from a live
        // winit window. Destroyed in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Rhi(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

impl SurfaceSource for Window {
    fn drawable_extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn wait_for_events(&mut self) {
        trace!("Drawable area is empty, waiting");
        std::thread::sleep(MINIMIZED_POLL_INTERVAL);
    }

    fn take_resize_request(&mut self) -> bool {
        std::mem::take(&mut self.resize_requested)
    }
}

/// Instance extensions required to create a surface for `display_handle`.
///
/// The returned pointers reference static strings owned by ash-window.
///
/// # Errors
///
/// Returns an error if the platform is not supported.
pub fn required_extensions(
    display_handle: raw_window_handle::RawDisplayHandle,
) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Rhi(format!("Failed to enumerate required extensions: {}", e)))?;

    debug!(
        "Required Vulkan extensions for surface: {:?}",
        extensions
            .iter()
            // SAFETY: ash-window returns valid, NUL-terminated static strings.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSurface {
        extent: vk::Extent2D,
        resized: bool,
    }

    impl SurfaceSource for FakeSurface {
        fn drawable_extent(&self) -> vk::Extent2D {
            self.extent
        }

        fn wait_for_events(&mut self) {}

        fn take_resize_request(&mut self) -> bool {
            std::mem::take(&mut self.resized)
        }
    }

    #[test]
    fn test_resize_request_is_consumed_once() {
        let mut surface = FakeSurface {
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            resized: true,
        };
        assert!(surface.take_resize_request());
        assert!(!surface.take_resize_request());
    }

    #[test]
    fn test_surface_source_is_object_safe() {
        let mut surface = FakeSurface {
            extent: vk::Extent2D::default(),
            resized: false,
        };
        let source: &mut dyn SurfaceSource = &mut surface;
        source.wait_for_events();
        assert_eq!(source.drawable_extent().width, 0);
    }
}
