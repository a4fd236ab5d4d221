//! Window management using winit.
//!
//! This module provides window creation, fullscreen handling, and Vulkan
//! surface creation.

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Fullscreen, Window as WinitWindow, WindowAttributes};

use facet_core::{Error, Result};

/// Windowed bounds captured before entering fullscreen.
#[derive(Debug, Clone, Copy)]
struct WindowedBounds {
    /// Outer position, when the platform reports one.
    position: Option<PhysicalPosition<i32>>,
    size: PhysicalSize<u32>,
}

/// RAII wrapper for a Vulkan surface.
///
/// This struct owns a `vk::SurfaceKHR` handle and ensures it is properly destroyed
/// when dropped. The surface loader is stored internally to perform cleanup.
///
/// # Ownership
/// The surface is destroyed automatically when this struct is dropped.
/// The caller must ensure that the Vulkan instance outlives this surface.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Get the raw Vulkan surface handle.
    ///
    /// # Note
    /// The returned handle is valid only as long as this `Surface` instance exists.
    /// Do not store this handle beyond the lifetime of the `Surface`.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Get a reference to the surface loader.
    ///
    /// This is useful for querying surface capabilities, formats, and present modes.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: The surface handle is valid and was created by ash_window::create_surface.
        // The surface loader is valid and was created from the same instance.
        // This is the only place where the surface is destroyed.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// A window wrapper that provides access to the underlying winit window
/// and raw handles for Vulkan surface creation.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    windowed_bounds: Option<WindowedBounds>,
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

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
            windowed_bounds: None,
        })
    }

    /// Get a reference to the underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Get the current width of the window.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the current height of the window.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Update the stored dimensions (call this when handling resize events).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Get the aspect ratio of the window.
    ///
    /// A minimized window reports zero height; that is treated as 1 so the
    /// ratio stays finite.
    pub fn aspect_ratio(&self) -> f32 {
        aspect(self.width, self.height)
    }

    /// Replace the window title.
    ///
    /// Used by the frame loop to surface the frames-per-second sample.
    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    /// Returns true if the window currently covers the monitor.
    pub fn is_fullscreen(&self) -> bool {
        self.window.fullscreen().is_some()
    }

    /// Enters or leaves borderless fullscreen.
    ///
    /// The windowed position and size are captured on the way in and
    /// restored on the way out. Platforms that do not report a window
    /// position (Wayland) restore the size only.
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if fullscreen {
            if self.window.fullscreen().is_none() {
                self.windowed_bounds = Some(WindowedBounds {
                    position: self.window.outer_position().ok(),
                    size: self.window.inner_size(),
                });
            }
            self.window
                .set_fullscreen(Some(Fullscreen::Borderless(None)));
        } else {
            self.window.set_fullscreen(None);
            if let Some(bounds) = self.windowed_bounds.take() {
                if let Some(position) = bounds.position {
                    self.window.set_outer_position(position);
                }
                let _ = self.window.request_inner_size(bounds.size);
            }
        }
        tracing::info!(
            "Window {} fullscreen",
            if fullscreen { "entered" } else { "left" }
        );
    }

    /// Switches between windowed and borderless fullscreen.
    pub fn toggle_fullscreen(&mut self) {
        self.set_fullscreen(!self.is_fullscreen());
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Create a Vulkan surface for this window.
    ///
    /// Returns a RAII [`Surface`] wrapper that automatically destroys the surface when dropped.
    ///
    /// # Arguments
    /// * `entry` - The Vulkan entry point
    /// * `instance` - The Vulkan instance (must outlive the returned `Surface`)
    ///
    /// # Errors
    /// Returns an error if surface creation fails due to:
    /// - Invalid window or display handles
    /// - Vulkan surface creation failure
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: The entry and instance are valid references provided by the caller.
        // The display and window handles are valid as they come from the winit window.
        // The surface will be destroyed in the Surface::drop implementation.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created successfully");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_is_width_over_height() {
        assert_eq!(aspect(1280, 720), 1280.0 / 720.0);
        assert_eq!(aspect(1000, 1000), 1.0);
    }

    #[test]
    fn aspect_ratio_stays_finite_when_minimized() {
        assert!(aspect(1280, 0).is_finite());
        assert!(aspect(0, 0).is_finite());
        assert_eq!(aspect(0, 0), 1.0);
    }
}
