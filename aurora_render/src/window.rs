/// Windowing collaborator interface
///
/// The renderer only needs to know the framebuffer extent, whether a resize
/// or close happened, and a way to pump or block on events while the window
/// is minimized. Surface creation belongs to the backend device constructor,
/// which receives the native window directly.

use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;

pub trait WindowSurface: Send {
    /// Current framebuffer extent in pixels (0 in a dimension when minimized)
    fn current_extent(&self) -> (u32, u32);

    /// Whether a resize happened since the last call (cleared on read)
    fn resize_requested(&mut self) -> bool;

    /// Whether the user asked to close the window
    fn close_requested(&self) -> bool;

    /// Process pending events without blocking
    fn poll_events(&mut self);

    /// Block until at least one event arrives, then process it
    fn wait_events(&mut self);
}

/// Window state tracked from winit events
///
/// Applications feed every `WindowEvent` into `handle_event` and build their
/// `WindowSurface` implementation on top of it.
#[derive(Debug, Clone, Default)]
pub struct WindowState {
    extent: (u32, u32),
    resized: bool,
    close: bool,
}

impl WindowState {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        Self {
            extent: (size.width, size.height),
            resized: false,
            close: false,
        }
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.extent = (size.width, size.height);
                self.resized = true;
            }
            WindowEvent::CloseRequested => self.close = true,
            _ => {}
        }
    }

    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    /// Read and clear the resize flag
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    pub fn close_requested(&self) -> bool {
        self.close
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
