use glam::DVec2;
use retrokanto_common::Viewport;
use retrokanto_input::Key;
use retrokanto_render::{Device, DeviceError};

/// Errors from bringing up the platform surface.
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("windowing system unavailable: {0}")]
    Platform(String),
    #[error("failed to create window: {0}")]
    Create(String),
    #[error("window already initialized")]
    AlreadyInitialized,
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// The platform window surface the frame loop drives.
///
/// Implementations own the OS window and hand out the graphics device bound
/// to it from [`Window::init`]. Key and pointer state reflect the most recent
/// [`Window::poll_events`].
pub trait Window {
    type Device: Device;

    /// Create the OS window and its device. Called once, before any other
    /// method is relied upon.
    fn init(&mut self) -> Result<Self::Device, WindowError>;

    fn should_close(&self) -> bool;

    /// Ask for the loop to end after the current iteration.
    fn request_close(&mut self);

    /// Process pending platform events.
    fn poll_events(&mut self);

    fn is_key_pressed(&self, key: Key) -> bool;

    /// Pointer position in window coordinates, origin top-left.
    fn cursor_position(&self) -> DVec2;

    fn set_cursor_position(&mut self, position: DVec2);

    /// Current drawable size in pixels.
    fn size(&self) -> Viewport;

    fn set_cursor_visible(&mut self, visible: bool);

    /// A size change observed since the last call, if any.
    fn take_resize(&mut self) -> Option<Viewport> {
        None
    }
}
