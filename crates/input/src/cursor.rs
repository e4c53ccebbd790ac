use glam::DVec2;
use retrokanto_common::Viewport;

/// One pointer reading taken before the platform re-centers the cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorSample {
    /// Cursor position in window coordinates.
    pub position: DVec2,
    /// Viewport the position was read against.
    pub viewport: Viewport,
}

impl CursorSample {
    pub fn new(position: DVec2, viewport: Viewport) -> Self {
        Self { position, viewport }
    }

    /// Displacement from the viewport center. Positive x is right, positive y
    /// is down (window coordinates).
    pub fn offset(&self) -> DVec2 {
        self.position - self.viewport.center()
    }

    pub fn is_centered(&self) -> bool {
        self.offset() == DVec2::ZERO
    }
}
