use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Linear RGBA color used for clearing the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Size of the drawable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height. A zero height yields `None`.
    pub fn aspect_ratio(&self) -> Option<f32> {
        (self.height > 0).then(|| self.width as f32 / self.height as f32)
    }

    /// Center point in window coordinates, truncated to whole pixels the way
    /// integer division would place a re-centered cursor.
    pub fn center(&self) -> DVec2 {
        DVec2::new((self.width / 2) as f64, (self.height / 2) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_of_square_viewport() {
        assert_eq!(Viewport::new(600, 600).aspect_ratio(), Some(1.0));
    }

    #[test]
    fn zero_height_has_no_aspect() {
        assert_eq!(Viewport::new(800, 0).aspect_ratio(), None);
    }

    #[test]
    fn center_truncates_odd_sizes() {
        let c = Viewport::new(801, 601).center();
        assert_eq!(c, DVec2::new(400.0, 300.0));
    }

    #[test]
    fn default_color_is_opaque_black() {
        let c = Color::default();
        assert_eq!(c, Color::rgb(0.0, 0.0, 0.0));
        assert_eq!(c.a, 1.0);
    }
}
