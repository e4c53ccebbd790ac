//! Shared value types used by the render, input, and game crates.

mod types;

pub use types::{Color, Viewport};
