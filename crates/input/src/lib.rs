//! Input: keyboard state and pointer samples mapped to camera actions.
//!
//! # Invariants
//! - The frame loop consumes actions, never raw platform key codes.
//! - A pointer sample is relative to the viewport center; the platform
//!   re-centers the pointer after every sample.

pub mod action;
pub mod cursor;

pub use action::{Action, Key, KeyBindings};
pub use cursor::CursorSample;
