//! Frame loop: drives input, rendering and pacing against a platform window.
//!
//! # Invariants
//! - Initialization acquires window, shader pipeline, camera and mesh in that
//!   order; a failure at any step aborts before the first frame.
//! - Movement uses the delta time of the previous frame.
//! - Shutdown releases resources in reverse order of acquisition.

pub mod config;
mod game;
pub mod geometry;
mod pacing;
pub mod scripted;
mod window;

pub use config::{ConfigError, GameConfig, MeshKind};
pub use game::{FrameLoop, Game, GameError, RunSummary};
pub use pacing::{FramePacer, FrameTiming};
pub use scripted::{ScriptedFrame, ScriptedWindow};
pub use window::{Window, WindowError};
