//! wgpu backend for the frame pipeline.
//!
//! Implements `retrokanto_render::Device` on top of a wgpu surface. Draws
//! use a 32-bit depth buffer with a less-than test and back-face culling.
//!
//! # Invariants
//! - Uniform values are captured per draw, never shared across draws.
//! - A program/vertex-layout pair that fails validation is reported once and
//!   its draws are skipped.
//! - A lost or outdated surface is reconfigured and the frame dropped.

mod gpu;

pub use gpu::WgpuDevice;
