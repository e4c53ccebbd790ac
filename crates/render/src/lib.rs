//! Frame pipeline: device abstraction, meshes, shader pipelines, cameras and
//! the renderer that ties them together.
//!
//! # Invariants
//! - All GPU work goes through an explicit [`Device`]; there is no ambient
//!   "current" context.
//! - Meshes and pipelines own their handles and release them exactly once,
//!   through a consuming `destroy`.
//! - Uniform uploads require an [`ActivePipeline`], so they always target the
//!   current program.
//! - The uploaded transform is `projection * view * model`.
//!
//! [`RecordingDevice`] implements [`Device`] without a GPU; the wgpu backend
//! lives in `retrokanto-render-wgpu`.

pub mod camera;
pub mod device;
pub mod mesh;
pub mod recording;
mod renderer;
pub mod shader;
pub mod wgsl;

pub use camera::{Camera, CameraError, FirstPersonCamera, LookAtCamera, Projection};
pub use device::{Device, DeviceError, ShaderStage};
pub use mesh::{Mesh, MeshError};
pub use recording::RecordingDevice;
pub use renderer::{MVP_UNIFORM, Renderer};
pub use shader::{ActivePipeline, ShaderError, ShaderPipeline};
