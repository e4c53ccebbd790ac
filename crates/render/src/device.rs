use glam::Mat4;
use retrokanto_common::{Color, Viewport};
use std::fmt;

/// Device-side data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Device-side description of how buffers feed vertex attribute slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

/// A compiled, not yet linked, shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageHandle(pub u32);

/// A linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// Where a named uniform lives inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation {
    pub program: ProgramHandle,
    pub binding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Attribute slot holding 3-component float positions.
pub const POSITION_SLOT: u32 = 0;
/// Attribute slot holding 3-component float colors.
pub const COLOR_SLOT: u32 = 1;

/// Errors raised by a device implementation.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device initialization failed: {0}")]
    Init(String),
    #[error("allocation failed: {0}")]
    Allocation(String),
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },
    #[error("surface error: {0}")]
    Surface(String),
}

/// The graphics device as seen by the frame pipeline.
///
/// Every operation takes the device explicitly; there is no ambient "current
/// context". Binding state (current vertex array, current program) lives in
/// the device and only changes through these calls.
pub trait Device {
    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, DeviceError>;

    /// Upload `contents` once as immutable vertex data.
    fn create_static_buffer(&mut self, contents: &[f32]) -> Result<BufferHandle, DeviceError>;

    /// Feed `buffer` into attribute `slot` of `vertex_array`, `components`
    /// floats per vertex, tightly packed.
    fn set_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        slot: u32,
        buffer: BufferHandle,
        components: u32,
    ) -> Result<(), DeviceError>;

    fn delete_buffer(&mut self, buffer: BufferHandle);
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Make `vertex_array` current, or clear the binding with `None`.
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);

    /// Draw `count` vertices of the bound vertex array as a triangle list
    /// using the current program.
    fn draw_triangles(&mut self, first: u32, count: u32);

    /// Compile one stage. The handle is returned even when compilation
    /// fails; query [`Device::stage_compile_log`] for the outcome.
    fn compile_stage(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<StageHandle, DeviceError>;

    /// `None` when the stage compiled, otherwise the diagnostic.
    fn stage_compile_log(&self, stage: StageHandle) -> Option<String>;

    /// Link two stages. The handle is returned even when linking fails; query
    /// [`Device::program_link_log`] for the outcome.
    fn link_program(
        &mut self,
        vertex: StageHandle,
        fragment: StageHandle,
    ) -> Result<ProgramHandle, DeviceError>;

    /// `None` when the program linked, otherwise the diagnostic.
    fn program_link_log(&self, program: ProgramHandle) -> Option<String>;

    fn delete_stage(&mut self, stage: StageHandle);
    fn delete_program(&mut self, program: ProgramHandle);

    /// Make `program` current for subsequent draws, or clear with `None`.
    fn use_program(&mut self, program: Option<ProgramHandle>);

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Upload a 4x4 matrix to a uniform of the current program. Draws issued
    /// afterwards observe this value until it is set again.
    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Mat4);

    /// Start a frame cleared to `clear`.
    fn begin_frame(&mut self, clear: Color);

    /// Finish the frame and hand it to the presentation surface.
    fn present(&mut self) -> Result<(), DeviceError>;

    /// The drawable area changed size.
    fn resize(&mut self, _viewport: Viewport) {}
}
