use crate::device::{Device, DeviceError, ProgramHandle, ShaderStage, StageHandle};
use crate::mesh::Mesh;
use glam::Mat4;
use std::path::{Path, PathBuf};

/// Errors from building or using a shader pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read {stage} shader source {}: {source}", .path.display())]
    Read {
        stage: ShaderStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error("shader pipeline used before a successful init")]
    NotInitialized,
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// A vertex + fragment program loaded from two source files.
///
/// Construction does no device work; [`ShaderPipeline::init`] loads,
/// compiles and links. Only the linked program handle is retained.
#[derive(Debug)]
pub struct ShaderPipeline {
    vertex_path: PathBuf,
    fragment_path: PathBuf,
    program: Option<ProgramHandle>,
}

impl ShaderPipeline {
    pub fn new(vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        Self {
            vertex_path: vertex_path.into(),
            fragment_path: fragment_path.into(),
            program: None,
        }
    }

    pub fn vertex_path(&self) -> &Path {
        &self.vertex_path
    }

    pub fn fragment_path(&self) -> &Path {
        &self.fragment_path
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    /// Load both sources, compile, link, and make the program current.
    ///
    /// The intermediate stage objects are deleted whatever the outcome. A
    /// program that fails to link is deleted too. Calling `init` again
    /// replaces (and releases) a previously linked program.
    pub fn init<D: Device + ?Sized>(&mut self, device: &mut D) -> Result<(), ShaderError> {
        let vertex_source = load_source(ShaderStage::Vertex, &self.vertex_path)?;
        let fragment_source = load_source(ShaderStage::Fragment, &self.fragment_path)?;

        let vertex = device.compile_stage(ShaderStage::Vertex, &vertex_source)?;
        let fragment = match device.compile_stage(ShaderStage::Fragment, &fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                device.delete_stage(vertex);
                return Err(err.into());
            }
        };

        let stages = [(ShaderStage::Vertex, vertex), (ShaderStage::Fragment, fragment)];
        if let Some((stage, log)) = first_compile_failure(device, stages) {
            device.delete_stage(vertex);
            device.delete_stage(fragment);
            return Err(ShaderError::Compile { stage, log });
        }

        let linked = device.link_program(vertex, fragment);
        device.delete_stage(vertex);
        device.delete_stage(fragment);
        let program = linked?;

        if let Some(log) = device.program_link_log(program) {
            tracing::error!(program = program.0, "shader link error:\n{log}");
            device.delete_program(program);
            return Err(ShaderError::Link { log });
        }

        if let Some(previous) = self.program.replace(program) {
            device.delete_program(previous);
        }
        device.use_program(Some(program));
        tracing::debug!(
            program = program.0,
            vertex = %self.vertex_path.display(),
            fragment = %self.fragment_path.display(),
            "shader pipeline linked"
        );
        Ok(())
    }

    /// Make this program current. The returned token is the only way to
    /// upload uniforms, so uploads cannot target an inactive program.
    pub fn use_program<'d, D: Device + ?Sized>(
        &self,
        device: &'d mut D,
    ) -> Result<ActivePipeline<'d, D>, ShaderError> {
        let program = self.program.ok_or(ShaderError::NotInitialized)?;
        device.use_program(Some(program));
        Ok(ActivePipeline { device, program })
    }

    /// Delete the linked program, if any.
    pub fn destroy<D: Device + ?Sized>(mut self, device: &mut D) {
        if let Some(program) = self.program.take() {
            device.delete_program(program);
            tracing::debug!(program = program.0, "shader pipeline released");
        }
    }
}

impl Drop for ShaderPipeline {
    fn drop(&mut self) {
        if let Some(program) = self.program {
            tracing::warn!(
                program = program.0,
                "shader pipeline dropped without destroy; program leaked"
            );
        }
    }
}

/// Proof that a pipeline's program is current on the borrowed device.
pub struct ActivePipeline<'d, D: Device + ?Sized> {
    device: &'d mut D,
    program: ProgramHandle,
}

impl<D: Device + ?Sized> ActivePipeline<'_, D> {
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Upload `value` to the uniform called `name`. An undeclared name is
    /// skipped and reported through the log; returns whether it was uploaded.
    pub fn set_uniform_mat4(&mut self, name: &str, value: &Mat4) -> bool {
        match self.device.uniform_location(self.program, name) {
            Some(location) => {
                self.device.set_uniform_mat4(location, value);
                true
            }
            None => {
                tracing::warn!(
                    program = self.program.0,
                    uniform = name,
                    "no such uniform; upload skipped"
                );
                false
            }
        }
    }

    pub fn draw(&mut self, mesh: &Mesh) {
        mesh.draw(&mut *self.device);
    }
}

fn load_source(stage: ShaderStage, path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| {
        tracing::error!(%stage, path = %path.display(), "failed to open shader file: {source}");
        ShaderError::Read {
            stage,
            path: path.to_path_buf(),
            source,
        }
    })
}

fn first_compile_failure<D: Device + ?Sized>(
    device: &D,
    stages: [(ShaderStage, StageHandle); 2],
) -> Option<(ShaderStage, String)> {
    let mut first = None;
    for (stage, handle) in stages {
        if let Some(log) = device.stage_compile_log(handle) {
            tracing::error!(%stage, "shader compilation error:\n{log}");
            first.get_or_insert((stage, log));
        }
    }
    first
}
