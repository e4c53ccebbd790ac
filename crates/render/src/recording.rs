//! Headless device that records every call instead of touching a GPU.
//!
//! Used by tests and the CLI. It keeps the same bookkeeping a real driver
//! would (live handles, current bindings, per-program uniform values) so
//! ordering and ownership mistakes show up as entries in [`RecordingDevice::errors`].

use crate::device::{
    BufferHandle, Device, DeviceError, POSITION_SLOT, ProgramHandle, ShaderStage, StageHandle,
    UniformLocation, VertexArrayHandle,
};
use crate::wgsl;
use glam::{Mat4, Vec4};
use retrokanto_common::{Color, Viewport};
use std::collections::BTreeMap;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateVertexArray(VertexArrayHandle),
    CreateBuffer {
        buffer: BufferHandle,
        floats: usize,
    },
    SetVertexAttribute {
        vertex_array: VertexArrayHandle,
        slot: u32,
        buffer: BufferHandle,
        components: u32,
    },
    DeleteBuffer(BufferHandle),
    DeleteVertexArray(VertexArrayHandle),
    BindVertexArray(Option<VertexArrayHandle>),
    DrawTriangles {
        first: u32,
        count: u32,
    },
    CompileStage {
        stage: StageHandle,
        kind: ShaderStage,
    },
    LinkProgram {
        program: ProgramHandle,
        vertex: StageHandle,
        fragment: StageHandle,
    },
    DeleteStage(StageHandle),
    DeleteProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    SetUniformMat4 {
        location: UniformLocation,
        value: Mat4,
    },
    BeginFrame(Color),
    Present,
    Resize(Viewport),
}

/// A draw as the device executed it, with the uniform values it observed.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub vertex_array: VertexArrayHandle,
    pub program: ProgramHandle,
    pub first: u32,
    pub count: u32,
    pub uniforms: BTreeMap<String, Mat4>,
}

impl DrawCall {
    pub fn uniform(&self, name: &str) -> Option<Mat4> {
        self.uniforms.get(name).copied()
    }
}

#[derive(Debug)]
struct StageRecord {
    kind: ShaderStage,
    source: String,
    log: Option<String>,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    uniforms: BTreeMap<String, u32>,
    /// Attribute locations the vertex stage reads.
    inputs: Vec<u32>,
    values: BTreeMap<u32, Mat4>,
    log: Option<String>,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_id: u32,
    commands: Vec<Command>,
    buffers: BTreeMap<BufferHandle, Vec<f32>>,
    vertex_arrays: BTreeMap<VertexArrayHandle, BTreeMap<u32, (BufferHandle, u32)>>,
    stages: BTreeMap<StageHandle, StageRecord>,
    programs: BTreeMap<ProgramHandle, ProgramRecord>,
    bound_vertex_array: Option<VertexArrayHandle>,
    current_program: Option<ProgramHandle>,
    viewport: Option<Viewport>,
    draws: Vec<DrawCall>,
    errors: Vec<String>,
    frames_begun: u64,
    frames_presented: u64,
    compile_failure: Option<(ShaderStage, String)>,
    link_failure: Option<String>,
    buffer_limit: Option<usize>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next compile of `stage` fails with `log`.
    pub fn fail_next_compile(&mut self, stage: ShaderStage, log: impl Into<String>) {
        self.compile_failure = Some((stage, log.into()));
    }

    /// The next link fails with `log`.
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.link_failure = Some(log.into());
    }

    /// Buffer allocation fails once `limit` buffers are live.
    pub fn limit_buffers(&mut self, limit: usize) {
        self.buffer_limit = Some(limit);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn last_draw(&self) -> Option<&DrawCall> {
        self.draws.last()
    }

    /// Misuse detected so far: double frees, unknown handles, draws without
    /// bindings or with missing vertex inputs, uploads to a program that is
    /// not current.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// True when every allocated object has been released.
    pub fn is_clean(&self) -> bool {
        self.buffers.is_empty()
            && self.vertex_arrays.is_empty()
            && self.stages.is_empty()
            && self.programs.is_empty()
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayHandle> {
        self.bound_vertex_array
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Data feeding `slot` of `vertex_array`, with its component count.
    pub fn attribute_data(
        &self,
        vertex_array: VertexArrayHandle,
        slot: u32,
    ) -> Option<(&[f32], u32)> {
        let (buffer, components) = self.vertex_arrays.get(&vertex_array)?.get(&slot)?;
        let data = self.buffers.get(buffer)?;
        Some((data.as_slice(), *components))
    }

    /// Apply the draw's `uniform` matrix to every position it drew.
    pub fn transformed_positions(&self, draw: &DrawCall, uniform: &str) -> Option<Vec<Vec4>> {
        let matrix = draw.uniform(uniform)?;
        let (data, components) = self.attribute_data(draw.vertex_array, POSITION_SLOT)?;
        if components != 3 {
            return None;
        }
        let first = draw.first as usize;
        let count = draw.count as usize;
        Some(
            data.chunks_exact(3)
                .skip(first)
                .take(count)
                .map(|p| matrix * Vec4::new(p[0], p[1], p[2], 1.0))
                .collect(),
        )
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn misuse(&mut self, message: String) {
        tracing::error!("{message}");
        self.errors.push(message);
    }
}

impl Device for RecordingDevice {
    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, DeviceError> {
        let handle = VertexArrayHandle(self.next_id());
        self.vertex_arrays.insert(handle, BTreeMap::new());
        self.commands.push(Command::CreateVertexArray(handle));
        Ok(handle)
    }

    fn create_static_buffer(&mut self, contents: &[f32]) -> Result<BufferHandle, DeviceError> {
        if self.buffer_limit.is_some_and(|limit| self.buffers.len() >= limit) {
            return Err(DeviceError::Allocation(format!(
                "buffer limit of {} reached",
                self.buffers.len()
            )));
        }
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, contents.to_vec());
        self.commands.push(Command::CreateBuffer {
            buffer: handle,
            floats: contents.len(),
        });
        Ok(handle)
    }

    fn set_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        slot: u32,
        buffer: BufferHandle,
        components: u32,
    ) -> Result<(), DeviceError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            });
        }
        let attributes = self
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(DeviceError::UnknownHandle {
                kind: "vertex array",
                id: vertex_array.0,
            })?;
        attributes.insert(slot, (buffer, components));
        self.commands.push(Command::SetVertexAttribute {
            vertex_array,
            slot,
            buffer,
            components,
        });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.commands.push(Command::DeleteBuffer(buffer));
        if self.buffers.remove(&buffer).is_none() {
            self.misuse(format!("delete of unknown buffer {}", buffer.0));
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.commands.push(Command::DeleteVertexArray(vertex_array));
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            self.misuse(format!("delete of unknown vertex array {}", vertex_array.0));
        }
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.commands.push(Command::BindVertexArray(vertex_array));
        if let Some(handle) = vertex_array {
            if !self.vertex_arrays.contains_key(&handle) {
                self.misuse(format!("bind of unknown vertex array {}", handle.0));
                return;
            }
        }
        self.bound_vertex_array = vertex_array;
    }

    fn draw_triangles(&mut self, first: u32, count: u32) {
        self.commands.push(Command::DrawTriangles { first, count });
        let (Some(vertex_array), Some(program)) = (self.bound_vertex_array, self.current_program)
        else {
            self.misuse("draw without a bound vertex array and current program".to_string());
            return;
        };
        let missing: Vec<u32> = match (
            self.programs.get(&program),
            self.vertex_arrays.get(&vertex_array),
        ) {
            (Some(record), Some(slots)) => record
                .inputs
                .iter()
                .copied()
                .filter(|location| !slots.contains_key(location))
                .collect(),
            _ => Vec::new(),
        };
        if !missing.is_empty() {
            self.misuse(format!(
                "program {} reads vertex locations {missing:?} that vertex array {} does not feed",
                program.0, vertex_array.0
            ));
            return;
        }
        let uniforms: BTreeMap<String, Mat4> = self
            .programs
            .get(&program)
            .map(|record| {
                record
                    .uniforms
                    .iter()
                    .filter_map(|(name, binding)| {
                        record.values.get(binding).map(|v| (name.clone(), *v))
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.draws.push(DrawCall {
            vertex_array,
            program,
            first,
            count,
            uniforms,
        });
    }

    fn compile_stage(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<StageHandle, DeviceError> {
        let handle = StageHandle(self.next_id());
        let log = match self.compile_failure.take() {
            Some((failing, log)) if failing == stage => Some(log),
            other => {
                self.compile_failure = other;
                source
                    .trim()
                    .is_empty()
                    .then(|| format!("{stage} shader source is empty"))
            }
        };
        self.stages.insert(
            handle,
            StageRecord {
                kind: stage,
                source: source.to_string(),
                log,
            },
        );
        self.commands.push(Command::CompileStage {
            stage: handle,
            kind: stage,
        });
        Ok(handle)
    }

    fn stage_compile_log(&self, stage: StageHandle) -> Option<String> {
        self.stages.get(&stage).and_then(|s| s.log.clone())
    }

    fn link_program(
        &mut self,
        vertex: StageHandle,
        fragment: StageHandle,
    ) -> Result<ProgramHandle, DeviceError> {
        let program = ProgramHandle(self.next_id());
        let mut record = ProgramRecord::default();

        match (self.stages.get(&vertex), self.stages.get(&fragment)) {
            (Some(v), Some(f)) => {
                if v.kind != ShaderStage::Vertex || f.kind != ShaderStage::Fragment {
                    record.log = Some("stages attached in the wrong roles".to_string());
                } else if v.log.is_some() || f.log.is_some() {
                    record.log = Some("an attached stage failed to compile".to_string());
                } else if let Some(log) = self.link_failure.take() {
                    record.log = Some(log);
                } else {
                    record.inputs = wgsl::vertex_inputs(&v.source);
                    for decl in wgsl::declared_uniforms(&v.source)
                        .into_iter()
                        .chain(wgsl::declared_uniforms(&f.source))
                    {
                        record.uniforms.insert(decl.name, decl.binding);
                    }
                }
            }
            _ => record.log = Some("unknown stage handle attached".to_string()),
        }

        self.programs.insert(program, record);
        self.commands.push(Command::LinkProgram {
            program,
            vertex,
            fragment,
        });
        Ok(program)
    }

    fn program_link_log(&self, program: ProgramHandle) -> Option<String> {
        self.programs.get(&program).and_then(|p| p.log.clone())
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        self.commands.push(Command::DeleteStage(stage));
        if self.stages.remove(&stage).is_none() {
            self.misuse(format!("delete of unknown stage {}", stage.0));
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.commands.push(Command::DeleteProgram(program));
        if self.programs.remove(&program).is_none() {
            self.misuse(format!("delete of unknown program {}", program.0));
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.commands.push(Command::UseProgram(program));
        if let Some(handle) = program {
            if !self.programs.contains_key(&handle) {
                self.misuse(format!("use of unknown program {}", handle.0));
                return;
            }
        }
        self.current_program = program;
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let binding = *self.programs.get(&program)?.uniforms.get(name)?;
        Some(UniformLocation { program, binding })
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        self.commands.push(Command::SetUniformMat4 {
            location,
            value: *value,
        });
        if self.current_program != Some(location.program) {
            self.misuse(format!(
                "uniform upload to program {} which is not current",
                location.program.0
            ));
            return;
        }
        if let Some(record) = self.programs.get_mut(&location.program) {
            record.values.insert(location.binding, *value);
        }
    }

    fn begin_frame(&mut self, clear: Color) {
        self.frames_begun += 1;
        self.commands.push(Command::BeginFrame(clear));
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        self.frames_presented += 1;
        self.commands.push(Command::Present);
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.commands.push(Command::Resize(viewport));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "@group(0) @binding(0) var<uniform> mvp: mat4x4<f32>;";

    fn linked(device: &mut RecordingDevice) -> ProgramHandle {
        let v = device.compile_stage(ShaderStage::Vertex, SOURCE).unwrap();
        let f = device.compile_stage(ShaderStage::Fragment, "fn fs() {}").unwrap();
        let p = device.link_program(v, f).unwrap();
        device.delete_stage(v);
        device.delete_stage(f);
        p
    }

    #[test]
    fn double_delete_is_reported() {
        let mut device = RecordingDevice::new();
        let b = device.create_static_buffer(&[0.0; 3]).unwrap();
        device.delete_buffer(b);
        assert!(device.errors().is_empty());
        device.delete_buffer(b);
        assert_eq!(device.errors().len(), 1);
    }

    #[test]
    fn empty_source_fails_to_compile() {
        let mut device = RecordingDevice::new();
        let s = device.compile_stage(ShaderStage::Fragment, "  \n").unwrap();
        assert!(device.stage_compile_log(s).unwrap().contains("empty"));
    }

    #[test]
    fn injected_compile_failure_targets_one_stage() {
        let mut device = RecordingDevice::new();
        device.fail_next_compile(ShaderStage::Fragment, "boom");
        let v = device.compile_stage(ShaderStage::Vertex, SOURCE).unwrap();
        let f = device.compile_stage(ShaderStage::Fragment, SOURCE).unwrap();
        assert_eq!(device.stage_compile_log(v), None);
        assert_eq!(device.stage_compile_log(f).as_deref(), Some("boom"));
    }

    #[test]
    fn uniform_upload_requires_current_program() {
        let mut device = RecordingDevice::new();
        let p = linked(&mut device);
        let loc = device.uniform_location(p, "mvp").unwrap();
        device.set_uniform_mat4(loc, &Mat4::IDENTITY);
        assert_eq!(device.errors().len(), 1);

        device.use_program(Some(p));
        device.set_uniform_mat4(loc, &Mat4::IDENTITY);
        assert_eq!(device.errors().len(), 1);
    }

    #[test]
    fn unknown_uniform_has_no_location() {
        let mut device = RecordingDevice::new();
        let p = linked(&mut device);
        assert!(device.uniform_location(p, "missing").is_none());
    }

    #[test]
    fn draw_snapshots_current_uniform_values() {
        let mut device = RecordingDevice::new();
        let p = linked(&mut device);
        let vao = device.create_vertex_array().unwrap();
        let buf = device.create_static_buffer(&[0.0; 9]).unwrap();
        device.set_vertex_attribute(vao, 0, buf, 3).unwrap();
        device.use_program(Some(p));
        let loc = device.uniform_location(p, "mvp").unwrap();

        device.bind_vertex_array(Some(vao));
        device.set_uniform_mat4(loc, &Mat4::from_scale(glam::Vec3::splat(2.0)));
        device.draw_triangles(0, 3);
        device.set_uniform_mat4(loc, &Mat4::IDENTITY);
        device.draw_triangles(0, 3);

        let draws = device.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(
            draws[0].uniform("mvp"),
            Some(Mat4::from_scale(glam::Vec3::splat(2.0)))
        );
        assert_eq!(draws[1].uniform("mvp"), Some(Mat4::IDENTITY));
    }

    #[test]
    fn draw_without_bindings_is_misuse() {
        let mut device = RecordingDevice::new();
        device.draw_triangles(0, 3);
        assert!(device.draws().is_empty());
        assert_eq!(device.errors().len(), 1);
    }

    #[test]
    fn draw_missing_a_vertex_input_is_rejected() {
        let mut device = RecordingDevice::new();
        let v = device
            .compile_stage(
                ShaderStage::Vertex,
                "@vertex fn vs(@location(0) p: vec3<f32>, @location(1) c: vec3<f32>) {}",
            )
            .unwrap();
        let f = device.compile_stage(ShaderStage::Fragment, "fn fs() {}").unwrap();
        let p = device.link_program(v, f).unwrap();
        let vao = device.create_vertex_array().unwrap();
        let buf = device.create_static_buffer(&[0.0; 9]).unwrap();
        device.set_vertex_attribute(vao, 0, buf, 3).unwrap();
        device.use_program(Some(p));
        device.bind_vertex_array(Some(vao));

        device.draw_triangles(0, 3);
        assert!(device.draws().is_empty());
        assert_eq!(device.errors().len(), 1);
        assert!(device.errors()[0].contains("[1]"));

        device.set_vertex_attribute(vao, 1, buf, 3).unwrap();
        device.draw_triangles(0, 3);
        assert_eq!(device.draws().len(), 1);
    }

    #[test]
    fn buffer_limit_fails_allocation() {
        let mut device = RecordingDevice::new();
        device.limit_buffers(1);
        assert!(device.create_static_buffer(&[1.0]).is_ok());
        assert!(matches!(
            device.create_static_buffer(&[1.0]),
            Err(DeviceError::Allocation(_))
        ));
    }
}
