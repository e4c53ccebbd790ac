use glam::Mat4;
use retrokanto_common::{Color, Viewport};
use retrokanto_render::device::{
    BufferHandle, COLOR_SLOT, Device, DeviceError, POSITION_SLOT, ProgramHandle, ShaderStage,
    StageHandle, UniformLocation, VertexArrayHandle,
};
use retrokanto_render::wgsl;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const MAT4_SIZE: u64 = std::mem::size_of::<[f32; 16]>() as u64;
const INITIAL_UNIFORM_SLOTS: u64 = 64;

/// Attribute slots a vertex array feeds, with their component counts, in
/// slot order. Render pipelines are cached per layout.
type AttributeLayout = Vec<(u32, u32)>;

/// Layout used to validate a program when it is linked.
const LINK_LAYOUT: [(u32, u32); 2] = [(POSITION_SLOT, 3), (COLOR_SLOT, 3)];

struct GpuBuffer {
    buffer: wgpu::Buffer,
}

struct GpuStage {
    kind: ShaderStage,
    source: String,
    module: Arc<wgpu::ShaderModule>,
    log: Option<String>,
}

struct LinkedProgram {
    vertex: Arc<wgpu::ShaderModule>,
    fragment: Arc<wgpu::ShaderModule>,
    /// Uniform name to binding in group 0.
    uniforms: BTreeMap<String, u32>,
    /// Distinct bindings, ascending; the order dynamic offsets are supplied in.
    bindings: Vec<u32>,
    values: BTreeMap<u32, Mat4>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    layout: wgpu::PipelineLayout,
    pipelines: BTreeMap<AttributeLayout, wgpu::RenderPipeline>,
    rejected: BTreeSet<AttributeLayout>,
}

struct GpuProgram {
    linked: Option<LinkedProgram>,
    log: Option<String>,
}

/// A draw recorded during the frame, replayed at present time.
struct PendingDraw {
    program: ProgramHandle,
    attributes: Vec<(u32, BufferHandle, u32)>,
    first: u32,
    count: u32,
    /// Uniform values at draw time, one per program binding.
    uniforms: Vec<Mat4>,
}

impl PendingDraw {
    fn layout(&self) -> AttributeLayout {
        self.attributes.iter().map(|&(slot, _, c)| (slot, c)).collect()
    }
}

struct Frame {
    clear: Color,
    draws: Vec<PendingDraw>,
}

/// [`Device`] backed by wgpu and a presentation surface.
///
/// Draws are recorded as they are issued and encoded into a single render
/// pass at [`Device::present`]. Each draw captures the uniform values current
/// when it was issued; they are packed into one uniform buffer and selected
/// with dynamic offsets, so every draw sees its own transforms.
pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    adapter_info: wgpu::AdapterInfo,
    depth_view: wgpu::TextureView,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    uniform_alignment: u64,

    next_id: u32,
    buffers: BTreeMap<BufferHandle, GpuBuffer>,
    vertex_arrays: BTreeMap<VertexArrayHandle, BTreeMap<u32, (BufferHandle, u32)>>,
    stages: BTreeMap<StageHandle, GpuStage>,
    programs: BTreeMap<ProgramHandle, GpuProgram>,
    bound_vertex_array: Option<VertexArrayHandle>,
    current_program: Option<ProgramHandle>,
    frame: Option<Frame>,
}

impl WgpuDevice {
    /// Create a device presenting to `target`, sized to `viewport`.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        viewport: Viewport,
    ) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .map_err(|e| DeviceError::Init(format!("create surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| DeviceError::Init("no compatible graphics adapter".to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("retrokanto_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::Init(format!("request device: {e}")))?;

        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!("uncaptured wgpu error: {err}");
        }));

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| DeviceError::Init("surface reports no formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.width.max(1),
            height: viewport.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, config.width, config.height);
        let uniform_alignment =
            u64::from(device.limits().min_uniform_buffer_offset_alignment).max(MAT4_SIZE);
        let uniform_capacity = uniform_alignment * INITIAL_UNIFORM_SLOTS;
        let uniform_buffer = create_uniform_buffer(&device, uniform_capacity);

        let adapter_info = adapter.get_info();
        tracing::info!(
            adapter = %adapter_info.name,
            backend = adapter_info.backend.to_str(),
            format = ?format,
            "GPU initialized"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            adapter_info,
            depth_view,
            uniform_buffer,
            uniform_capacity,
            uniform_alignment,
            next_id: 0,
            buffers: BTreeMap::new(),
            vertex_arrays: BTreeMap::new(),
            stages: BTreeMap::new(),
            programs: BTreeMap::new(),
            bound_vertex_array: None,
            current_program: None,
            frame: None,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.config.width, self.config.height)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn link(&self, vertex: StageHandle, fragment: StageHandle) -> Result<LinkedProgram, String> {
        let v = self.linkable_stage(vertex, ShaderStage::Vertex)?;
        let f = self.linkable_stage(fragment, ShaderStage::Fragment)?;

        let mut uniforms = BTreeMap::new();
        let decls = wgsl::declared_uniforms(&v.source)
            .into_iter()
            .chain(wgsl::declared_uniforms(&f.source));
        for decl in decls {
            if decl.group != 0 || !decl.is_mat4() {
                return Err(format!(
                    "uniform `{}` must be a mat4x4<f32> in group 0, found {} in group {}",
                    decl.name, decl.ty, decl.group
                ));
            }
            if let Some(previous) = uniforms.insert(decl.name.clone(), decl.binding) {
                if previous != decl.binding {
                    return Err(format!(
                        "uniform `{}` declared at bindings {previous} and {}",
                        decl.name, decl.binding
                    ));
                }
            }
        }
        let bindings: Vec<u32> = uniforms
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if bindings.len() != uniforms.len() {
            return Err("two uniforms share one binding".to_string());
        }

        let bind_group_layout = (!bindings.is_empty()).then(|| {
            let entries: Vec<_> = bindings
                .iter()
                .map(|&binding| wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(MAT4_SIZE),
                    },
                    count: None,
                })
                .collect();
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("uniform_bind_group_layout"),
                    entries: &entries,
                })
        });
        let group_layouts: Vec<&wgpu::BindGroupLayout> = bind_group_layout.iter().collect();
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("program_layout"),
                bind_group_layouts: &group_layouts,
                push_constant_ranges: &[],
            });

        let mut linked = LinkedProgram {
            vertex: Arc::clone(&v.module),
            fragment: Arc::clone(&f.module),
            uniforms,
            bindings,
            values: BTreeMap::new(),
            bind_group_layout,
            layout,
            pipelines: BTreeMap::new(),
            rejected: BTreeSet::new(),
        };
        let probe = LINK_LAYOUT.to_vec();
        let pipeline = build_pipeline(&self.device, self.config.format, &linked, &probe)?;
        linked.pipelines.insert(probe, pipeline);
        Ok(linked)
    }

    fn linkable_stage(&self, handle: StageHandle, role: ShaderStage) -> Result<&GpuStage, String> {
        let stage = self
            .stages
            .get(&handle)
            .ok_or_else(|| format!("unknown {role} stage {}", handle.0))?;
        if stage.kind != role {
            return Err(format!("stage {} is a {} stage, expected {role}", handle.0, stage.kind));
        }
        if stage.log.is_some() {
            return Err(format!("{role} stage {} did not compile", handle.0));
        }
        Ok(stage)
    }

    /// Make sure `program` has a pipeline for `layout`. Returns false when
    /// the combination is invalid; the reason is logged once.
    fn ensure_pipeline(&mut self, program: ProgramHandle, layout: &AttributeLayout) -> bool {
        let Some(linked) = self.programs.get_mut(&program).and_then(|p| p.linked.as_mut()) else {
            return false;
        };
        if linked.pipelines.contains_key(layout) {
            return true;
        }
        if linked.rejected.contains(layout) {
            return false;
        }
        match build_pipeline(&self.device, self.config.format, linked, layout) {
            Ok(pipeline) => {
                linked.pipelines.insert(layout.clone(), pipeline);
                true
            }
            Err(log) => {
                tracing::error!(
                    program = program.0,
                    ?layout,
                    "program cannot draw this vertex layout: {log}"
                );
                linked.rejected.insert(layout.clone());
                false
            }
        }
    }

    fn ensure_uniform_capacity(&mut self, needed: u64) {
        if needed <= self.uniform_capacity {
            return;
        }
        self.uniform_capacity = needed.next_power_of_two();
        self.uniform_buffer = create_uniform_buffer(&self.device, self.uniform_capacity);
        tracing::debug!(bytes = self.uniform_capacity, "uniform buffer grown");
    }

    fn bind_group(&self, linked: &LinkedProgram) -> Option<wgpu::BindGroup> {
        let layout = linked.bind_group_layout.as_ref()?;
        let entries: Vec<_> = linked
            .bindings
            .iter()
            .map(|&binding| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(MAT4_SIZE),
                }),
            })
            .collect();
        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout,
            entries: &entries,
        }))
    }

    /// Pack every recorded uniform value; returns the dynamic offsets for each draw.
    fn upload_uniforms(&mut self, draws: &[PendingDraw]) -> Result<Vec<Vec<u32>>, DeviceError> {
        let align = self.uniform_alignment;
        let slots: u64 = draws.iter().map(|d| d.uniforms.len() as u64).sum();
        self.ensure_uniform_capacity(slots * align);

        let mut bytes = vec![0u8; (slots * align) as usize];
        let mut offsets = Vec::with_capacity(draws.len());
        let mut slot = 0u64;
        for draw in draws {
            let mut draw_offsets = Vec::with_capacity(draw.uniforms.len());
            for value in &draw.uniforms {
                let start = slot * align;
                let at = start as usize;
                bytes[at..at + MAT4_SIZE as usize]
                    .copy_from_slice(bytemuck::cast_slice(&value.to_cols_array()));
                draw_offsets.push(u32::try_from(start).map_err(|_| {
                    DeviceError::Allocation("uniform data exceeds 4 GiB".to_string())
                })?);
                slot += 1;
            }
            offsets.push(draw_offsets);
        }
        if !bytes.is_empty() {
            self.queue.write_buffer(&self.uniform_buffer, 0, &bytes);
        }
        Ok(offsets)
    }

    fn encode(&self, frame: &Frame, offsets: &[Vec<u32>], target: &wgpu::TextureView) {
        let bind_groups: BTreeMap<ProgramHandle, wgpu::BindGroup> = frame
            .draws
            .iter()
            .map(|d| d.program)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|handle| {
                let linked = self.programs.get(&handle)?.linked.as_ref()?;
                Some((handle, self.bind_group(linked)?))
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        {
            let Color { r, g, b, a } = frame.clear;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for (draw, draw_offsets) in frame.draws.iter().zip(offsets) {
                let Some(linked) = self
                    .programs
                    .get(&draw.program)
                    .and_then(|p| p.linked.as_ref())
                else {
                    tracing::warn!(program = draw.program.0, "program deleted mid-frame; draw skipped");
                    continue;
                };
                let Some(pipeline) = linked.pipelines.get(&draw.layout()) else {
                    continue;
                };
                let buffers: Option<Vec<&wgpu::Buffer>> = draw
                    .attributes
                    .iter()
                    .map(|(_, handle, _)| self.buffers.get(handle).map(|b| &b.buffer))
                    .collect();
                let Some(buffers) = buffers else {
                    tracing::warn!("vertex buffer deleted mid-frame; draw skipped");
                    continue;
                };

                pass.set_pipeline(pipeline);
                if let Some(group) = bind_groups.get(&draw.program) {
                    pass.set_bind_group(0, group, draw_offsets);
                }
                for (index, buffer) in (0u32..).zip(buffers) {
                    pass.set_vertex_buffer(index, buffer.slice(..));
                }
                pass.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn unknown(&self, kind: &'static str, id: u32) {
        tracing::warn!(kind, id, "unknown handle ignored");
    }
}

impl Device for WgpuDevice {
    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, DeviceError> {
        let handle = VertexArrayHandle(self.next_id());
        self.vertex_arrays.insert(handle, BTreeMap::new());
        Ok(handle)
    }

    fn create_static_buffer(&mut self, contents: &[f32]) -> Result<BufferHandle, DeviceError> {
        if contents.is_empty() {
            return Err(DeviceError::Allocation("empty vertex buffer".to_string()));
        }
        let handle = BufferHandle(self.next_id());
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vertex_buffer"),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.buffers.insert(handle, GpuBuffer { buffer });
        Ok(handle)
    }

    fn set_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        slot: u32,
        buffer: BufferHandle,
        components: u32,
    ) -> Result<(), DeviceError> {
        if vertex_format(components).is_none() {
            return Err(DeviceError::Allocation(format!(
                "{components}-component attributes are not supported"
            )));
        }
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            });
        }
        let slots = self
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(DeviceError::UnknownHandle {
                kind: "vertex array",
                id: vertex_array.0,
            })?;
        slots.insert(slot, (buffer, components));
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer) {
            Some(gpu) => gpu.buffer.destroy(),
            None => self.unknown("buffer", buffer.0),
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            self.unknown("vertex array", vertex_array.0);
        }
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.bound_vertex_array = vertex_array;
    }

    fn draw_triangles(&mut self, first: u32, count: u32) {
        if self.frame.is_none() {
            tracing::warn!("draw outside a frame ignored");
            return;
        }
        let (Some(vertex_array), Some(program)) = (self.bound_vertex_array, self.current_program)
        else {
            tracing::warn!("draw without a bound vertex array and current program ignored");
            return;
        };
        let Some(slots) = self.vertex_arrays.get(&vertex_array) else {
            self.unknown("vertex array", vertex_array.0);
            return;
        };
        let attributes: Vec<(u32, BufferHandle, u32)> = slots
            .iter()
            .map(|(&slot, &(buffer, components))| (slot, buffer, components))
            .collect();
        let layout: AttributeLayout = attributes.iter().map(|&(s, _, c)| (s, c)).collect();
        if count == 0 || !self.ensure_pipeline(program, &layout) {
            return;
        }

        let uniforms = self
            .programs
            .get(&program)
            .and_then(|p| p.linked.as_ref())
            .map(|linked| {
                linked
                    .bindings
                    .iter()
                    .map(|b| linked.values.get(b).copied().unwrap_or(Mat4::IDENTITY))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(PendingDraw {
                program,
                attributes,
                first,
                count,
                uniforms,
            });
        }
    }

    fn compile_stage(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<StageHandle, DeviceError> {
        let handle = StageHandle(self.next_id());
        let label = format!("{stage}_stage_{}", handle.0);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label.as_str()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let mut log = pollster::block_on(self.device.pop_error_scope()).map(|e| e.to_string());

        let entry = entry_attribute(stage);
        if log.is_none() && !source.contains(entry) {
            log = Some(format!("source has no {entry} entry point"));
        }

        self.stages.insert(
            handle,
            GpuStage {
                kind: stage,
                source: source.to_string(),
                module: Arc::new(module),
                log,
            },
        );
        Ok(handle)
    }

    fn stage_compile_log(&self, stage: StageHandle) -> Option<String> {
        match self.stages.get(&stage) {
            Some(record) => record.log.clone(),
            None => Some(format!("unknown stage {}", stage.0)),
        }
    }

    fn link_program(
        &mut self,
        vertex: StageHandle,
        fragment: StageHandle,
    ) -> Result<ProgramHandle, DeviceError> {
        let handle = ProgramHandle(self.next_id());
        let program = match self.link(vertex, fragment) {
            Ok(linked) => GpuProgram {
                linked: Some(linked),
                log: None,
            },
            Err(log) => GpuProgram {
                linked: None,
                log: Some(log),
            },
        };
        self.programs.insert(handle, program);
        Ok(handle)
    }

    fn program_link_log(&self, program: ProgramHandle) -> Option<String> {
        match self.programs.get(&program) {
            Some(record) => record.log.clone(),
            None => Some(format!("unknown program {}", program.0)),
        }
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        if self.stages.remove(&stage).is_none() {
            self.unknown("stage", stage.0);
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            self.unknown("program", program.0);
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.current_program = program;
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let linked = self.programs.get(&program)?.linked.as_ref()?;
        let binding = *linked.uniforms.get(name)?;
        Some(UniformLocation { program, binding })
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        if self.current_program != Some(location.program) {
            tracing::warn!(
                program = location.program.0,
                "uniform upload to a program that is not current ignored"
            );
            return;
        }
        if let Some(linked) = self
            .programs
            .get_mut(&location.program)
            .and_then(|p| p.linked.as_mut())
        {
            linked.values.insert(location.binding, *value);
        }
    }

    fn begin_frame(&mut self, clear: Color) {
        if self.frame.is_some() {
            tracing::warn!("begin_frame while a frame is open; previous draws discarded");
        }
        self.frame = Some(Frame {
            clear,
            draws: Vec::new(),
        });
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        let Some(frame) = self.frame.take() else {
            tracing::warn!("present without begin_frame ignored");
            return Ok(());
        };

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timed out; frame dropped");
                return Ok(());
            }
            Err(e) => return Err(DeviceError::Surface(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let offsets = self.upload_uniforms(&frame.draws)?;
        self.encode(&frame, &offsets, &view);
        output.present();
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        if viewport.width == 0 || viewport.height == 0 {
            return;
        }
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, viewport.width, viewport.height);
        tracing::debug!(width = viewport.width, height = viewport.height, "surface resized");
    }
}

impl Drop for WgpuDevice {
    fn drop(&mut self) {
        let live = self.buffers.len() + self.vertex_arrays.len() + self.programs.len();
        if live > 0 {
            tracing::warn!(
                buffers = self.buffers.len(),
                vertex_arrays = self.vertex_arrays.len(),
                programs = self.programs.len(),
                "device dropped with live handles"
            );
        }
    }
}

fn entry_attribute(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "@vertex",
        ShaderStage::Fragment => "@fragment",
    }
}

fn vertex_format(components: u32) -> Option<wgpu::VertexFormat> {
    match components {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}

/// Build a pipeline drawing `layout` with `program`; validation failures are
/// returned as the driver's message.
fn build_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    program: &LinkedProgram,
    layout: &[(u32, u32)],
) -> Result<wgpu::RenderPipeline, String> {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = layout
        .iter()
        .map(|&(slot, components)| {
            let format = vertex_format(components)
                .ok_or_else(|| format!("{components}-component attribute at slot {slot}"))?;
            Ok([wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: slot,
            }])
        })
        .collect::<Result<_, String>>()?;
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
        .iter()
        .zip(layout)
        .map(|(attribute, &(_, components))| wgpu::VertexBufferLayout {
            array_stride: u64::from(components) * std::mem::size_of::<f32>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attribute,
        })
        .collect();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("program_pipeline"),
        layout: Some(&program.layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: None,
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: None,
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.to_string()),
        None => Ok(pipeline),
    }
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("frame_uniforms"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_formats_cover_one_to_four_floats() {
        assert_eq!(vertex_format(3), Some(wgpu::VertexFormat::Float32x3));
        assert_eq!(vertex_format(1), Some(wgpu::VertexFormat::Float32));
        assert_eq!(vertex_format(0), None);
        assert_eq!(vertex_format(5), None);
    }

    #[test]
    fn entry_attributes_match_stage() {
        assert_eq!(entry_attribute(ShaderStage::Vertex), "@vertex");
        assert_eq!(entry_attribute(ShaderStage::Fragment), "@fragment");
    }

    #[test]
    fn mat4_is_sixty_four_bytes() {
        assert_eq!(MAT4_SIZE, 64);
        assert_eq!(
            bytemuck::cast_slice::<f32, u8>(&Mat4::IDENTITY.to_cols_array()).len() as u64,
            MAT4_SIZE
        );
    }
}
