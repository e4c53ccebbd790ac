use crate::config::{ConfigError, GameConfig, MeshKind};
use crate::geometry::{self, Geometry};
use crate::pacing::{FramePacer, FrameTiming};
use crate::window::{Window, WindowError};
use glam::Mat4;
use retrokanto_common::{Color, Viewport};
use retrokanto_input::{Action, CursorSample, KeyBindings};
use retrokanto_render::{
    CameraError, Device, DeviceError, FirstPersonCamera, Mesh, MeshError, Projection, Renderer,
    ShaderError, ShaderPipeline,
};
use std::time::{Duration, Instant};

/// Errors that stop the game from starting or keep a frame from rendering.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub elapsed: Duration,
}

/// A game that has not acquired any resources yet.
pub struct Game<W: Window> {
    window: W,
    config: GameConfig,
}

impl<W: Window> Game<W> {
    pub fn new(window: W, config: GameConfig) -> Self {
        Self { window, config }
    }

    /// Acquire window, shader pipeline, camera and mesh, in that order. The
    /// vertex stage is chosen by whether the configured geometry has colors.
    ///
    /// Any failure aborts; resources acquired before it are released.
    pub fn initialize(self) -> Result<FrameLoop<W>, GameError> {
        let Game { mut window, config } = self;
        config.validate()?;
        let mut pacer = FramePacer::from_fps(config.target_fps).ok_or_else(|| {
            ConfigError::Invalid(format!("unusable target_fps {}", config.target_fps))
        })?;

        let mut device = window.init()?;
        tracing::info!(title = %config.window.title, "window initialized");

        let Geometry { positions, colors } = match config.mesh {
            MeshKind::Cube => geometry::cube(),
            MeshKind::Triangle => geometry::triangle(),
        };

        let vertex_path = config.shaders.vertex_for(colors.is_some());
        let mut shader = ShaderPipeline::new(vertex_path, &config.shaders.fragment);
        shader.init(&mut device)?;

        let camera = match build_camera(&config, window.size()) {
            Ok(camera) => camera,
            Err(err) => {
                shader.destroy(&mut device);
                return Err(err.into());
            }
        };

        let mesh = match Mesh::new(&mut device, positions, colors) {
            Ok(mesh) => mesh,
            Err(err) => {
                shader.destroy(&mut device);
                return Err(err.into());
            }
        };

        window.set_cursor_visible(false);
        pacer.start(Instant::now());
        tracing::info!(
            mesh = ?config.mesh,
            vertices = mesh.vertex_count(),
            target_fps = config.target_fps,
            "game initialized"
        );

        Ok(FrameLoop {
            window,
            device,
            shader,
            camera,
            mesh,
            bindings: config.bindings,
            clear_color: config.clear_color,
            pacer,
            frames: 0,
        })
    }

    /// Initialize, run until the window closes, then shut down.
    pub fn run(self) -> Result<RunSummary, GameError> {
        self.initialize()?.run()
    }
}

fn build_camera(config: &GameConfig, viewport: Viewport) -> Result<FirstPersonCamera, CameraError> {
    let settings = &config.camera;
    let aspect = viewport
        .aspect_ratio()
        .ok_or(CameraError::InvalidAspect(0.0))?;
    let projection = Projection::new(settings.fov_degrees, aspect, settings.near, settings.far)?;
    Ok(FirstPersonCamera::new(
        projection,
        settings.position,
        settings.horizontal_angle,
        settings.vertical_angle,
    )
    .with_speed(settings.speed)
    .with_sensitivity(settings.sensitivity))
}

/// An initialized game: owns every resource the loop touches.
pub struct FrameLoop<W: Window> {
    window: W,
    device: W::Device,
    shader: ShaderPipeline,
    camera: FirstPersonCamera,
    mesh: Mesh,
    bindings: KeyBindings,
    clear_color: Color,
    pacer: FramePacer,
    frames: u64,
}

impl<W: Window> FrameLoop<W> {
    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn device(&self) -> &W::Device {
        &self.device
    }

    pub fn camera(&self) -> &FirstPersonCamera {
        &self.camera
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One iteration: input, render, present, poll, pace.
    pub fn step(&mut self) -> Result<FrameTiming, GameError> {
        let start = Instant::now();

        self.handle_input();
        self.render()?;
        match self.device.present() {
            Ok(()) => {}
            Err(DeviceError::Surface(reason)) => {
                tracing::error!("frame not presented: {reason}");
            }
            Err(err) => return Err(err.into()),
        }
        self.window.poll_events();
        if let Some(viewport) = self.window.take_resize() {
            self.device.resize(viewport);
        }

        self.frames += 1;
        Ok(self.pacer.finish_frame(start))
    }

    /// Step until the window asks to close. Resources stay alive.
    pub fn run_until_closed(&mut self) -> Result<RunSummary, GameError> {
        let started = Instant::now();
        let first = self.frames;
        while !self.window.should_close() {
            self.step()?;
        }
        Ok(RunSummary {
            frames: self.frames - first,
            elapsed: started.elapsed(),
        })
    }

    /// Run to completion, then release everything. Resources are released
    /// even when a frame fails.
    pub fn run(mut self) -> Result<RunSummary, GameError> {
        let result = self.run_until_closed();
        self.shutdown();
        result
    }

    /// Movement scaled by the previous frame's delta time, then pointer
    /// look, then the exit check.
    fn handle_input(&mut self) {
        let dt = self.pacer.delta_time();
        let window = &self.window;
        let actions = self.bindings.active_actions(|key| window.is_key_pressed(key));

        for action in &actions {
            match action {
                Action::MoveForward => self.camera.move_forward(dt),
                Action::MoveBackward => self.camera.move_backward(dt),
                Action::MoveRight => self.camera.move_right(dt),
                Action::MoveLeft => self.camera.move_left(dt),
                Action::Exit => {}
            }
        }

        self.handle_pointer(dt);

        if actions.contains(&Action::Exit) {
            tracing::info!("exit requested");
            self.window.request_close();
        }
    }

    fn handle_pointer(&mut self, dt: f64) {
        let viewport = self.window.size();
        let sample = CursorSample::new(self.window.cursor_position(), viewport);
        self.window.set_cursor_position(viewport.center());
        if !sample.is_centered() {
            tracing::trace!(offset = ?sample.offset(), "pointer moved");
        }
        self.camera.update_orientation(
            dt,
            sample.position.x,
            sample.position.y,
            viewport.width,
            viewport.height,
        );
    }

    fn render(&mut self) -> Result<(), GameError> {
        self.device.begin_frame(self.clear_color);
        Renderer::new(&self.camera, &self.shader).render(
            &mut self.device,
            &self.mesh,
            &Mat4::IDENTITY,
        )?;
        Ok(())
    }

    /// Release mesh, camera and shader pipeline, in reverse order of
    /// acquisition, and hand back the platform pieces.
    pub fn release(self) -> (W, W::Device) {
        let FrameLoop {
            window,
            mut device,
            shader,
            camera,
            mesh,
            ..
        } = self;
        mesh.destroy(&mut device);
        drop(camera);
        shader.destroy(&mut device);
        tracing::debug!("frame loop resources released");
        (window, device)
    }

    /// [`FrameLoop::release`], then close the device and the window.
    pub fn shutdown(self) {
        let (window, device) = self.release();
        drop(device);
        drop(window);
        tracing::info!("shutdown complete");
    }
}
