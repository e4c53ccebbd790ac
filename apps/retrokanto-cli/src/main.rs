use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use glam::{DVec2, Vec3, Vec4};
use retrokanto_common::Viewport;
use retrokanto_game::{FrameLoop, Game, GameConfig, ScriptedFrame, ScriptedWindow, geometry};
use retrokanto_input::Key;
use retrokanto_render::{MVP_UNIFORM, RecordingDevice, wgsl};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retrokanto-cli", about = "Headless tools for the RetroKanto frame loop")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, resolved config and shader uniforms
    Info,
    /// Render one frame on a recording device and print clip-space vertices
    Render {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run the loop against scripted input and print a JSON report
    Simulate {
        /// Frames to run when no script is given
        #[arg(short, long, default_value = "60")]
        frames: usize,
        /// Keys held for every frame, e.g. `--hold w --hold d`
        #[arg(long, value_parser = parse_key)]
        hold: Vec<Key>,
        /// Pointer offset from center applied every frame, as `dx,dy`
        #[arg(long, value_parser = parse_look)]
        look: Option<DVec2>,
        /// YAML list of frames (`keys`, `look`); overrides the flags above
        #[arg(long)]
        script: Option<PathBuf>,
        /// Frame rate cap for the run
        #[arg(long)]
        fps: Option<f64>,
    },
}

fn parse_key(name: &str) -> Result<Key, String> {
    Key::from_name(name).ok_or_else(|| format!("unknown key `{name}`"))
}

fn parse_look(value: &str) -> Result<DVec2, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `dx,dy`, got `{value}`"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| format!("`{s}`: {e}"))
    };
    Ok(DVec2::new(parse(x)?, parse(y)?))
}

#[derive(Serialize)]
struct ClipVertex {
    clip: [f32; 4],
    inside: bool,
}

impl ClipVertex {
    fn new(v: Vec4) -> Self {
        let inside = v.w > 0.0 && v.x.abs() <= v.w && v.y.abs() <= v.w && (0.0..=v.w).contains(&v.z);
        Self {
            clip: v.to_array(),
            inside,
        }
    }
}

#[derive(Serialize)]
struct CameraReport {
    position: Vec3,
    horizontal_angle: f32,
    vertical_angle: f32,
    view_direction: Vec3,
}

#[derive(Serialize)]
struct SimulationReport {
    frames: u64,
    elapsed_seconds: f64,
    draws: usize,
    presents: u64,
    device_errors: Vec<String>,
    leaked_handles: bool,
    camera: CameraReport,
}

fn load_config(path: Option<&Path>) -> Result<GameConfig> {
    match path {
        Some(path) => {
            GameConfig::from_yaml_file(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(GameConfig::default()),
    }
}

fn viewport(config: &GameConfig) -> Viewport {
    Viewport::new(config.window.width, config.window.height)
}

fn camera_report(frame_loop: &FrameLoop<ScriptedWindow>) -> CameraReport {
    let camera = frame_loop.camera();
    CameraReport {
        position: camera.position(),
        horizontal_angle: camera.horizontal_angle(),
        vertical_angle: camera.vertical_angle(),
        view_direction: camera.view_direction(),
    }
}

fn info(config: &GameConfig) -> Result<()> {
    println!("retrokanto-cli v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "window: {}x{} \"{}\", target {} fps",
        config.window.width, config.window.height, config.window.title, config.target_fps
    );
    println!(
        "mesh: {:?} (cube {} vertices, triangle {} vertices)",
        config.mesh,
        geometry::cube().vertex_count(),
        geometry::triangle().vertex_count()
    );
    let shaders = &config.shaders;
    for path in [&shaders.vertex, &shaders.flat_vertex, &shaders.fragment] {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let uniforms = wgsl::declared_uniforms(&source);
                println!(
                    "shader {}: {} uniform(s), vertex inputs {:?}",
                    path.display(),
                    uniforms.len(),
                    wgsl::vertex_inputs(&source)
                );
                for u in uniforms {
                    println!("  @group({}) @binding({}) {}: {}", u.group, u.binding, u.name, u.ty);
                }
            }
            Err(err) => tracing::warn!(path = %path.display(), "shader unreadable: {err}"),
        }
    }
    Ok(())
}

fn render(config: GameConfig, json: bool) -> Result<()> {
    let window = ScriptedWindow::idle(viewport(&config), 1);
    let mut frame_loop = Game::new(window, config).initialize()?;
    frame_loop.run_until_closed()?;

    let device = frame_loop.device();
    let Some(draw) = device.last_draw() else {
        for error in device.errors() {
            tracing::error!("device: {error}");
        }
        frame_loop.shutdown();
        bail!("the frame issued no draw");
    };
    tracing::info!(vertices = draw.count, program = draw.program.0, "frame captured");
    let vertices: Vec<ClipVertex> = device
        .transformed_positions(draw, MVP_UNIFORM)
        .unwrap_or_default()
        .into_iter()
        .map(ClipVertex::new)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&vertices)?);
    } else {
        for (i, v) in vertices.iter().enumerate() {
            let [x, y, z, w] = v.clip;
            let tag = if v.inside { "" } else { "  (clipped)" };
            println!("{i:>3}: ({x:>9.4}, {y:>9.4}, {z:>9.4}, {w:>9.4}){tag}");
        }
        let inside = vertices.iter().filter(|v| v.inside).count();
        println!("{inside}/{} vertices inside the clip volume", vertices.len());
    }
    frame_loop.shutdown();
    Ok(())
}

fn script(frames: usize, hold: &[Key], look: Option<DVec2>, path: Option<&Path>) -> Result<Vec<ScriptedFrame>> {
    if let Some(path) = path {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        return serde_yaml::from_str(&yaml)
            .with_context(|| format!("parsing script {}", path.display()));
    }
    let frame = ScriptedFrame {
        keys: hold.iter().copied().collect(),
        look: look.unwrap_or(DVec2::ZERO),
    };
    Ok(vec![frame; frames])
}

fn simulate(mut config: GameConfig, frames: Vec<ScriptedFrame>, fps: Option<f64>) -> Result<()> {
    if let Some(fps) = fps {
        config.target_fps = fps;
    }
    let window = ScriptedWindow::new(viewport(&config), frames);
    let mut frame_loop = Game::new(window, config).initialize()?;
    let summary = frame_loop.run_until_closed()?;
    tracing::info!(
        frames = summary.frames,
        seconds = summary.elapsed.as_secs_f64(),
        "simulation finished"
    );

    let camera = camera_report(&frame_loop);
    let draws = frame_loop.device().draws().len();
    let (_, device): (_, RecordingDevice) = frame_loop.release();

    let report = SimulationReport {
        frames: summary.frames,
        elapsed_seconds: summary.elapsed.as_secs_f64(),
        draws,
        presents: device.frames_presented(),
        device_errors: device.errors().to_vec(),
        leaked_handles: !device.is_clean(),
        camera,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => info(&config),
        Commands::Render { json } => render(config, json),
        Commands::Simulate {
            frames,
            hold,
            look,
            script: path,
            fps,
        } => {
            let frames = script(frames, &hold, look, path.as_deref())?;
            simulate(config, frames, fps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_look_pairs() {
        assert_eq!(parse_look("3, -2.5"), Ok(DVec2::new(3.0, -2.5)));
        assert!(parse_look("3").is_err());
        assert!(parse_look("a,b").is_err());
    }

    #[test]
    fn parses_key_names() {
        assert_eq!(parse_key("W"), Ok(Key::W));
        assert!(parse_key("enter").is_err());
    }

    #[test]
    fn flags_build_a_uniform_script() {
        let frames = script(3, &[Key::W], Some(DVec2::new(1.0, 0.0)), None).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.keys.contains(&Key::W)));
        assert_eq!(frames[2].look, DVec2::new(1.0, 0.0));
    }

    fn shipped_shaders() -> GameConfig {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shaders");
        let mut config = GameConfig::default();
        config.shaders.vertex = root.join("vertex_shader.wgsl");
        config.shaders.flat_vertex = root.join("flat_vertex_shader.wgsl");
        config.shaders.fragment = root.join("fragment_shader.wgsl");
        config
    }

    #[test]
    fn render_captures_the_triangle_with_shipped_shaders() {
        let mut config = shipped_shaders();
        config.mesh = retrokanto_game::MeshKind::Triangle;
        assert!(render(config, true).is_ok());
    }

    #[test]
    fn render_fails_when_the_frame_draws_nothing() {
        let mut config = shipped_shaders();
        config.mesh = retrokanto_game::MeshKind::Triangle;
        config.shaders.flat_vertex = config.shaders.vertex.clone();
        let err = render(config, false).unwrap_err();
        assert!(err.to_string().contains("no draw"));
    }

    #[test]
    fn clip_check_matches_the_volume() {
        assert!(ClipVertex::new(Vec4::new(0.5, -0.5, 0.5, 1.0)).inside);
        assert!(!ClipVertex::new(Vec4::new(1.5, 0.0, 0.5, 1.0)).inside);
        assert!(!ClipVertex::new(Vec4::new(0.0, 0.0, -0.1, 1.0)).inside);
        assert!(!ClipVertex::new(Vec4::new(0.0, 0.0, 0.0, -1.0)).inside);
    }
}
