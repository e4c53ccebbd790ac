mod platform;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use platform::WinitWindow;
use retrokanto_common::Viewport;
use retrokanto_game::{Game, GameConfig, MeshKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retrokanto-desktop", about = "RetroKanto first-person viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    title: Option<String>,

    /// Frame rate cap
    #[arg(long)]
    fps: Option<f64>,

    #[arg(long)]
    vertex_shader: Option<PathBuf>,

    /// Vertex stage for geometry without colors
    #[arg(long)]
    flat_vertex_shader: Option<PathBuf>,

    #[arg(long)]
    fragment_shader: Option<PathBuf>,

    /// Geometry to draw
    #[arg(long, value_enum)]
    mesh: Option<MeshArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MeshArg {
    Cube,
    Triangle,
}

impl From<MeshArg> for MeshKind {
    fn from(arg: MeshArg) -> Self {
        match arg {
            MeshArg::Cube => MeshKind::Cube,
            MeshArg::Triangle => MeshKind::Triangle,
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<GameConfig> {
        let mut config = match &self.config {
            Some(path) => GameConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => GameConfig::default(),
        };
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if let Some(title) = &self.title {
            config.window.title = title.clone();
        }
        if let Some(fps) = self.fps {
            config.target_fps = fps;
        }
        if let Some(path) = &self.vertex_shader {
            config.shaders.vertex = path.clone();
        }
        if let Some(path) = &self.flat_vertex_shader {
            config.shaders.flat_vertex = path.clone();
        }
        if let Some(path) = &self.fragment_shader {
            config.shaders.fragment = path.clone();
        }
        if let Some(mesh) = self.mesh {
            config.mesh = mesh.into();
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    tracing::info!("retrokanto-desktop starting");

    let config = cli.load_config()?;
    let size = Viewport::new(config.window.width, config.window.height);
    let window = WinitWindow::new(&config.window.title, size)?;

    let summary = Game::new(window, config).run()?;
    tracing::info!(
        frames = summary.frames,
        seconds = summary.elapsed.as_secs_f64(),
        "retrokanto-desktop finished"
    );
    Ok(())
}
