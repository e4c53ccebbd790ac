//! Game configuration loaded from YAML.
//!
//! Every section has defaults, so an empty document is a valid config.

use glam::Vec3;
use retrokanto_common::Color;
use retrokanto_input::KeyBindings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from loading or validating a [`GameConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "RetroKanto".to_string(),
        }
    }
}

/// Shader sources. Geometry without per-vertex colors is drawn with
/// `flat_vertex`, a stage that reads positions only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub flat_vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/vertex_shader.wgsl"),
            flat_vertex: PathBuf::from("shaders/flat_vertex_shader.wgsl"),
            fragment: PathBuf::from("shaders/fragment_shader.wgsl"),
        }
    }
}

impl ShaderConfig {
    /// Vertex stage matching the attributes a mesh provides.
    pub fn vertex_for(&self, colored: bool) -> &Path {
        if colored {
            &self.vertex
        } else {
            &self.flat_vertex
        }
    }
}

/// Initial camera placement and projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    /// Radians; π looks down −Z.
    pub horizontal_angle: f32,
    pub vertical_angle: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            position: Vec3::new(2.0, 2.0, 10.0),
            horizontal_angle: std::f32::consts::PI,
            vertical_angle: 0.0,
            speed: 3.0,
            sensitivity: 0.005,
        }
    }
}

/// Which built-in geometry the loop draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshKind {
    #[default]
    Cube,
    Triangle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub window: WindowConfig,
    pub target_fps: f64,
    pub shaders: ShaderConfig,
    pub camera: CameraConfig,
    pub clear_color: Color,
    pub mesh: MeshKind,
    pub bindings: KeyBindings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            target_fps: 61.0,
            shaders: ShaderConfig::default(),
            camera: CameraConfig::default(),
            clear_color: Color::BLACK,
            mesh: MeshKind::default(),
            bindings: KeyBindings::default(),
        }
    }
}

impl GameConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window must have a non-zero size, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        let camera = &self.camera;
        if !(camera.speed.is_finite() && camera.sensitivity.is_finite()) {
            return Err(ConfigError::Invalid(
                "camera speed and sensitivity must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrokanto_input::Key;

    #[test]
    fn defaults_match_the_stock_game() {
        let config = GameConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "RetroKanto");
        assert_eq!(config.target_fps, 61.0);
        assert_eq!(config.camera.fov_degrees, 45.0);
        assert_eq!(config.camera.position, Vec3::new(2.0, 2.0, 10.0));
        assert_eq!(config.mesh, MeshKind::Cube);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(GameConfig::from_yaml_str("{}").unwrap(), GameConfig::default());
    }

    #[test]
    fn partial_document_overrides_only_named_fields() {
        let yaml = r#"
window:
  title: Demo
target_fps: 30
mesh: triangle
bindings:
  forward: up
camera:
  position: [0.0, 0.0, 5.0]
"#;
        let config = GameConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.window.title, "Demo");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.target_fps, 30.0);
        assert_eq!(config.mesh, MeshKind::Triangle);
        assert_eq!(config.bindings.forward, Key::Up);
        assert_eq!(config.bindings.backward, Key::S);
        assert_eq!(config.camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(config.camera.far, 100.0);
    }

    #[test]
    fn rejects_non_positive_fps() {
        let err = GameConfig::from_yaml_str("target_fps: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_sized_window() {
        let err = GameConfig::from_yaml_str("window: { width: 0 }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = GameConfig::from_yaml_str("target_fps: [fast").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.yaml");
        let mut config = GameConfig::default();
        config.clear_color = Color::rgb(0.1, 0.2, 0.3);
        std::fs::write(&path, config.to_yaml().unwrap()).unwrap();
        assert_eq!(GameConfig::from_yaml_file(&path).unwrap(), config);
    }

    #[test]
    fn shipped_config_spells_out_the_defaults() {
        let shipped = GameConfig::from_yaml_str(include_str!("../../../config/game.yaml")).unwrap();
        assert_eq!(shipped, GameConfig::default());
    }

    #[test]
    fn uncolored_geometry_uses_the_flat_stage() {
        let shaders = ShaderConfig::default();
        assert_eq!(shaders.vertex_for(true), Path::new("shaders/vertex_shader.wgsl"));
        assert_eq!(shaders.vertex_for(false), Path::new("shaders/flat_vertex_shader.wgsl"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = GameConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("here.yaml"));
    }
}
