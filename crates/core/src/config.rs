//! Renderer configuration loaded from TOML.
//!
//! Every field has a default, so a missing file or a file that names only a
//! few keys is valid:
//!
//! ```toml
//! [window]
//! title = "vkframe"
//! width = 1600
//! height = 900
//!
//! [renderer]
//! render_mode = "wireframe"
//! clear_color = [0.01, 0.01, 0.01, 1.0]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "VKFRAME_CONFIG";

/// Config file looked up next to the executable.
pub const DEFAULT_CONFIG_FILE: &str = "vkframe.toml";

/// Which set of render subsystems draws a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Shadow pre-pass, lit meshes, light billboards, grid.
    #[default]
    Lit,
    /// Mesh edges plus light billboards.
    Wireframe,
    /// Flat vertex color plus grid.
    Unlit,
}

impl RenderMode {
    /// Every mode, in hotkey order.
    pub const ALL: [RenderMode; 3] = [RenderMode::Lit, RenderMode::Wireframe, RenderMode::Unlit];

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Lit => "Lit",
            RenderMode::Wireframe => "Wireframe",
            RenderMode::Unlit => "Unlit",
        }
    }
}

/// `[window]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vkframe".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// `[renderer]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererSection {
    /// Enables the Khronos validation layer when installed.
    pub validation: bool,
    pub clear_color: [f32; 4],
    pub render_mode: RenderMode,
    /// Directory holding `<name>.vert.spv` / `<name>.frag.spv`.
    pub shader_dir: PathBuf,
    /// Capacity of the per-frame material buffer, fixed at startup.
    pub max_materials: u32,
    /// Capacity of the texture array binding.
    pub max_textures: u32,
    pub shadows: bool,
    pub grid_near: f32,
    pub grid_far: f32,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            clear_color: [0.01, 0.01, 0.01, 1.0],
            render_mode: RenderMode::Lit,
            shader_dir: PathBuf::from("shaders"),
            max_materials: 64,
            max_textures: 16,
            shadows: true,
            grid_near: 0.1,
            grid_far: 500.0,
        }
    }
}

/// `[camera]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Units per second.
    pub move_speed: f32,
    /// Radians per pixel of mouse travel.
    pub look_sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 0.1,
            far: 1000.0,
            move_speed: 3.0,
            look_sensitivity: 0.003,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub window: WindowConfig,
    pub renderer: RendererSection,
    pub camera: CameraConfig,
}

impl RendererConfig {
    /// Parses a TOML document; `path` is only used in the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid for this schema.
    pub fn from_toml_str(source: &str, path: &Path) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read, or
    /// [`Error::Config`] if it does not parse.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let config = Self::from_toml_str(&source, path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads from `$VKFRAME_CONFIG`, or `vkframe.toml` next to the executable.
    ///
    /// # Errors
    ///
    /// See [`RendererConfig::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Resolves the config path without reading it.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }
}
