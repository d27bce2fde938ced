//! Engine configuration
//!
//! All configuration types in one place: window, renderer and shader
//! settings, with compiled-in defaults and optional TOML overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window configuration
    pub window: WindowConfig,

    /// Renderer configuration
    pub renderer: RendererConfig,

    /// Shader binary locations
    pub shaders: ShaderConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any section the file omits.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            renderer: RendererConfig::default(),
            shaders: ShaderConfig::default(),
        }
    }
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title, also used as the Vulkan application name
    pub title: String,

    /// Window width in screen coordinates
    pub width: u32,

    /// Window height in screen coordinates
    pub height: u32,

    /// Whether the window is resizable
    pub resizable: bool,

    /// Whether to start fullscreen on the primary monitor
    pub fullscreen: bool,

    /// Target frame rate for the pacing sleep; 0 disables pacing
    pub lock_fps: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Demo".to_string(),
            width: 1280,
            height: 900,
            resizable: true,
            fullscreen: false,
            lock_fps: 60,
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Enable Vulkan validation layers (honored in debug builds only)
    pub validation: bool,

    /// Number of frames the CPU may prepare ahead of the GPU
    pub frames_in_flight: usize,

    /// Preferred presentation mode, with FIFO as the universal fallback
    pub present_mode: PresentModePreference,

    /// How to choose among suitable physical devices
    pub device_pick: DevicePickPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            present_mode: PresentModePreference::Mailbox,
            device_pick: DevicePickPolicy::FirstSuitable,
        }
    }
}

/// Preferred swapchain presentation mode
///
/// The preference is only a request; when the surface does not report the
/// mode, the renderer falls back to FIFO, which is always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// Low-latency triple buffering
    Mailbox,
    /// Strict vsync queue
    Fifo,
    /// No synchronization with vertical blank
    Immediate,
}

/// Physical device selection policy
///
/// Which of the suitable devices gets used when more than one qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePickPolicy {
    /// Take the first suitable device in enumeration order
    FirstSuitable,
    /// Rank discrete GPUs above integrated and other types,
    /// breaking ties by enumeration order
    PreferDiscrete,
}

/// Shader binary locations for the two demo pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Shaders for the pipeline with coordinates embedded in the vertex stage
    pub simple: ShaderPaths,

    /// Shaders for the pipeline fed from the vertex buffer
    pub vertex_color: ShaderPaths,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            simple: ShaderPaths::with_path_resolution("simple.vert.spv", "simple.frag.spv"),
            vertex_color: ShaderPaths::with_path_resolution(
                "vertexbuffer.vert.spv",
                "vertexbuffer.frag.spv",
            ),
        }
    }
}

/// A vertex/fragment SPIR-V pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderPaths {
    /// Path to the vertex shader SPIR-V file
    pub vertex: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment: String,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self::with_path_resolution("vert.spv", "frag.spv")
    }
}

impl ShaderPaths {
    /// Create a new shader pair from explicit paths
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Create a shader pair with automatic path resolution
    ///
    /// Tries the common shader output locations, useful for applications
    /// that might be run from different working directories.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = ["target/shaders/", "shaders/", "resources/shaders/", "../shaders/", "./"];

        let resolve = |base: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{dir}{base}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("shaders/{base}"))
        };

        Self {
            vertex: resolve(base_vertex),
            fragment: resolve(base_fragment),
        }
    }

    /// Validate that both shader files exist
    pub fn validate(&self) -> Result<(), String> {
        if !Path::new(&self.vertex).exists() {
            return Err(format!("Vertex shader not found: {}", self.vertex));
        }
        if !Path::new(&self.fragment).exists() {
            return Err(format!("Fragment shader not found: {}", self.fragment));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.window.title, "Demo");
        assert_eq!((config.window.width, config.window.height), (1280, 900));
        assert!(!config.window.fullscreen);
        assert_eq!(config.window.lock_fps, 60);
        assert_eq!(config.renderer.frames_in_flight, 2);
        assert_eq!(config.renderer.present_mode, PresentModePreference::Mailbox);
        assert_eq!(config.renderer.device_pick, DevicePickPolicy::FirstSuitable);
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let config: EngineConfig = toml::from_str(
            r#"
            [window]
            width = 640
            height = 480

            [renderer]
            present_mode = "fifo"
            device_pick = "prefer_discrete"
            "#,
        )
        .unwrap();

        assert_eq!((config.window.width, config.window.height), (640, 480));
        assert_eq!(config.window.title, "Demo");
        assert_eq!(config.renderer.present_mode, PresentModePreference::Fifo);
        assert_eq!(config.renderer.device_pick, DevicePickPolicy::PreferDiscrete);
        assert_eq!(config.renderer.frames_in_flight, 2);
    }

    #[test]
    fn unresolved_shader_paths_fall_back_to_shaders_dir() {
        let paths = ShaderPaths::with_path_resolution("nonexistent.vert.spv", "nonexistent.frag.spv");
        assert_eq!(paths.vertex, "shaders/nonexistent.vert.spv");
        assert_eq!(paths.fragment, "shaders/nonexistent.frag.spv");
        assert!(paths.validate().is_err());
    }
}
