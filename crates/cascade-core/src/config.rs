use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_LOCAL_SIZE, DEFAULT_WORLD_SIZE};
use crate::error::CascadeError;

/// Runtime configuration, read from a RON file.
///
/// Every field has a default, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub window: WindowConfig,
    /// Voxel state file loaded at startup.
    pub state_path: PathBuf,
    /// Directory holding `physics.wgsl`, `raytrace.wgsl` and `postprocess.wgsl`.
    pub shader_dir: PathBuf,
    pub world: WorldConfig,
    pub scene: SceneConfig,
    pub render: RenderDefaults,
    /// Fixed seed for physics seam jitter. Time-seeded when absent.
    pub jitter_seed: Option<u32>,
    /// Open the settings panel window alongside the renderer.
    pub panel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

/// Terrain written when the state file is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub size: u16,
    pub seed: u64,
    /// Overwrite an existing state file with fresh terrain.
    pub regenerate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub chunk_size: u32,
    pub local_size: u32,
}

/// Initial values of the shared render settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    pub max_ray_steps: i32,
    pub max_bounces: i32,
    pub rays_per_pixel: i32,
    pub use_blue_noise: bool,
    pub use_temporal_accumulation: bool,
    pub denoise_iterations: u32,
    pub use_smart_denoise: bool,
    pub use_atrous_denoise: bool,
    pub c_phi: f32,
    pub n_phi: f32,
    pub p_phi: f32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            state_path: PathBuf::from("state.ccst"),
            shader_dir: PathBuf::from("shaders"),
            world: WorldConfig::default(),
            scene: SceneConfig::default(),
            render: RenderDefaults::default(),
            jitter_seed: None,
            panel: true,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "cascade".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_WORLD_SIZE,
            seed: 42,
            regenerate: false,
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            local_size: DEFAULT_LOCAL_SIZE,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            max_ray_steps: 128,
            max_bounces: 3,
            rays_per_pixel: 4,
            use_blue_noise: true,
            use_temporal_accumulation: false,
            denoise_iterations: 3,
            use_smart_denoise: false,
            use_atrous_denoise: false,
            c_phi: 0.01,
            n_phi: 0.005,
            p_phi: 0.3,
        }
    }
}

impl SceneConfig {
    /// Chunk and workgroup sizes the physics and dispatch math can handle.
    pub fn validate(&self) -> Result<(), CascadeError> {
        let chunk = self.chunk_size;
        // half-chunk gaps between concurrent sub-pass regions must be at least two cells
        if chunk < 4 || chunk % 2 != 0 {
            return Err(CascadeError::Config(format!(
                "chunk_size must be an even number >= 4, got {chunk}"
            )));
        }
        if self.local_size == 0 {
            return Err(CascadeError::Config("local_size must be positive".to_string()));
        }
        Ok(())
    }
}

impl CascadeConfig {
    pub fn from_ron_str(ron_str: &str) -> Result<Self, CascadeError> {
        let options = ron::Options::default();
        let config: Self = options
            .from_str(ron_str)
            .map_err(|e| CascadeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, CascadeError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                log::info!("Loaded configuration from {}", path.display());
                Self::from_ron_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(CascadeError::Config(format!("{}: {e}", path.display()))),
        }
    }

    /// Reject values the physics and dispatch math cannot handle.
    pub fn validate(&self) -> Result<(), CascadeError> {
        self.scene.validate()?;
        if self.world.size == 0 {
            return Err(CascadeError::Config("world size must be positive".to_string()));
        }
        // postprocess is the only stage that writes the presentable image
        if self.render.denoise_iterations == 0 {
            return Err(CascadeError::Config(
                "denoise_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = CascadeConfig::from_ron_str(
            "(window: (width: 640), render: (max_bounces: 5), jitter_seed: Some(7))",
        )
        .expect("valid config");
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.render.max_bounces, 5);
        assert_eq!(config.render.max_ray_steps, 128);
        assert_eq!(config.jitter_seed, Some(7));
        assert_eq!(config.scene.chunk_size, 16);
    }

    #[test]
    fn test_empty_struct_is_default() {
        let config = CascadeConfig::from_ron_str("()").expect("valid config");
        assert_eq!(config, CascadeConfig::default());
    }

    #[test]
    fn test_odd_chunk_size_rejected() {
        let err = CascadeConfig::from_ron_str("(scene: (chunk_size: 15))").unwrap_err();
        assert!(matches!(err, CascadeError::Config(_)));
    }

    #[test]
    fn test_zero_denoise_iterations_rejected() {
        let err = CascadeConfig::from_ron_str("(render: (denoise_iterations: 0))").unwrap_err();
        assert!(matches!(err, CascadeError::Config(ref m) if m.contains("denoise_iterations")));
    }

    #[test]
    fn test_malformed_ron_rejected() {
        assert!(CascadeConfig::from_ron_str("(window: ").is_err());
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = CascadeConfig::from_ron_str(include_str!("../../../cascade.ron"))
            .expect("cascade.ron must stay valid");
        assert_eq!(config, CascadeConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("cascade-config-does-not-exist.ron");
        let config = CascadeConfig::load_or_default(&path).expect("defaults");
        assert_eq!(config.state_path, PathBuf::from("state.ccst"));
    }
}
