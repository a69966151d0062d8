pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod push;
pub mod scene;
pub mod settings;
pub mod types;

pub use config::CascadeConfig;
pub use error::{CascadeError, DeviceError, FormatError, ProtocolError, SurfaceError};
pub use grid::{GridDims, VoxelGrid};
pub use push::{PhysicsConstants, PostprocessConstants, RaytraceConstants};
pub use scene::{GpuSceneInfo, SceneInfo};
pub use settings::{RenderSettings, SettingsSnapshot};
pub use types::{Extent, ParticleType};
