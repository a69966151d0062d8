//! Shared constants used by both Rust and WGSL.
//! Chunk and local sizes are injected into shader preambles at load time.

/// Default side length of a simulation chunk in cells.
pub const DEFAULT_CHUNK_SIZE: u32 = 16;

/// Default compute workgroup edge for the physics stage.
pub const DEFAULT_LOCAL_SIZE: u32 = 8;

/// Edge length of the tile covered by one raytrace/postprocess workgroup.
pub const SCREEN_TILE: u32 = 32;

/// Number of retained history color images.
pub const HISTORY_COUNT: usize = 2;

/// Physics sub-passes issued per simulation tick (one per chunk octant).
pub const PHYSICS_SUBPASSES: usize = 8;

/// Frames whose device work may be unretired at once.
pub const FRAMES_IN_FLIGHT: u32 = 1;

/// Subchunk flag value meaning "simulate this subchunk".
pub const SUBCHUNK_ACTIVE: u8 = 1;

/// Side length of the world written on first run.
pub const DEFAULT_WORLD_SIZE: u16 = 64;

/// Camera distance in front of the world's -z face at startup.
pub const CAMERA_START_Z: f32 = -12.0;

/// Keyboard camera translation speed in cells per second.
pub const CAMERA_MOVE_SPEED: f32 = 30.0;

/// Keyboard camera rotation speed in radians per second.
pub const CAMERA_LOOK_SPEED: f32 = 1.0;
