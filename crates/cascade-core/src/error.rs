use thiserror::Error;

/// Errors reading or writing a voxel state file.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid magic bytes {0:?} (expected CCST)")]
    InvalidMagic([u8; 4]),

    #[error("declared volume {x}x{y}x{z} is empty")]
    EmptyVolume { x: u16, y: u16, z: u16 },

    #[error("voxel buffer holds {actual} bytes but the dimensions declare {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("truncated file: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("world {x}x{y}x{z} is not a cube")]
    NonCubicWorld { x: u16, y: u16, z: u16 },

    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors selecting a device or creating device resources.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no qualifying GPU adapter: {0}")]
    AdapterNotFound(String),

    #[error("adapter {adapter} lacks required feature {feature}")]
    MissingFeature { adapter: String, feature: String },

    #[error("adapter limit {limit} is {available}, need at least {required}")]
    LimitTooLow {
        limit: &'static str,
        required: u64,
        available: u64,
    },

    #[error("adapter shader model {available} is below the minimum {required}")]
    ShaderModelTooLow { required: String, available: String },

    #[error("failed to request GPU device: {0}")]
    DeviceRequestFailed(String),

    #[error("failed to create {label}: {reason}")]
    ResourceCreation { label: String, reason: String },

    #[error("failed to load compute program {path}: {reason}")]
    ShaderLoad { path: String, reason: String },

    #[error("binding layout {label}: {reason}")]
    BindingLayout { label: String, reason: String },

    #[error("binding pool {label} exhausted ({capacity} sets)")]
    PoolExhausted { label: String, capacity: u32 },

    #[error("binding set handle from a reset pool {label}")]
    StaleSet { label: String },
}

/// Errors building or driving the presentation surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("window has zero area")]
    ZeroArea,

    #[error("no storage-capable presentation format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported present mode: {0}")]
    UnsupportedPresentMode(String),

    #[error("surface format changed from {previous} to {current} during recreation")]
    FormatChanged { previous: String, current: String },

    #[error("surface creation failed: {0}")]
    CreationFailed(String),

    #[error("out of memory acquiring a presentable image")]
    OutOfMemory,

    #[error("failed to acquire presentable image: {0}")]
    Acquire(String),
}

/// Frame lifecycle calls made out of sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("begin_frame called while a frame is already in progress")]
    FrameAlreadyInProgress,

    #[error("{0} called without a frame in progress")]
    FrameNotInProgress(&'static str),
}

/// Top-level error for the renderer and its binary.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("window error: {0}")]
    Window(String),
}
