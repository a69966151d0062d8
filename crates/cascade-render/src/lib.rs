//! GPU side of cascade: device selection, resources, binding sets, the
//! presentation surface, compute programs and the per-frame protocol.
//!
//! [`FrameOrchestrator`] holds the frame logic and talks to the device only
//! through [`FrameBackend`]; [`GpuBackend`] is the wgpu implementation.

pub mod backend;
pub mod bindings;
pub mod device;
pub mod frame;
pub mod gpu;
pub mod history;
pub mod memory;
pub mod pipeline;
pub mod resources;
pub mod surface;

pub use backend::{AcquireOutcome, FrameBackend, ImageLayout, RecreateOutcome};
pub use device::{AdapterProfile, DeviceRequirements, GpuContext};
pub use frame::{AccumulationHandshake, FrameBegin, FrameOrchestrator, FrameState};
pub use gpu::{create_renderer, GpuBackend, Renderer, RendererOptions};
pub use history::HistoryIndices;
pub use memory::{MemoryClass, MemoryLedger};
pub use pipeline::{Binding, ComputeStage, StageKind};
pub use surface::PresentStatus;
