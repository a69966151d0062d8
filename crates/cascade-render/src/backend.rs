use cascade_core::error::CascadeError;
use cascade_core::scene::GpuSceneInfo;
use cascade_core::types::Extent;

use crate::pipeline::{Binding, StageKind};
use crate::surface::PresentStatus;

/// Image layouts the frame protocol moves targets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    Undefined,
    General,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready,
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateOutcome {
    Rebuilt(Extent),
    /// The window has zero area; try again on a later frame.
    Deferred,
}

/// Everything the frame orchestrator needs from the device side.
///
/// Recording calls (`transition` through `memory_barrier`) are only valid
/// between `begin_commands` and `submit`.
pub trait FrameBackend {
    fn extent(&self) -> Extent;

    fn acquire_next_image(&mut self) -> Result<AcquireOutcome, CascadeError>;

    fn begin_commands(&mut self) -> Result<(), CascadeError>;

    fn transition(&mut self, target: Binding, from: ImageLayout, to: ImageLayout);

    fn upload_scene_info(&mut self, info: &GpuSceneInfo);

    fn bind(&mut self, stage: StageKind, bindings: &[Binding]);

    fn push_constants(&mut self, data: &[u8]);

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<(), CascadeError>;

    /// Make all prior writes visible to subsequent reads.
    fn memory_barrier(&mut self);

    fn submit(&mut self) -> Result<PresentStatus, CascadeError>;

    /// Consume a pending window-resize notification.
    fn take_resize_request(&mut self) -> bool;

    fn recreate_surface(&mut self) -> Result<RecreateOutcome, CascadeError>;

    fn rebuild_surface_resources(&mut self, extent: Extent) -> Result<(), CascadeError>;

    /// Block until all submitted device work has retired.
    fn wait_idle(&mut self);
}
