//! wgpu implementation of [`FrameBackend`].

use std::path::PathBuf;
use std::sync::Arc;

use cascade_core::config::SceneConfig;
use cascade_core::error::{CascadeError, DeviceError, ProtocolError, SurfaceError};
use cascade_core::grid::VoxelGrid;
use cascade_core::scene::{GpuSceneInfo, SceneInfo};
use cascade_core::settings::RenderSettings;
use cascade_core::types::Extent;
use cascade_sim::SeamJitter;

use crate::backend::{AcquireOutcome, FrameBackend, ImageLayout, RecreateOutcome};
use crate::bindings::SetHandle;
use crate::device::GpuContext;
use crate::frame::FrameOrchestrator;
use crate::history::HistoryIndices;
use crate::pipeline::{load_program_source, Binding, ComputeProgram, StageKind};
use crate::resources::{SurfaceResources, WorldBuffers};
use crate::surface::{Acquired, AcquiredFrame, PresentStatus, SurfaceManager};

/// The renderer the application drives.
pub type Renderer = FrameOrchestrator<GpuBackend>;

/// Startup parameters for [`create_renderer`].
#[derive(Debug, Clone)]
pub struct RendererOptions {
    pub shader_dir: PathBuf,
    pub chunk_size: u32,
    pub local_size: u32,
    /// Fixed seam-jitter seed; time-seeded when absent.
    pub jitter_seed: Option<u32>,
}

impl RendererOptions {
    /// Checked before any GPU object is created.
    pub fn validate(&self) -> Result<(), CascadeError> {
        SceneConfig {
            chunk_size: self.chunk_size,
            local_size: self.local_size,
        }
        .validate()
    }
}

/// Open the device on `target`, upload the world and build every stage.
pub fn create_renderer(
    target: impl Into<wgpu::SurfaceTarget<'static>>,
    extent: Extent,
    grid: &VoxelGrid,
    settings: Arc<RenderSettings>,
    options: &RendererOptions,
) -> Result<Renderer, CascadeError> {
    options.validate()?;
    grid.require_cube()?;
    let (ctx, surface) = GpuContext::new(target, extent)?;
    let backend = GpuBackend::new(ctx, surface, grid, options)?;
    let scene = SceneInfo::new(
        backend.extent(),
        grid.dims(),
        options.chunk_size,
        options.local_size,
    );
    let jitter = match options.jitter_seed {
        Some(seed) => SeamJitter::new(seed),
        None => SeamJitter::from_time(),
    };
    FrameOrchestrator::new(backend, settings, scene, jitter)
}

/// The three compute programs, compiled against the current layouts.
struct StagePrograms {
    physics: ComputeProgram,
    raytrace: ComputeProgram,
    postprocess: ComputeProgram,
}

impl StagePrograms {
    fn build(
        ctx: &GpuContext,
        sources: &[String; 3],
        resources: &SurfaceResources,
    ) -> Result<Self, DeviceError> {
        let compile = |kind: StageKind, source: &str| {
            // layout classes do not depend on history parity
            let bindings = kind.bindings(HistoryIndices::for_frame(0));
            let layouts: Vec<&wgpu::BindGroupLayout> = bindings
                .iter()
                .map(|b| resources.layout(b.layout_class()))
                .collect();
            ComputeProgram::new(ctx, kind, source, &layouts)
        };
        Ok(Self {
            physics: compile(StageKind::Physics, &sources[0])?,
            raytrace: compile(StageKind::Raytrace, &sources[1])?,
            postprocess: compile(StageKind::Postprocess, &sources[2])?,
        })
    }

    fn get(&self, kind: StageKind) -> &ComputeProgram {
        match kind {
            StageKind::Physics => &self.physics,
            StageKind::Raytrace => &self.raytrace,
            StageKind::Postprocess => &self.postprocess,
        }
    }
}

/// Command recording state for the frame in progress.
struct Recording {
    // Dropped before the encoder is finished.
    pass: Option<wgpu::ComputePass<'static>>,
    encoder: wgpu::CommandEncoder,
    present_set: SetHandle,
    stage: Option<StageKind>,
    bindings: Vec<Binding>,
    push: Vec<u8>,
}

pub struct GpuBackend {
    // Field order is drop order.
    recording: Option<Recording>,
    acquired: Option<AcquiredFrame>,
    programs: StagePrograms,
    surface_resources: SurfaceResources,
    world: WorldBuffers,
    surface: SurfaceManager,
    ctx: GpuContext,
    sources: [String; 3],
    pending_extent: Option<Extent>,
    resize_requested: bool,
}

impl GpuBackend {
    pub fn new(
        ctx: GpuContext,
        surface: SurfaceManager,
        grid: &VoxelGrid,
        options: &RendererOptions,
    ) -> Result<Self, CascadeError> {
        let invocations = options.local_size.pow(3);
        let available = ctx.profile.limits.max_compute_invocations_per_workgroup;
        if invocations > available {
            return Err(DeviceError::LimitTooLow {
                limit: "max_compute_invocations_per_workgroup",
                required: invocations as u64,
                available: available as u64,
            }
            .into());
        }

        let present_format = surface.format().color;
        let world = WorldBuffers::new(&ctx, grid, options.chunk_size)?;
        let surface_resources =
            SurfaceResources::build(&ctx, surface.extent(), present_format, &world)?;

        let load = |kind| {
            load_program_source(
                &options.shader_dir,
                kind,
                options.chunk_size,
                options.local_size,
                present_format,
            )
        };
        let sources = [
            load(StageKind::Physics)?,
            load(StageKind::Raytrace)?,
            load(StageKind::Postprocess)?,
        ];
        let programs = StagePrograms::build(&ctx, &sources, &surface_resources)?;
        log::info!(
            "GPU backend ready: {} allocations live",
            ctx.ledger().live_allocations()
        );

        Ok(Self {
            recording: None,
            acquired: None,
            programs,
            surface_resources,
            world,
            surface,
            ctx,
            sources,
            pending_extent: None,
            resize_requested: false,
        })
    }

    /// Record a window resize. Applied at the end of the next frame.
    pub fn notify_resized(&mut self, extent: Extent) {
        self.pending_extent = Some(extent);
        self.resize_requested = true;
    }

    /// Device and adapter, shared with windows that paint alongside the renderer.
    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }
}

impl FrameBackend for GpuBackend {
    fn extent(&self) -> Extent {
        self.surface.extent()
    }

    fn acquire_next_image(&mut self) -> Result<AcquireOutcome, CascadeError> {
        match self.surface.acquire_next_image()? {
            Acquired::Frame(frame) => {
                self.acquired = Some(frame);
                Ok(AcquireOutcome::Ready)
            }
            Acquired::OutOfDate => Ok(AcquireOutcome::OutOfDate),
        }
    }

    fn begin_commands(&mut self) -> Result<(), CascadeError> {
        let frame = self
            .acquired
            .as_ref()
            .ok_or(ProtocolError::FrameNotInProgress("begin_commands"))?;
        let present_set = self
            .surface_resources
            .bind_present_target(&self.ctx, frame.view())?;
        let encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        self.recording = Some(Recording {
            pass: None,
            encoder,
            present_set,
            stage: None,
            bindings: Vec::new(),
            push: Vec::new(),
        });
        Ok(())
    }

    fn transition(&mut self, target: Binding, from: ImageLayout, to: ImageLayout) {
        // wgpu tracks image state itself; the transition survives as a debug marker
        let marker = format!("{target:?}: {from:?} -> {to:?}");
        log::trace!("{marker}");
        if let Some(rec) = self.recording.as_mut() {
            match rec.pass.as_mut() {
                Some(pass) => pass.insert_debug_marker(&marker),
                None => rec.encoder.insert_debug_marker(&marker),
            }
        }
    }

    fn upload_scene_info(&mut self, info: &GpuSceneInfo) {
        self.ctx
            .queue
            .write_buffer(self.world.scene_info.raw(), 0, bytemuck::bytes_of(info));
    }

    fn bind(&mut self, stage: StageKind, bindings: &[Binding]) {
        if let Some(rec) = self.recording.as_mut() {
            rec.stage = Some(stage);
            rec.bindings = bindings.to_vec();
        }
    }

    fn push_constants(&mut self, data: &[u8]) {
        if let Some(rec) = self.recording.as_mut() {
            rec.push.clear();
            rec.push.extend_from_slice(data);
        }
    }

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<(), CascadeError> {
        let Self {
            recording,
            programs,
            surface_resources,
            ..
        } = self;
        let rec = recording
            .as_mut()
            .ok_or(ProtocolError::FrameNotInProgress("dispatch"))?;
        let stage = rec.stage.ok_or_else(|| DeviceError::BindingLayout {
            label: "dispatch".to_string(),
            reason: "no stage bound".to_string(),
        })?;

        let Recording {
            pass,
            encoder,
            present_set,
            bindings,
            push,
            ..
        } = rec;
        let pass = pass.get_or_insert_with(|| {
            encoder
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("compute-pass"),
                    timestamp_writes: None,
                })
                .forget_lifetime()
        });

        pass.set_pipeline(programs.get(stage).pipeline());
        for (index, binding) in bindings.iter().enumerate() {
            let group = surface_resources.resolve(*binding, Some(*present_set))?;
            pass.set_bind_group(index as u32, group, &[]);
        }
        if !push.is_empty() {
            pass.set_push_constants(0, push.as_slice());
        }
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        Ok(())
    }

    fn memory_barrier(&mut self) {
        // Ending the pass orders every storage write before the next dispatch.
        if let Some(rec) = self.recording.as_mut() {
            rec.pass = None;
        }
    }

    fn submit(&mut self) -> Result<PresentStatus, CascadeError> {
        let mut rec = self.recording.take().ok_or(ProtocolError::FrameNotInProgress("submit"))?;
        rec.pass = None;
        let commands = rec.encoder.finish();
        let frame = self
            .acquired
            .take()
            .ok_or(ProtocolError::FrameNotInProgress("submit"))?;
        Ok(self.surface.submit(&self.ctx, commands, frame))
    }

    fn take_resize_request(&mut self) -> bool {
        std::mem::take(&mut self.resize_requested)
    }

    fn recreate_surface(&mut self) -> Result<RecreateOutcome, CascadeError> {
        let extent = self.pending_extent.unwrap_or_else(|| self.surface.extent());
        if extent.is_zero_area() {
            return Ok(RecreateOutcome::Deferred);
        }
        if !self.ctx.wait_idle() {
            log::warn!("Recreating the surface with work still queued");
        }
        match self.surface.recreate(&self.ctx, extent) {
            Ok(()) => {
                self.pending_extent = None;
                Ok(RecreateOutcome::Rebuilt(extent))
            }
            Err(SurfaceError::ZeroArea) => Ok(RecreateOutcome::Deferred),
            Err(e) => Err(e.into()),
        }
    }

    fn rebuild_surface_resources(&mut self, extent: Extent) -> Result<(), CascadeError> {
        let present_format = self.surface.format().color;
        let resources = SurfaceResources::build(&self.ctx, extent, present_format, &self.world)?;
        let programs = StagePrograms::build(&self.ctx, &self.sources, &resources)?;
        self.programs = programs;
        self.surface_resources = resources;
        log::debug!(
            "Auxiliary images now {:?}",
            self.surface_resources.image_extents()
        );
        Ok(())
    }

    fn wait_idle(&mut self) {
        if !self.ctx.wait_idle() {
            log::warn!("Queue did not drain before teardown");
        }
        self.ctx.ledger().log_report();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(chunk_size: u32, local_size: u32) -> RendererOptions {
        RendererOptions {
            shader_dir: PathBuf::from("shaders"),
            chunk_size,
            local_size,
            jitter_seed: Some(1),
        }
    }

    #[test]
    fn test_options_accept_defaults() {
        assert!(options(16, 8).validate().is_ok());
    }

    #[test]
    fn test_zero_sizes_rejected_before_dispatch_math() {
        assert!(matches!(options(0, 8).validate(), Err(CascadeError::Config(_))));
        assert!(matches!(options(16, 0).validate(), Err(CascadeError::Config(_))));
    }
}
