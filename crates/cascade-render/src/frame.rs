//! Per-frame lifecycle: acquire, simulate, raytrace, denoise, present.

use std::sync::Arc;

use cascade_core::config::SceneConfig;
use cascade_core::error::{CascadeError, FormatError, ProtocolError};
use cascade_core::scene::SceneInfo;
use cascade_core::settings::{RenderSettings, SettingsSnapshot};
use cascade_sim::{plan_tick, SeamJitter};

use crate::backend::{AcquireOutcome, FrameBackend, ImageLayout, RecreateOutcome};
use crate::history::HistoryIndices;
use crate::pipeline::{
    screen_dispatch, world_dispatch, Binding, ComputeStage, PhysicsStage, PostprocessStage,
    RaytraceStage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    InProgress,
}

/// Result of [`FrameOrchestrator::begin_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBegin {
    Recording,
    /// The surface was stale and nothing was recorded. Retry next loop iteration.
    Skipped,
}

/// Two-frame accumulation reset.
///
/// A request seen at the start of frame N sets the invalidate flag for
/// frame N and clears it at the start of frame N+1.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccumulationHandshake {
    invalidate: bool,
    reset_armed: bool,
}

impl AccumulationHandshake {
    /// Advance one frame. Returns the invalidate flag for the new frame.
    pub fn advance(&mut self, requested: bool) -> bool {
        if self.reset_armed {
            self.reset_armed = false;
            self.invalidate = false;
        }
        if requested {
            self.invalidate = true;
            self.reset_armed = true;
        }
        self.invalidate
    }
}

/// Images written during a frame, moved to a writable layout at frame start.
const WRITE_TARGETS: [Binding; 5] = [
    Binding::PresentTarget,
    Binding::History(0),
    Binding::History(1),
    Binding::Normal,
    Binding::Position,
];

/// Drives the frame protocol over a [`FrameBackend`].
pub struct FrameOrchestrator<B: FrameBackend> {
    backend: B,
    settings: Arc<RenderSettings>,
    snapshot: SettingsSnapshot,
    scene: SceneInfo,
    state: FrameState,
    frame_num: u32,
    history: HistoryIndices,
    handshake: AccumulationHandshake,
    invalidate: bool,
    jitter: SeamJitter,
    world_groups: [u32; 3],
    surface_pending: bool,
}

impl<B: FrameBackend> FrameOrchestrator<B> {
    pub fn new(
        backend: B,
        settings: Arc<RenderSettings>,
        mut scene: SceneInfo,
        jitter: SeamJitter,
    ) -> Result<Self, CascadeError> {
        let w = scene.world;
        if w.x != w.y || w.y != w.z {
            return Err(FormatError::NonCubicWorld {
                x: w.x as u16,
                y: w.y as u16,
                z: w.z as u16,
            }
            .into());
        }
        SceneConfig {
            chunk_size: scene.chunk_size,
            local_size: scene.local_size,
        }
        .validate()?;
        let world_groups = world_dispatch(w.x as u32, scene.chunk_size, scene.local_size);
        log::info!("Physics dispatch: {world_groups:?} workgroups per sub-pass");

        scene.screen = backend.extent();
        let snapshot = settings.snapshot();
        Ok(Self {
            backend,
            settings,
            snapshot,
            scene,
            state: FrameState::Idle,
            frame_num: 0,
            history: HistoryIndices::for_frame(0),
            handshake: AccumulationHandshake::default(),
            invalidate: false,
            jitter,
            world_groups,
            surface_pending: false,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frame_num(&self) -> u32 {
        self.frame_num
    }

    pub fn history(&self) -> HistoryIndices {
        self.history
    }

    /// Invalidate flag pushed to the raytrace stage this frame.
    pub fn invalidating(&self) -> bool {
        self.invalidate
    }

    pub fn scene(&self) -> &SceneInfo {
        &self.scene
    }

    /// Camera updates go here between frames. The previous pose is carried
    /// forward by [`Self::render`], so skipped frames leave it untouched.
    pub fn scene_mut(&mut self) -> &mut SceneInfo {
        &mut self.scene
    }

    pub fn settings(&self) -> &Arc<RenderSettings> {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Start a frame. Returns [`FrameBegin::Skipped`] when the surface had to be recreated.
    pub fn begin_frame(&mut self) -> Result<FrameBegin, CascadeError> {
        if self.state == FrameState::InProgress {
            return Err(ProtocolError::FrameAlreadyInProgress.into());
        }
        if self.surface_pending && !self.recreate_surface()? {
            return Ok(FrameBegin::Skipped);
        }

        self.frame_num = self.frame_num.wrapping_add(1);
        let requested = self.settings.take_invalidate_request();
        self.invalidate = self.handshake.advance(requested);
        self.history = HistoryIndices::for_frame(self.frame_num);

        if self.backend.acquire_next_image()? == AcquireOutcome::OutOfDate {
            self.recreate_surface()?;
            return Ok(FrameBegin::Skipped);
        }

        self.backend.begin_commands()?;
        for target in WRITE_TARGETS {
            self.backend
                .transition(target, ImageLayout::Undefined, ImageLayout::General);
        }
        self.snapshot = self.settings.snapshot();
        self.state = FrameState::InProgress;
        Ok(FrameBegin::Recording)
    }

    /// Record physics, raytrace and denoise work for the current frame.
    pub fn render(&mut self) -> Result<(), CascadeError> {
        self.require_in_progress("render")?;
        self.backend.upload_scene_info(&self.scene.to_gpu());
        // Reprojection reads the pose of the last frame that actually rendered
        self.scene.carry_camera_forward();

        self.bind_stage::<PhysicsStage>();
        for sub in plan_tick(self.scene.chunk_size, &mut self.jitter) {
            self.push::<PhysicsStage>(&sub.constants());
            self.backend.dispatch(self.world_groups)?;
            // neighbouring subchunks read across shared faces
            self.backend.memory_barrier();
        }

        let screen = screen_dispatch(self.scene.screen);

        self.bind_stage::<RaytraceStage>();
        let raytrace = self.snapshot.raytrace_constants(self.frame_num, self.invalidate);
        self.push::<RaytraceStage>(&raytrace);
        self.backend.dispatch(screen)?;
        self.backend.memory_barrier();

        self.bind_stage::<PostprocessStage>();
        for iteration in 0..self.snapshot.denoise_iterations {
            let constants = self.snapshot.postprocess_constants(iteration);
            self.push::<PostprocessStage>(&constants);
            self.backend.dispatch(screen)?;
            self.backend.memory_barrier();
        }
        Ok(())
    }

    /// Close recording, submit and present. Recreates the surface if it went stale.
    pub fn end_frame(&mut self) -> Result<(), CascadeError> {
        self.require_in_progress("end_frame")?;
        self.backend.transition(
            Binding::PresentTarget,
            ImageLayout::General,
            ImageLayout::Present,
        );
        let status = self.backend.submit()?;
        self.state = FrameState::Idle;

        let resized = self.backend.take_resize_request();
        if status.needs_recreation() || resized {
            log::debug!("Recreating surface after present ({status:?}, resized: {resized})");
            self.recreate_surface()?;
        }
        Ok(())
    }

    /// Run one complete frame.
    pub fn draw_frame(&mut self) -> Result<FrameBegin, CascadeError> {
        let begin = self.begin_frame()?;
        if begin == FrameBegin::Recording {
            self.render()?;
            self.end_frame()?;
        }
        Ok(begin)
    }

    /// Drain device work before teardown.
    pub fn shutdown(&mut self) {
        self.backend.wait_idle();
        log::info!("Renderer drained after {} frames", self.frame_num);
    }

    /// Returns `false` if recreation was deferred for a zero-area window.
    fn recreate_surface(&mut self) -> Result<bool, CascadeError> {
        match self.backend.recreate_surface()? {
            RecreateOutcome::Deferred => {
                self.surface_pending = true;
                Ok(false)
            }
            RecreateOutcome::Rebuilt(extent) => {
                self.backend.rebuild_surface_resources(extent)?;
                self.scene.screen = extent;
                self.surface_pending = false;
                // fresh history images hold nothing to accumulate
                self.settings.request_invalidate();
                Ok(true)
            }
        }
    }

    fn require_in_progress(&self, call: &'static str) -> Result<(), ProtocolError> {
        if self.state != FrameState::InProgress {
            return Err(ProtocolError::FrameNotInProgress(call));
        }
        Ok(())
    }

    fn bind_stage<S: ComputeStage>(&mut self) {
        let bindings = S::bindings(self.history);
        self.backend.bind(S::KIND, &bindings);
    }

    fn push<S: ComputeStage>(&mut self, constants: &S::Constants) {
        self.backend.push_constants(bytemuck::bytes_of(constants));
    }
}
