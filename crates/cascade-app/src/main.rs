mod cli;
mod input;
mod ui;

use std::error::Error;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use cascade_core::config::CascadeConfig;
use cascade_core::error::CascadeError;
use cascade_core::grid::VoxelGrid;
use cascade_core::settings::RenderSettings;
use cascade_core::types::Extent;
use cascade_render::{create_renderer, Renderer, RendererOptions};
use cascade_world::TerrainGenerator;

use cli::{CliCommand, USAGE};
use input::CameraController;
use ui::PanelWindow;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        let mut source = e.source();
        while let Some(cause) = source {
            log::error!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

fn run() -> Result<(), CascadeError> {
    let args = match cli::parse_args(std::env::args().skip(1))? {
        CliCommand::Run(args) => args,
        CliCommand::Help => {
            eprintln!("{USAGE}");
            return Ok(());
        }
    };

    let mut config = CascadeConfig::load_or_default(&args.config)?;
    args.apply(&mut config);
    config.validate()?;

    let grid = prepare_world(&config)?;
    let settings = Arc::new(RenderSettings::new(&config.render));

    let event_loop = EventLoop::new().map_err(|e| CascadeError::Window(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = CascadeApp::new(config, grid, settings);
    event_loop
        .run_app(&mut app)
        .map_err(|e| CascadeError::Window(e.to_string()))?;

    match app.failure {
        Some(e) => Err(e),
        None => {
            log::info!("Shut down cleanly");
            Ok(())
        }
    }
}

/// Owns the render window, the optional settings panel and the frame loop.
struct CascadeApp {
    config: CascadeConfig,
    settings: Arc<RenderSettings>,
    /// Handed to the GPU on first resume.
    grid: Option<VoxelGrid>,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    panel: Option<PanelWindow>,
    controller: CameraController,
    last_frame: Instant,
    failure: Option<CascadeError>,
}

impl CascadeApp {
    fn new(config: CascadeConfig, grid: VoxelGrid, settings: Arc<RenderSettings>) -> Self {
        Self {
            config,
            settings,
            grid: Some(grid),
            window: None,
            renderer: None,
            panel: None,
            controller: CameraController::new(),
            last_frame: Instant::now(),
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: CascadeError) {
        self.failure = Some(error);
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), CascadeError> {
        let Some(grid) = self.grid.take() else {
            return Ok(());
        };
        let attributes = Window::default_attributes()
            .with_title(self.config.window.title.as_str())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| CascadeError::Window(e.to_string()))?,
        );
        let size = window.inner_size();

        let options = RendererOptions {
            shader_dir: self.config.shader_dir.clone(),
            chunk_size: self.config.scene.chunk_size,
            local_size: self.config.scene.local_size,
            jitter_seed: self.config.jitter_seed,
        };
        // The GPU holds its own copy of the grid once this returns
        let renderer = create_renderer(
            window.clone(),
            Extent::new(size.width, size.height),
            &grid,
            self.settings.clone(),
            &options,
        )?;

        if self.config.panel {
            let gpu = renderer.backend().context();
            match PanelWindow::new(event_loop, gpu, self.settings.clone()) {
                Ok(panel) => self.panel = Some(panel),
                Err(e) => log::warn!("Settings panel unavailable: {e}"),
            }
        }

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.controller.update(renderer.scene_mut(), dt);
        if let Err(e) = renderer.draw_frame() {
            self.fail(event_loop, e);
        }
    }
}

impl ApplicationHandler for CascadeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.panel.as_ref().is_some_and(|p| p.id() == window_id) {
            let close = match (self.panel.as_mut(), self.renderer.as_ref()) {
                (Some(panel), Some(renderer)) => {
                    panel.handle_event(renderer.backend().context(), &event)
                }
                _ => false,
            };
            if close {
                log::info!("Settings panel closed");
                self.panel = None;
            }
            return;
        }
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer
                        .backend_mut()
                        .notify_resized(Extent::new(size.width, size.height));
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape && state == ElementState::Pressed {
                    event_loop.exit();
                } else {
                    self.controller.handle_key(code, state.is_pressed());
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.settings.shutdown_requested() {
            event_loop.exit();
        } else if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // The panel paints with the renderer's device, so it goes first
        self.panel = None;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.shutdown();
        }
        self.settings.request_shutdown();
    }
}

/// Ensure a state file exists, generating terrain on first run, then load it.
fn prepare_world(config: &CascadeConfig) -> Result<VoxelGrid, CascadeError> {
    let path = &config.state_path;
    if config.world.regenerate || !path.exists() {
        log::info!(
            "Generating {0}x{0}x{0} world (seed {1}) into {2}",
            config.world.size,
            config.world.seed,
            path.display()
        );
        let grid = TerrainGenerator::new(config.world.seed).generate(config.world.size)?;
        cascade_persist::save(path, &grid)?;
    }
    let grid = cascade_persist::load(path)?;
    grid.require_cube()?;
    Ok(grid)
}
