//! Settings panel in a second window on the renderer's event loop.
//!
//! The panel paints with the renderer's device and touches the render flow
//! only through the shared [`RenderSettings`].

pub mod settings;

use std::sync::Arc;

use egui_wgpu::ScreenDescriptor;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use cascade_core::error::{CascadeError, SurfaceError};
use cascade_core::settings::RenderSettings;
use cascade_render::GpuContext;

const PANEL_WIDTH: u32 = 360;
const PANEL_HEIGHT: u32 = 520;

/// egui context, input state and wgpu painter for the panel window.
pub struct PanelWindow {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    settings: Arc<RenderSettings>,
}

impl PanelWindow {
    pub fn new(
        event_loop: &ActiveEventLoop,
        gpu: &GpuContext,
        settings: Arc<RenderSettings>,
    ) -> Result<Self, CascadeError> {
        let attributes = Window::default_attributes()
            .with_title("cascade settings")
            .with_inner_size(PhysicalSize::new(PANEL_WIDTH, PANEL_HEIGHT));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| CascadeError::Window(e.to_string()))?,
        );

        let surface = gpu
            .instance
            .create_surface(window.clone())
            .map_err(|e| SurfaceError::CreationFailed(e.to_string()))?;
        let size = window.inner_size();
        let mut config = surface
            .get_default_config(&gpu.adapter, size.width.max(1), size.height.max(1))
            .ok_or_else(|| {
                SurfaceError::UnsupportedFormat("panel surface unsupported by the adapter".into())
            })?;
        // The panel shares the event loop with the renderer and must not block it on vsync
        config.present_mode = wgpu::PresentMode::AutoNoVsync;
        surface.configure(&gpu.device, &config);

        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window.as_ref(),
            Some(window.scale_factor() as f32),
            window.theme(),
            None,
        );
        let renderer = egui_wgpu::Renderer::new(&gpu.device, config.format, None, 1, false);

        log::info!("Settings panel opened ({:?})", config.format);
        window.request_redraw();
        Ok(Self {
            window,
            surface,
            config,
            ctx,
            state,
            renderer,
            settings,
        })
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    /// Route one window event. Returns `true` when the panel asked to close.
    pub fn handle_event(&mut self, gpu: &GpuContext, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => return true,
            WindowEvent::RedrawRequested => {
                self.redraw(gpu);
                return false;
            }
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                self.config.width = size.width;
                self.config.height = size.height;
                self.surface.configure(&gpu.device, &self.config);
            }
            _ => {}
        }
        if self.state.on_window_event(&self.window, event).repaint {
            self.window.request_redraw();
        }
        false
    }

    fn screen_descriptor(&self) -> ScreenDescriptor {
        ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.ctx.pixels_per_point(),
        }
    }

    fn redraw(&mut self, gpu: &GpuContext) {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                self.surface.configure(&gpu.device, &self.config);
                self.window.request_redraw();
                return;
            }
            Err(e) => {
                log::warn!("Panel surface error: {e}");
                return;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let raw_input = self.state.take_egui_input(&self.window);
        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = self.ctx.run(raw_input, |ctx| settings::show(ctx, &self.settings));
        self.state.handle_platform_output(&self.window, platform_output);

        let primitives = self.ctx.tessellate(shapes, pixels_per_point);
        let screen = self.screen_descriptor();

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("panel-encoder"),
            });

        for (id, delta) in &textures_delta.set {
            self.renderer
                .update_texture(&gpu.device, &gpu.queue, *id, delta);
        }
        let callback_buffers = self.renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &primitives,
            &screen,
        );

        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("panel-pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.renderer.render(&mut pass, &primitives, &screen);
        }

        for id in &textures_delta.free {
            self.renderer.free_texture(id);
        }

        gpu.queue
            .submit(callback_buffers.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();

        if self.ctx.has_requested_repaint() {
            self.window.request_redraw();
        }
    }
}
