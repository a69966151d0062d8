use cascade_core::constants::FRAMES_IN_FLIGHT;
use cascade_core::error::SurfaceError;
use cascade_core::types::Extent;

use crate::device::GpuContext;
use crate::pipeline::storage_format_name;

/// Format of the presentable chain. Must survive recreation unchanged,
/// since every pipeline was compiled against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFormat {
    pub color: wgpu::TextureFormat,
}

impl ChainFormat {
    pub fn ensure_same(&self, next: &ChainFormat) -> Result<(), SurfaceError> {
        if self != next {
            return Err(SurfaceError::FormatChanged {
                previous: format!("{:?}", self.color),
                current: format!("{:?}", next.color),
            });
        }
        Ok(())
    }
}

/// Pick the first offered format compute programs can write directly.
pub fn choose_present_format(
    formats: &[wgpu::TextureFormat],
    storage_capable: impl Fn(wgpu::TextureFormat) -> bool,
) -> Result<wgpu::TextureFormat, SurfaceError> {
    formats
        .iter()
        .copied()
        .find(|f| storage_format_name(*f).is_some() && storage_capable(*f))
        .ok_or_else(|| SurfaceError::UnsupportedFormat(format!("{formats:?}")))
}

/// Prefer mailbox, fall back to FIFO.
pub fn choose_present_mode(modes: &[wgpu::PresentMode]) -> Result<wgpu::PresentMode, SurfaceError> {
    [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Fifo]
        .into_iter()
        .find(|m| modes.contains(m))
        .ok_or_else(|| SurfaceError::UnsupportedPresentMode(format!("{modes:?}")))
}

/// An acquired presentable image and a view of it.
pub struct AcquiredFrame {
    view: wgpu::TextureView,
    texture: wgpu::SurfaceTexture,
}

impl AcquiredFrame {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn suboptimal(&self) -> bool {
        self.texture.suboptimal
    }
}

pub enum Acquired {
    Frame(AcquiredFrame),
    /// The chain no longer matches the window and must be recreated.
    OutOfDate,
}

/// Outcome of a submit-and-present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Success,
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    pub fn needs_recreation(self) -> bool {
        !matches!(self, PresentStatus::Success)
    }
}

/// Owns the presentable chain and its acquire/submit/present cycle.
///
/// One frame in flight: every submit blocks until that submission retires.
pub struct SurfaceManager {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    format: ChainFormat,
}

impl SurfaceManager {
    pub fn new(
        ctx: &GpuContext,
        surface: wgpu::Surface<'static>,
        extent: Extent,
    ) -> Result<Self, SurfaceError> {
        let (config, format) = Self::describe(ctx, &surface, extent)?;
        surface.configure(&ctx.device, &config);
        log::info!(
            "Surface format: {:?}, present mode: {:?}, size: {}x{}",
            config.format,
            config.present_mode,
            config.width,
            config.height
        );
        Ok(Self {
            surface,
            config,
            format,
        })
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.config.width, self.config.height)
    }

    pub fn format(&self) -> ChainFormat {
        self.format
    }

    fn describe(
        ctx: &GpuContext,
        surface: &wgpu::Surface<'static>,
        extent: Extent,
    ) -> Result<(wgpu::SurfaceConfiguration, ChainFormat), SurfaceError> {
        if extent.is_zero_area() {
            return Err(SurfaceError::ZeroArea);
        }
        let caps = surface.get_capabilities(&ctx.adapter);
        if !caps.usages.contains(wgpu::TextureUsages::STORAGE_BINDING) {
            return Err(SurfaceError::UnsupportedFormat(
                "surface images cannot be bound as storage".to_string(),
            ));
        }

        let device_features = ctx.device.features();
        let color = choose_present_format(&caps.formats, |format| {
            if format == wgpu::TextureFormat::Bgra8Unorm
                && !device_features.contains(wgpu::Features::BGRA8UNORM_STORAGE)
            {
                return false;
            }
            ctx.adapter
                .get_texture_format_features(format)
                .allowed_usages
                .contains(wgpu::TextureUsages::STORAGE_BINDING)
        })?;
        let present_mode = choose_present_mode(&caps.present_modes)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::STORAGE_BINDING,
            format: color,
            width: extent.width,
            height: extent.height,
            present_mode,
            desired_maximum_frame_latency: FRAMES_IN_FLIGHT,
            alpha_mode,
            view_formats: vec![],
        };
        Ok((config, ChainFormat { color }))
    }

    /// Acquire the next presentable image, or report that the chain is stale.
    pub fn acquire_next_image(&self) -> Result<Acquired, SurfaceError> {
        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(Acquired::Frame(AcquiredFrame { view, texture }))
            }
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => Ok(Acquired::OutOfDate),
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring a presentable image");
                Ok(Acquired::OutOfDate)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(SurfaceError::OutOfMemory),
            Err(e) => Err(SurfaceError::Acquire(e.to_string())),
        }
    }

    /// Submit recorded work, present, and wait for the submission to retire.
    pub fn submit(
        &self,
        ctx: &GpuContext,
        commands: wgpu::CommandBuffer,
        frame: AcquiredFrame,
    ) -> PresentStatus {
        let suboptimal = frame.suboptimal();
        let index = ctx.queue.submit(std::iter::once(commands));
        let AcquiredFrame { view, texture } = frame;
        drop(view);
        texture.present();
        ctx.wait_for(index);

        if suboptimal {
            log::warn!("Presented to a suboptimal surface");
            PresentStatus::Suboptimal
        } else {
            PresentStatus::Success
        }
    }

    /// Rebuild the chain at `extent`. The color format must not change.
    pub fn recreate(&mut self, ctx: &GpuContext, extent: Extent) -> Result<(), SurfaceError> {
        let (config, format) = Self::describe(ctx, &self.surface, extent)?;
        self.format.ensure_same(&format)?;
        self.surface.configure(&ctx.device, &config);
        self.config = config;
        log::debug!("Surface recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    #[test]
    fn test_same_format_accepted() {
        let a = ChainFormat {
            color: TextureFormat::Rgba8Unorm,
        };
        assert!(a.ensure_same(&a).is_ok());
    }

    #[test]
    fn test_format_change_is_fatal() {
        let before = ChainFormat {
            color: TextureFormat::Rgba8Unorm,
        };
        let after = ChainFormat {
            color: TextureFormat::Bgra8Unorm,
        };
        match before.ensure_same(&after) {
            Err(SurfaceError::FormatChanged { previous, current }) => {
                assert_eq!(previous, "Rgba8Unorm");
                assert_eq!(current, "Bgra8Unorm");
            }
            other => panic!("expected FormatChanged, got {other:?}"),
        }
    }

    #[test]
    fn test_srgb_formats_skipped() {
        let offered = [TextureFormat::Bgra8UnormSrgb, TextureFormat::Rgba8Unorm];
        assert_eq!(
            choose_present_format(&offered, |_| true).expect("format"),
            TextureFormat::Rgba8Unorm
        );
    }

    #[test]
    fn test_storage_capability_respected() {
        let offered = [TextureFormat::Bgra8Unorm, TextureFormat::Rgba8Unorm];
        let chosen = choose_present_format(&offered, |f| f != TextureFormat::Bgra8Unorm).expect("format");
        assert_eq!(chosen, TextureFormat::Rgba8Unorm);
        assert!(matches!(
            choose_present_format(&offered, |_| false),
            Err(SurfaceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_present_mode_preference() {
        use wgpu::PresentMode;
        assert_eq!(
            choose_present_mode(&[PresentMode::Fifo, PresentMode::Mailbox]).expect("mode"),
            PresentMode::Mailbox
        );
        assert_eq!(
            choose_present_mode(&[PresentMode::Immediate, PresentMode::Fifo]).expect("mode"),
            PresentMode::Fifo
        );
        assert!(choose_present_mode(&[PresentMode::Immediate]).is_err());
    }

    #[test]
    fn test_status_triggers_recreation() {
        assert!(!PresentStatus::Success.needs_recreation());
        assert!(PresentStatus::Suboptimal.needs_recreation());
        assert!(PresentStatus::OutOfDate.needs_recreation());
    }
}
