//! Adapter selection and the device context.
//!
//! Every adapter that can present to the window is profiled, ranked by
//! device type, and the first one meeting [`DeviceRequirements`] wins.

use std::sync::Arc;

use cascade_core::error::{CascadeError, DeviceError, SurfaceError};
use cascade_core::types::Extent;
use wgpu::{
    Adapter, Device, DeviceDescriptor, DownlevelCapabilities, DownlevelFlags, Features, Instance,
    InstanceDescriptor, Limits, Queue, ShaderModel, TextureFormat, TextureFormatFeatureFlags,
};

use crate::memory::MemoryLedger;
use crate::surface::SurfaceManager;

/// Format of the history, normal and position images.
pub const AUX_IMAGE_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// What an adapter must offer before a device is requested from it.
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    pub features: Features,
    pub downlevel_flags: DownlevelFlags,
    pub min_shader_model: ShaderModel,
    pub min_bind_groups: u32,
    pub min_push_constant_size: u32,
    pub min_storage_textures_per_stage: u32,
    pub min_storage_buffers_per_stage: u32,
    /// Images that are read and written in place by one program.
    pub read_write_format: TextureFormat,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            features: Features::PUSH_CONSTANTS
                | Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES,
            downlevel_flags: DownlevelFlags::COMPUTE_SHADERS,
            min_shader_model: ShaderModel::Sm5,
            // raytrace binds seven sets
            min_bind_groups: 7,
            min_push_constant_size: 32,
            // postprocess: present target plus four auxiliary images
            min_storage_textures_per_stage: 5,
            min_storage_buffers_per_stage: 2,
            read_write_format: AUX_IMAGE_FORMAT,
        }
    }
}

/// Capabilities of one candidate adapter, detached from the adapter handle.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: String,
    pub device_type: wgpu::DeviceType,
    pub features: Features,
    pub limits: Limits,
    pub downlevel: DownlevelCapabilities,
    pub read_write_flags: TextureFormatFeatureFlags,
}

impl AdapterProfile {
    pub fn from_adapter(adapter: &Adapter, requirements: &DeviceRequirements) -> Self {
        let info = adapter.get_info();
        Self {
            name: info.name,
            backend: format!("{:?}", info.backend),
            device_type: info.device_type,
            features: adapter.features(),
            limits: adapter.limits(),
            downlevel: adapter.get_downlevel_capabilities(),
            read_write_flags: adapter
                .get_texture_format_features(requirements.read_write_format)
                .flags,
        }
    }

    /// Check every requirement, reporting the first one that fails.
    pub fn qualify(&self, req: &DeviceRequirements) -> Result<(), DeviceError> {
        let missing = req.features - self.features;
        if !missing.is_empty() {
            return Err(DeviceError::MissingFeature {
                adapter: self.name.clone(),
                feature: format!("{missing:?}"),
            });
        }

        if self.downlevel.shader_model < req.min_shader_model {
            return Err(DeviceError::ShaderModelTooLow {
                required: format!("{:?}", req.min_shader_model),
                available: format!("{:?}", self.downlevel.shader_model),
            });
        }

        let missing_flags = req.downlevel_flags - self.downlevel.flags;
        if !missing_flags.is_empty() {
            return Err(DeviceError::MissingFeature {
                adapter: self.name.clone(),
                feature: format!("{missing_flags:?}"),
            });
        }

        let limits = [
            ("max_bind_groups", req.min_bind_groups, self.limits.max_bind_groups),
            (
                "max_push_constant_size",
                req.min_push_constant_size,
                self.limits.max_push_constant_size,
            ),
            (
                "max_storage_textures_per_shader_stage",
                req.min_storage_textures_per_stage,
                self.limits.max_storage_textures_per_shader_stage,
            ),
            (
                "max_storage_buffers_per_shader_stage",
                req.min_storage_buffers_per_stage,
                self.limits.max_storage_buffers_per_shader_stage,
            ),
        ];
        for (limit, required, available) in limits {
            if available < required {
                return Err(DeviceError::LimitTooLow {
                    limit,
                    required: required as u64,
                    available: available as u64,
                });
            }
        }

        if !self
            .read_write_flags
            .contains(TextureFormatFeatureFlags::STORAGE_READ_WRITE)
        {
            return Err(DeviceError::MissingFeature {
                adapter: self.name.clone(),
                feature: format!("read-write storage for {:?}", req.read_write_format),
            });
        }

        Ok(())
    }
}

/// Lower ranks are tried first.
fn preference_rank(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => 0,
        wgpu::DeviceType::IntegratedGpu => 1,
        wgpu::DeviceType::VirtualGpu => 2,
        wgpu::DeviceType::Other => 3,
        wgpu::DeviceType::Cpu => 4,
    }
}

/// Index of the first qualifying candidate, discrete GPUs first.
///
/// Candidates of equal rank keep their enumeration order.
pub fn select_adapter(
    candidates: &[AdapterProfile],
    req: &DeviceRequirements,
) -> Result<usize, DeviceError> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&i| preference_rank(candidates[i].device_type));

    for i in order {
        let profile = &candidates[i];
        match profile.qualify(req) {
            Ok(()) => return Ok(i),
            Err(e) => log::debug!("Skipping adapter {} ({}): {e}", profile.name, profile.backend),
        }
    }
    Err(DeviceError::AdapterNotFound(format!(
        "none of {} presentable adapters meets the requirements",
        candidates.len()
    )))
}

/// Log when a poll returns with work still queued.
fn queue_drained(result: wgpu::MaintainResult, waited_for: &str) -> bool {
    let drained = result.is_queue_empty();
    if !drained {
        log::debug!("Queue still holds work after waiting for {waited_for}");
    }
    drained
}

/// Device, queue and allocation bookkeeping shared by every GPU resource.
///
/// One queue serves both compute and presentation.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub adapter: Adapter,
    pub instance: Instance,
    pub profile: AdapterProfile,
    ledger: Arc<MemoryLedger>,
}

impl GpuContext {
    /// Select a qualifying adapter, open the device and configure the surface.
    ///
    /// Blocks on adapter and device requests.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        extent: Extent,
    ) -> Result<(Self, SurfaceManager), CascadeError> {
        let instance = Instance::new(&InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .map_err(|e| SurfaceError::CreationFailed(e.to_string()))?;

        let mut adapters: Vec<Adapter> = instance
            .enumerate_adapters(wgpu::Backends::PRIMARY)
            .into_iter()
            .filter(|adapter| adapter.is_surface_supported(&surface))
            .collect();
        if adapters.is_empty() {
            return Err(DeviceError::AdapterNotFound("no adapter can present to this window".into()).into());
        }

        let requirements = DeviceRequirements::default();
        let profiles: Vec<AdapterProfile> = adapters
            .iter()
            .map(|adapter| AdapterProfile::from_adapter(adapter, &requirements))
            .collect();
        let chosen = select_adapter(&profiles, &requirements)?;
        let adapter = adapters.swap_remove(chosen);
        let profile = profiles[chosen].clone();
        log::info!("Adapter: {} ({}, {:?})", profile.name, profile.backend, profile.device_type);
        log::debug!("Adapter limits: {:?}", profile.limits);

        // Storage writes to a BGRA surface need this when the adapter offers it
        let optional = profile.features & Features::BGRA8UNORM_STORAGE;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("cascade-device"),
                required_features: requirements.features | optional,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| DeviceError::DeviceRequestFailed(format!("{e}")))?;

        let ctx = Self {
            device,
            queue,
            adapter,
            instance,
            profile,
            ledger: Arc::new(MemoryLedger::default()),
        };
        let surface = SurfaceManager::new(&ctx, surface, extent)?;
        Ok((ctx, surface))
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    /// Run `create` inside validation and out-of-memory error scopes.
    pub fn scoped<T>(&self, label: &str, create: impl FnOnce(&Device) -> T) -> Result<T, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(err) => Err(DeviceError::ResourceCreation {
                label: label.to_string(),
                reason: err.to_string(),
            }),
            None => Ok(value),
        }
    }

    /// Block until all submitted work has retired. Returns whether the queue drained.
    pub fn wait_idle(&self) -> bool {
        queue_drained(self.device.poll(wgpu::Maintain::Wait), "idle")
    }

    /// Block until `index` retires. Later submissions may still be queued.
    pub fn wait_for(&self, index: wgpu::SubmissionIndex) -> bool {
        queue_drained(
            self.device
                .poll(wgpu::Maintain::WaitForSubmissionIndex(index)),
            "a submission",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capable_profile() -> AdapterProfile {
        let limits = Limits {
            max_push_constant_size: 128,
            max_bind_groups: 8,
            max_storage_textures_per_shader_stage: 8,
            ..Limits::default()
        };
        AdapterProfile {
            name: "test-adapter".into(),
            backend: "Vulkan".into(),
            device_type: wgpu::DeviceType::DiscreteGpu,
            features: Features::PUSH_CONSTANTS
                | Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES,
            limits,
            downlevel: DownlevelCapabilities::default(),
            read_write_flags: TextureFormatFeatureFlags::STORAGE_READ_WRITE,
        }
    }

    #[test]
    fn test_capable_adapter_qualifies() {
        assert!(capable_profile().qualify(&DeviceRequirements::default()).is_ok());
    }

    #[test]
    fn test_missing_push_constants_rejected() {
        let mut profile = capable_profile();
        profile.features = Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        let err = profile.qualify(&DeviceRequirements::default()).unwrap_err();
        assert!(
            matches!(err, DeviceError::MissingFeature { ref feature, .. } if feature.contains("PUSH_CONSTANTS")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_low_shader_model_rejected() {
        let mut profile = capable_profile();
        profile.downlevel.shader_model = ShaderModel::Sm4;
        assert!(matches!(
            profile.qualify(&DeviceRequirements::default()),
            Err(DeviceError::ShaderModelTooLow { .. })
        ));
    }

    #[test]
    fn test_missing_compute_rejected() {
        let mut profile = capable_profile();
        profile.downlevel.flags = DownlevelFlags::empty();
        assert!(matches!(
            profile.qualify(&DeviceRequirements::default()),
            Err(DeviceError::MissingFeature { .. })
        ));
    }

    #[test]
    fn test_default_limits_too_low() {
        // Default limits allow 4 bind groups and no push constants
        let mut profile = capable_profile();
        profile.limits = Limits::default();
        match profile.qualify(&DeviceRequirements::default()) {
            Err(DeviceError::LimitTooLow {
                limit,
                required,
                available,
            }) => {
                assert_eq!(limit, "max_bind_groups");
                assert_eq!(required, 7);
                assert_eq!(available, 4);
            }
            other => panic!("expected LimitTooLow, got {other:?}"),
        }
    }

    #[test]
    fn test_read_write_storage_required() {
        let mut profile = capable_profile();
        profile.read_write_flags = TextureFormatFeatureFlags::empty();
        assert!(matches!(
            profile.qualify(&DeviceRequirements::default()),
            Err(DeviceError::MissingFeature { .. })
        ));
    }

    #[test]
    fn test_selection_falls_through_to_next_adapter() {
        let mut discrete = capable_profile();
        discrete.name = "discrete".into();
        discrete.read_write_flags = TextureFormatFeatureFlags::empty();
        let mut integrated = capable_profile();
        integrated.name = "integrated".into();
        integrated.device_type = wgpu::DeviceType::IntegratedGpu;

        let candidates = [discrete, integrated];
        assert_eq!(select_adapter(&candidates, &DeviceRequirements::default()).expect("one qualifies"), 1);
    }

    #[test]
    fn test_selection_prefers_discrete() {
        let mut cpu = capable_profile();
        cpu.device_type = wgpu::DeviceType::Cpu;
        let mut integrated = capable_profile();
        integrated.device_type = wgpu::DeviceType::IntegratedGpu;
        let discrete = capable_profile();

        let candidates = [cpu, integrated, discrete];
        assert_eq!(select_adapter(&candidates, &DeviceRequirements::default()).expect("all qualify"), 2);
    }

    #[test]
    fn test_selection_fails_when_none_qualify() {
        let mut weak = capable_profile();
        weak.limits = Limits::default();
        assert!(matches!(
            select_adapter(&[weak], &DeviceRequirements::default()),
            Err(DeviceError::AdapterNotFound(_))
        ));
        assert!(matches!(
            select_adapter(&[], &DeviceRequirements::default()),
            Err(DeviceError::AdapterNotFound(_))
        ));
    }

    #[test]
    fn test_queue_drained_reports_poll_result() {
        assert!(queue_drained(wgpu::MaintainResult::SubmissionQueueEmpty, "idle"));
        assert!(!queue_drained(wgpu::MaintainResult::Ok, "idle"));
    }

    #[cfg(feature = "gpu_tests")]
    #[test]
    fn test_local_adapter_qualifies() {
        let instance = Instance::new(&InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let requirements = DeviceRequirements::default();
        let profiles: Vec<AdapterProfile> = instance
            .enumerate_adapters(wgpu::Backends::PRIMARY)
            .iter()
            .map(|adapter| AdapterProfile::from_adapter(adapter, &requirements))
            .collect();
        select_adapter(&profiles, &requirements)
            .expect("no local adapter meets the compute requirements");
    }
}
