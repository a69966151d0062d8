use std::path::Path;

use cascade_core::constants::SCREEN_TILE;
use cascade_core::error::DeviceError;
use cascade_core::push::{PhysicsConstants, PostprocessConstants, RaytraceConstants};
use cascade_core::types::Extent;

use crate::device::GpuContext;
use crate::history::HistoryIndices;

/// Token in program sources replaced by the presentation storage format.
pub const PRESENT_FORMAT_TOKEN: &str = "PRESENT_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Physics,
    Raytrace,
    Postprocess,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Physics, StageKind::Raytrace, StageKind::Postprocess];

    /// File stem of the program under the shader directory.
    pub fn program_name(self) -> &'static str {
        match self {
            StageKind::Physics => "physics",
            StageKind::Raytrace => "raytrace",
            StageKind::Postprocess => "postprocess",
        }
    }

    pub fn push_constant_size(self) -> u32 {
        let size = match self {
            StageKind::Physics => std::mem::size_of::<PhysicsConstants>(),
            StageKind::Raytrace => std::mem::size_of::<RaytraceConstants>(),
            StageKind::Postprocess => std::mem::size_of::<PostprocessConstants>(),
        };
        size as u32
    }

    /// Binding sets in group-index order for this stage.
    pub fn bindings(self, history: HistoryIndices) -> Vec<Binding> {
        match self {
            StageKind::Physics => PhysicsStage::bindings(history),
            StageKind::Raytrace => RaytraceStage::bindings(history),
            StageKind::Postprocess => PostprocessStage::bindings(history),
        }
    }
}

/// A binding set a stage can request. Resolved to a live set by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    PresentTarget,
    History(usize),
    Normal,
    Position,
    VoxelState,
    SceneInfo,
    SubchunkState,
}

/// Which layout a binding set is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutClass {
    Present,
    Image,
    Storage,
    Uniform,
}

impl Binding {
    pub fn layout_class(self) -> LayoutClass {
        match self {
            Binding::PresentTarget => LayoutClass::Present,
            Binding::History(_) | Binding::Normal | Binding::Position => LayoutClass::Image,
            Binding::VoxelState | Binding::SubchunkState => LayoutClass::Storage,
            Binding::SceneInfo => LayoutClass::Uniform,
        }
    }
}

/// Shape shared by every compute stage: a binding list and a push-constant block.
pub trait ComputeStage {
    const KIND: StageKind;
    type Constants: bytemuck::Pod;

    fn bindings(history: HistoryIndices) -> Vec<Binding>;
}

pub struct PhysicsStage;
pub struct RaytraceStage;
pub struct PostprocessStage;

impl ComputeStage for PhysicsStage {
    const KIND: StageKind = StageKind::Physics;
    type Constants = PhysicsConstants;

    fn bindings(_history: HistoryIndices) -> Vec<Binding> {
        vec![Binding::VoxelState, Binding::SceneInfo, Binding::SubchunkState]
    }
}

impl ComputeStage for RaytraceStage {
    const KIND: StageKind = StageKind::Raytrace;
    type Constants = RaytraceConstants;

    fn bindings(history: HistoryIndices) -> Vec<Binding> {
        vec![
            Binding::History(history.curr),
            Binding::History(history.prev),
            Binding::Normal,
            Binding::Position,
            Binding::VoxelState,
            Binding::SceneInfo,
            Binding::SubchunkState,
        ]
    }
}

impl ComputeStage for PostprocessStage {
    const KIND: StageKind = StageKind::Postprocess;
    type Constants = PostprocessConstants;

    fn bindings(history: HistoryIndices) -> Vec<Binding> {
        vec![
            Binding::PresentTarget,
            Binding::History(history.curr),
            Binding::History(history.prev),
            Binding::Normal,
            Binding::Position,
        ]
    }
}

/// Physics workgroups per axis: one invocation per chunk.
pub fn world_dispatch(world_size: u32, chunk_size: u32, local_size: u32) -> [u32; 3] {
    let n = world_size / (chunk_size * local_size) + 1;
    [n, n, n]
}

/// Screen-space workgroups covering the presentation resolution.
pub fn screen_dispatch(extent: Extent) -> [u32; 3] {
    [extent.width / SCREEN_TILE + 1, extent.height / SCREEN_TILE + 1, 1]
}

/// WGSL storage texel format name, for formats compute programs can write.
pub fn storage_format_name(format: wgpu::TextureFormat) -> Option<&'static str> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some("rgba8unorm"),
        wgpu::TextureFormat::Bgra8Unorm => Some("bgra8unorm"),
        wgpu::TextureFormat::Rgba16Float => Some("rgba16float"),
        wgpu::TextureFormat::Rgba32Float => Some("rgba32float"),
        _ => None,
    }
}

/// Prepend the constants preamble and substitute the presentation format.
pub fn compose_source(raw: &str, chunk_size: u32, local_size: u32, present_format: &str) -> String {
    let preamble = format!(
        "const CHUNK_SIZE: i32 = {chunk_size};\nconst LOCAL_SIZE: u32 = {local_size}u;\n"
    );
    let body = raw.replace(PRESENT_FORMAT_TOKEN, present_format);
    format!("{preamble}\n{body}")
}

/// Read `<dir>/<stage>.wgsl` and compose it for this device.
pub fn load_program_source(
    dir: &Path,
    kind: StageKind,
    chunk_size: u32,
    local_size: u32,
    present_format: wgpu::TextureFormat,
) -> Result<String, DeviceError> {
    let path = dir.join(format!("{}.wgsl", kind.program_name()));
    let raw = std::fs::read_to_string(&path).map_err(|e| DeviceError::ShaderLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let format_name = storage_format_name(present_format).ok_or_else(|| DeviceError::ShaderLoad {
        path: path.display().to_string(),
        reason: format!("no storage format name for {present_format:?}"),
    })?;
    Ok(compose_source(&raw, chunk_size, local_size, format_name))
}

/// A compiled compute program with its layout and push-constant range.
pub struct ComputeProgram {
    pipeline: wgpu::ComputePipeline,
}

impl ComputeProgram {
    pub fn new(
        ctx: &GpuContext,
        kind: StageKind,
        source: &str,
        set_layouts: &[&wgpu::BindGroupLayout],
    ) -> Result<Self, DeviceError> {
        let name = kind.program_name();
        let pipeline = ctx.scoped(&format!("{name} program"), |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{name}-shader")),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{name}-pipeline-layout")),
                bind_group_layouts: set_layouts,
                push_constant_ranges: &[wgpu::PushConstantRange {
                    stages: wgpu::ShaderStages::COMPUTE,
                    range: 0..kind.push_constant_size(),
                }],
            });

            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&format!("{name}-pipeline")),
                layout: Some(&layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;
        log::debug!("Compiled {name} program ({} sets)", set_layouts.len());
        Ok(Self { pipeline })
    }

    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }
}
