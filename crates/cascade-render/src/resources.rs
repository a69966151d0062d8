//! GPU resources grouped by lifetime.
//!
//! [`WorldBuffers`] live for the whole run. [`SurfaceResources`] is the
//! registry of everything rebuilt as one unit when the surface changes:
//! auxiliary images plus every binding layout, pool and set.

use cascade_core::constants::{HISTORY_COUNT, SUBCHUNK_ACTIVE};
use cascade_core::error::DeviceError;
use cascade_core::grid::{GridDims, VoxelGrid};
use cascade_core::scene::GpuSceneInfo;
use cascade_core::types::Extent;

use crate::bindings::{BindingLayoutBuilder, BindingPool, BindingWriter, ResourceKind, SetHandle};
use crate::device::{GpuContext, AUX_IMAGE_FORMAT};
use crate::memory::{GpuBuffer, GpuImage, MemoryClass};
use crate::pipeline::{Binding, LayoutClass};

/// Number of subchunk flags for a world, one per half-chunk cube.
///
/// Partial cubes at the far faces get their own flag, matching the shader's indexing.
pub fn subchunk_count(dims: GridDims, chunk_size: u32) -> usize {
    let sub = (chunk_size / 2).max(1) as usize;
    let per_axis = |n: u16| (n as usize).div_ceil(sub);
    per_axis(dims.x) * per_axis(dims.y) * per_axis(dims.z)
}

/// Buffers created once at startup.
pub struct WorldBuffers {
    pub voxels: GpuBuffer,
    pub scene_info: GpuBuffer,
    pub subchunks: GpuBuffer,
}

impl WorldBuffers {
    /// Upload the voxel grid and initialize every subchunk as active.
    pub fn new(ctx: &GpuContext, grid: &VoxelGrid, chunk_size: u32) -> Result<Self, DeviceError> {
        let voxels = ctx.create_buffer_init(
            "voxel-state",
            grid.bytes(),
            wgpu::BufferUsages::STORAGE,
            MemoryClass::DeviceLocal,
        )?;

        let scene_info = ctx.create_buffer(
            "scene-info",
            std::mem::size_of::<GpuSceneInfo>() as u64,
            wgpu::BufferUsages::UNIFORM,
            MemoryClass::HostSequentialWrite,
        )?;

        let flags = vec![SUBCHUNK_ACTIVE; subchunk_count(grid.dims(), chunk_size)];
        let subchunks = ctx.create_buffer_init(
            "subchunk-state",
            &flags,
            wgpu::BufferUsages::STORAGE,
            MemoryClass::HostRandomAccess,
        )?;

        log::info!(
            "World buffers: voxels {} bytes, {} subchunks",
            voxels.size(),
            flags.len()
        );
        Ok(Self {
            voxels,
            scene_info,
            subchunks,
        })
    }
}

/// Everything that depends on the surface, rebuilt together.
pub struct SurfaceResources {
    // Field order is drop order: pools (and their sets) go before the images they reference.
    present_pool: BindingPool,
    image_pool: BindingPool,
    storage_pool: BindingPool,
    uniform_pool: BindingPool,
    history_sets: [SetHandle; HISTORY_COUNT],
    normal_set: SetHandle,
    position_set: SetHandle,
    voxel_set: SetHandle,
    subchunk_set: SetHandle,
    scene_set: SetHandle,
    history: [GpuImage; HISTORY_COUNT],
    normal: GpuImage,
    position: GpuImage,
}

impl SurfaceResources {
    pub fn build(
        ctx: &GpuContext,
        extent: Extent,
        present_format: wgpu::TextureFormat,
        world: &WorldBuffers,
    ) -> Result<Self, DeviceError> {
        let compute = wgpu::ShaderStages::COMPUTE;

        // Layouts
        let present_layout = BindingLayoutBuilder::new("present-layout")
            .add_binding(
                0,
                ResourceKind::StorageImage {
                    format: present_format,
                    access: wgpu::StorageTextureAccess::WriteOnly,
                },
                compute,
            )
            .build(ctx)?;
        let image_layout = BindingLayoutBuilder::new("image-layout")
            .add_binding(
                0,
                ResourceKind::StorageImage {
                    format: AUX_IMAGE_FORMAT,
                    access: wgpu::StorageTextureAccess::ReadWrite,
                },
                compute,
            )
            .build(ctx)?;
        let storage_layout = BindingLayoutBuilder::new("storage-layout")
            .add_binding(0, ResourceKind::StorageBuffer, compute)
            .build(ctx)?;
        let uniform_layout = BindingLayoutBuilder::new("uniform-layout")
            .add_binding(0, ResourceKind::UniformBuffer, compute)
            .build(ctx)?;

        // Pools, sized to exactly the sets drawn from them. The present set is drawn per frame.
        let present_pool = BindingPool::new("present-sets", present_layout, 1);
        let mut image_pool = BindingPool::new("image-sets", image_layout, HISTORY_COUNT as u32 + 2);
        let mut storage_pool = BindingPool::new("storage-sets", storage_layout, 2);
        let mut uniform_pool = BindingPool::new("uniform-sets", uniform_layout, 1);

        // Images
        let history = [
            ctx.create_image("history-0", extent, AUX_IMAGE_FORMAT)?,
            ctx.create_image("history-1", extent, AUX_IMAGE_FORMAT)?,
        ];
        let normal = ctx.create_image("normal", extent, AUX_IMAGE_FORMAT)?;
        let position = ctx.create_image("position", extent, AUX_IMAGE_FORMAT)?;

        // Sets
        let history_sets = [
            BindingWriter::new().image(0, history[0].view()).allocate(ctx, &mut image_pool)?,
            BindingWriter::new().image(0, history[1].view()).allocate(ctx, &mut image_pool)?,
        ];
        let normal_set = BindingWriter::new()
            .image(0, normal.view())
            .allocate(ctx, &mut image_pool)?;
        let position_set = BindingWriter::new()
            .image(0, position.view())
            .allocate(ctx, &mut image_pool)?;
        let voxel_set = BindingWriter::new()
            .buffer(0, world.voxels.raw())
            .allocate(ctx, &mut storage_pool)?;
        let subchunk_set = BindingWriter::new()
            .buffer(0, world.subchunks.raw())
            .allocate(ctx, &mut storage_pool)?;
        let scene_set = BindingWriter::new()
            .buffer(0, world.scene_info.raw())
            .allocate(ctx, &mut uniform_pool)?;

        log::debug!(
            "Surface resources built at {}x{}",
            extent.width,
            extent.height
        );

        Ok(Self {
            present_pool,
            image_pool,
            storage_pool,
            uniform_pool,
            history_sets,
            normal_set,
            position_set,
            voxel_set,
            subchunk_set,
            scene_set,
            history,
            normal,
            position,
        })
    }

    pub fn layout(&self, class: LayoutClass) -> &wgpu::BindGroupLayout {
        let pool = match class {
            LayoutClass::Present => &self.present_pool,
            LayoutClass::Image => &self.image_pool,
            LayoutClass::Storage => &self.storage_pool,
            LayoutClass::Uniform => &self.uniform_pool,
        };
        pool.layout().raw()
    }

    /// Bind this frame's presentable image. Invalidates the previous frame's set.
    pub fn bind_present_target(
        &mut self,
        ctx: &GpuContext,
        view: &wgpu::TextureView,
    ) -> Result<SetHandle, DeviceError> {
        self.present_pool.reset();
        BindingWriter::new()
            .image(0, view)
            .allocate(ctx, &mut self.present_pool)
    }

    /// Resolve a stage binding to its live set.
    pub fn resolve(
        &self,
        binding: Binding,
        present: Option<SetHandle>,
    ) -> Result<&wgpu::BindGroup, DeviceError> {
        match binding {
            Binding::PresentTarget => {
                let handle = present.ok_or_else(|| DeviceError::StaleSet {
                    label: "present-sets".to_string(),
                })?;
                self.present_pool.get(handle)
            }
            Binding::History(i) => {
                let handle = self.history_sets.get(i).ok_or_else(|| DeviceError::BindingLayout {
                    label: "image-sets".to_string(),
                    reason: format!("no history image {i}"),
                })?;
                self.image_pool.get(*handle)
            }
            Binding::Normal => self.image_pool.get(self.normal_set),
            Binding::Position => self.image_pool.get(self.position_set),
            Binding::VoxelState => self.storage_pool.get(self.voxel_set),
            Binding::SubchunkState => self.storage_pool.get(self.subchunk_set),
            Binding::SceneInfo => self.uniform_pool.get(self.scene_set),
        }
    }

    /// Extents of the auxiliary images, for diagnostics.
    pub fn image_extents(&self) -> [Extent; HISTORY_COUNT + 2] {
        [
            self.history[0].extent(),
            self.history[1].extent(),
            self.normal.extent(),
            self.position.extent(),
        ]
    }
}
