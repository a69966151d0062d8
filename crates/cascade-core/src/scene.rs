use glam::{IVec3, Vec3};

use crate::constants::CAMERA_START_Z;
use crate::grid::GridDims;
use crate::types::Extent;

/// Per-frame scene parameters shared by every compute stage.
///
/// The `previous_*` fields hold last frame's camera pose for temporal reprojection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneInfo {
    pub screen: Extent,
    pub world: IVec3,
    pub camera_position: Vec3,
    pub camera_direction: Vec3,
    pub previous_camera_position: Vec3,
    pub previous_camera_direction: Vec3,
    pub chunk_size: u32,
    pub local_size: u32,
}

impl SceneInfo {
    /// Camera starts centered in x/y just outside the -z face, looking along +z.
    pub fn new(screen: Extent, world: GridDims, chunk_size: u32, local_size: u32) -> Self {
        let world = world.as_ivec3();
        let position = Vec3::new(world.x as f32 / 2.0, world.y as f32 / 2.0, CAMERA_START_Z);
        let direction = Vec3::Z;
        Self {
            screen,
            world,
            camera_position: position,
            camera_direction: direction,
            previous_camera_position: position,
            previous_camera_direction: direction,
            chunk_size,
            local_size,
        }
    }

    /// Snapshot the current pose into the previous-pose fields.
    pub fn carry_camera_forward(&mut self) {
        self.previous_camera_position = self.camera_position;
        self.previous_camera_direction = self.camera_direction;
    }

    pub fn to_gpu(&self) -> GpuSceneInfo {
        GpuSceneInfo {
            screen: [self.screen.width as i32, self.screen.height as i32],
            _pad0: [0; 2],
            world: self.world.to_array(),
            _pad1: 0,
            camera_position: self.camera_position.to_array(),
            _pad2: 0.0,
            camera_direction: self.camera_direction.to_array(),
            _pad3: 0.0,
            previous_camera_position: self.previous_camera_position.to_array(),
            _pad4: 0.0,
            previous_camera_direction: self.previous_camera_direction.to_array(),
            chunk_size: self.chunk_size as i32,
            local_size: self.local_size as i32,
            _pad5: [0; 3],
        }
    }
}

/// Uniform-buffer mirror of [`SceneInfo`]. Must match `SceneInfo` in the WGSL programs.
///
/// 112 bytes: vec3 members start on 16-byte boundaries, `chunk_size` packs
/// into the tail of the last vec3.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuSceneInfo {
    pub screen: [i32; 2],
    pub _pad0: [i32; 2],
    pub world: [i32; 3],
    pub _pad1: i32,
    pub camera_position: [f32; 3],
    pub _pad2: f32,
    pub camera_direction: [f32; 3],
    pub _pad3: f32,
    pub previous_camera_position: [f32; 3],
    pub _pad4: f32,
    pub previous_camera_direction: [f32; 3],
    pub chunk_size: i32,
    pub local_size: i32,
    pub _pad5: [i32; 3],
}
