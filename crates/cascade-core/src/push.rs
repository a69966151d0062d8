//! Push-constant blocks, one per compute stage.
//! Layouts must match the `var<push_constant>` structs in the WGSL programs.

/// Physics sub-pass origin. `location` is 16-byte aligned as in the shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PhysicsConstants {
    /// Subchunk origin within a chunk after jitter, in cells.
    pub offset: [i32; 3],
    pub _pad0: i32,
    /// Octant corner, each component 0 or 1.
    pub location: [i32; 3],
    pub _pad1: i32,
}

impl PhysicsConstants {
    pub fn new(offset: glam::IVec3, location: glam::IVec3) -> Self {
        Self {
            offset: offset.to_array(),
            _pad0: 0,
            location: location.to_array(),
            _pad1: 0,
        }
    }
}

/// Raytrace parameters, copied from the settings snapshot once per frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RaytraceConstants {
    pub frame_num: i32,
    pub max_ray_steps: i32,
    pub max_bounces: i32,
    pub rays_per_pixel: i32,
    pub use_blue_noise: i32,
    pub use_temporal_accumulation: i32,
    pub invalidate_accumulation: i32,
}

/// Denoise parameters. `denoise_iteration` changes per postprocess dispatch.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostprocessConstants {
    pub use_smart_denoise: i32,
    pub use_atrous_denoise: i32,
    pub denoise_iteration: i32,
    pub c_phi: f32,
    pub n_phi: f32,
    pub p_phi: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constant_sizes() {
        assert_eq!(std::mem::size_of::<PhysicsConstants>(), 32);
        assert_eq!(std::mem::offset_of!(PhysicsConstants, location), 16);
        assert_eq!(std::mem::size_of::<RaytraceConstants>(), 28);
        assert_eq!(std::mem::size_of::<PostprocessConstants>(), 24);
    }

    #[test]
    fn test_physics_constants_from_vectors() {
        let pc = PhysicsConstants::new(glam::IVec3::new(8, -3, 8), glam::IVec3::new(1, 0, 1));
        assert_eq!(pc.offset, [8, -3, 8]);
        assert_eq!(pc.location, [1, 0, 1]);
    }
}
