//! Render settings shared between the render flow and the control flow.
//!
//! Every scalar is a lock-free atomic. The render flow copies a
//! [`SettingsSnapshot`] once per frame, so a write from the control flow is
//! stale for at most one frame. Setters raise the invalidate request so
//! temporal accumulation restarts after any change.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use crate::config::RenderDefaults;
use crate::push::{PostprocessConstants, RaytraceConstants};

/// Atomic f32 stored as raw bits.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct RenderSettings {
    max_ray_steps: AtomicI32,
    max_bounces: AtomicI32,
    rays_per_pixel: AtomicI32,
    use_blue_noise: AtomicBool,
    use_temporal_accumulation: AtomicBool,
    denoise_iterations: AtomicU32,
    use_smart_denoise: AtomicBool,
    use_atrous_denoise: AtomicBool,
    c_phi: AtomicF32,
    n_phi: AtomicF32,
    p_phi: AtomicF32,
    invalidate_requested: AtomicBool,
    shutdown_requested: AtomicBool,
}

/// Plain copy of every setting, taken once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsSnapshot {
    pub max_ray_steps: i32,
    pub max_bounces: i32,
    pub rays_per_pixel: i32,
    pub use_blue_noise: bool,
    pub use_temporal_accumulation: bool,
    pub denoise_iterations: u32,
    pub use_smart_denoise: bool,
    pub use_atrous_denoise: bool,
    pub c_phi: f32,
    pub n_phi: f32,
    pub p_phi: f32,
}

impl SettingsSnapshot {
    pub fn raytrace_constants(&self, frame_num: u32, invalidate: bool) -> RaytraceConstants {
        RaytraceConstants {
            frame_num: frame_num as i32,
            max_ray_steps: self.max_ray_steps,
            max_bounces: self.max_bounces,
            rays_per_pixel: self.rays_per_pixel,
            use_blue_noise: self.use_blue_noise as i32,
            use_temporal_accumulation: self.use_temporal_accumulation as i32,
            invalidate_accumulation: invalidate as i32,
        }
    }

    pub fn postprocess_constants(&self, iteration: u32) -> PostprocessConstants {
        PostprocessConstants {
            use_smart_denoise: self.use_smart_denoise as i32,
            use_atrous_denoise: self.use_atrous_denoise as i32,
            denoise_iteration: iteration as i32,
            c_phi: self.c_phi,
            n_phi: self.n_phi,
            p_phi: self.p_phi,
        }
    }
}

macro_rules! scalar_setting {
    ($get:ident, $set:ident, $field:ident, $ty:ty) => {
        pub fn $get(&self) -> $ty {
            self.$field.load(Ordering::Relaxed)
        }

        pub fn $set(&self, value: $ty) {
            self.$field.store(value, Ordering::Relaxed);
            self.request_invalidate();
        }
    };
}

macro_rules! phi_setting {
    ($get:ident, $set:ident, $field:ident) => {
        pub fn $get(&self) -> f32 {
            self.$field.load()
        }

        pub fn $set(&self, value: f32) {
            self.$field.store(value);
            self.request_invalidate();
        }
    };
}

impl RenderSettings {
    pub fn new(defaults: &RenderDefaults) -> Self {
        Self {
            max_ray_steps: AtomicI32::new(defaults.max_ray_steps),
            max_bounces: AtomicI32::new(defaults.max_bounces),
            rays_per_pixel: AtomicI32::new(defaults.rays_per_pixel),
            use_blue_noise: AtomicBool::new(defaults.use_blue_noise),
            use_temporal_accumulation: AtomicBool::new(defaults.use_temporal_accumulation),
            denoise_iterations: AtomicU32::new(defaults.denoise_iterations),
            use_smart_denoise: AtomicBool::new(defaults.use_smart_denoise),
            use_atrous_denoise: AtomicBool::new(defaults.use_atrous_denoise),
            c_phi: AtomicF32::new(defaults.c_phi),
            n_phi: AtomicF32::new(defaults.n_phi),
            p_phi: AtomicF32::new(defaults.p_phi),
            invalidate_requested: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    scalar_setting!(max_ray_steps, set_max_ray_steps, max_ray_steps, i32);
    scalar_setting!(max_bounces, set_max_bounces, max_bounces, i32);
    scalar_setting!(rays_per_pixel, set_rays_per_pixel, rays_per_pixel, i32);
    scalar_setting!(use_blue_noise, set_use_blue_noise, use_blue_noise, bool);
    scalar_setting!(
        use_temporal_accumulation,
        set_use_temporal_accumulation,
        use_temporal_accumulation,
        bool
    );
    scalar_setting!(denoise_iterations, set_denoise_iterations, denoise_iterations, u32);
    scalar_setting!(use_smart_denoise, set_use_smart_denoise, use_smart_denoise, bool);
    scalar_setting!(use_atrous_denoise, set_use_atrous_denoise, use_atrous_denoise, bool);
    phi_setting!(c_phi, set_c_phi, c_phi);
    phi_setting!(n_phi, set_n_phi, n_phi);
    phi_setting!(p_phi, set_p_phi, p_phi);

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            max_ray_steps: self.max_ray_steps(),
            max_bounces: self.max_bounces(),
            rays_per_pixel: self.rays_per_pixel(),
            use_blue_noise: self.use_blue_noise(),
            use_temporal_accumulation: self.use_temporal_accumulation(),
            denoise_iterations: self.denoise_iterations(),
            use_smart_denoise: self.use_smart_denoise(),
            use_atrous_denoise: self.use_atrous_denoise(),
            c_phi: self.c_phi(),
            n_phi: self.n_phi(),
            p_phi: self.p_phi(),
        }
    }

    pub fn request_invalidate(&self) {
        self.invalidate_requested.store(true, Ordering::Release);
    }

    /// Consume a pending invalidate request.
    pub fn take_invalidate_request(&self) -> bool {
        self.invalidate_requested.swap(false, Ordering::AcqRel)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }
}

/// Map an integer slider position (0..=30) onto a filter coefficient.
///
/// Three decades share one slider: 0-10 step 0.001, 11-20 step 0.01, 21-30 step 0.1.
pub fn phi_from_slider(position: u32) -> f32 {
    match position {
        0..=10 => 0.001 * position as f32,
        11..=20 => 0.01 * (position - 10) as f32,
        _ => 0.1 * (position.min(30) - 20) as f32,
    }
}

/// Nearest slider position for a coefficient. Decade boundaries resolve to the lower decade.
pub fn slider_from_phi(phi: f32) -> u32 {
    if phi < 0.0105 {
        (phi / 0.001).round().max(0.0) as u32
    } else if phi < 0.105 {
        (phi / 0.01).round() as u32 + 10
    } else {
        ((phi / 0.1).round() as u32 + 20).min(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RenderSettings {
        RenderSettings::new(&RenderDefaults::default())
    }

    #[test]
    fn test_defaults() {
        let snap = settings().snapshot();
        assert_eq!(snap.max_ray_steps, 128);
        assert_eq!(snap.max_bounces, 3);
        assert_eq!(snap.rays_per_pixel, 4);
        assert!(snap.use_blue_noise);
        assert!(!snap.use_temporal_accumulation);
        assert_eq!(snap.denoise_iterations, 3);
        assert_eq!(snap.c_phi, 0.01);
    }

    #[test]
    fn test_every_setter_requests_invalidate() {
        let s = settings();
        assert!(!s.take_invalidate_request());

        s.set_max_ray_steps(64);
        assert!(s.take_invalidate_request());
        assert!(!s.take_invalidate_request(), "request must be consumed");

        s.set_use_atrous_denoise(true);
        assert!(s.take_invalidate_request());

        s.set_p_phi(0.5);
        assert!(s.take_invalidate_request());
        assert_eq!(s.p_phi(), 0.5);
    }

    #[test]
    fn test_snapshot_to_constants() {
        let s = settings();
        s.set_use_temporal_accumulation(true);
        let snap = s.snapshot();
        let rt = snap.raytrace_constants(7, true);
        assert_eq!(rt.frame_num, 7);
        assert_eq!(rt.use_temporal_accumulation, 1);
        assert_eq!(rt.invalidate_accumulation, 1);
        let pp = snap.postprocess_constants(2);
        assert_eq!(pp.denoise_iteration, 2);
        assert_eq!(pp.n_phi, 0.005);
    }

    #[test]
    fn test_slider_mapping() {
        assert_eq!(phi_from_slider(0), 0.0);
        assert!((phi_from_slider(10) - 0.01).abs() < 1e-6);
        assert!((phi_from_slider(15) - 0.05).abs() < 1e-6);
        assert!((phi_from_slider(23) - 0.3).abs() < 1e-6);
        assert!((phi_from_slider(99) - 1.0).abs() < 1e-6);
        assert_eq!(slider_from_phi(0.3), 23);
        for position in 0..=30 {
            let phi = phi_from_slider(position);
            let back = phi_from_slider(slider_from_phi(phi));
            assert!((back - phi).abs() < 1e-6, "slider {position} did not map back");
        }
    }

    #[test]
    fn test_shutdown_flag() {
        let s = settings();
        assert!(!s.shutdown_requested());
        s.request_shutdown();
        assert!(s.shutdown_requested());
    }
}
