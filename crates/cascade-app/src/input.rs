use glam::Vec3;
use winit::keyboard::KeyCode;

use cascade_core::constants::{CAMERA_LOOK_SPEED, CAMERA_MOVE_SPEED};
use cascade_core::scene::SceneInfo;

/// Keeps the camera off the poles so `Y` stays a usable up vector.
const MAX_PITCH: f32 = 1.5;

/// Held-key state for the fly camera.
#[derive(Debug, Default)]
pub struct CameraController {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    look_left: bool,
    look_right: bool,
    look_up: bool,
    look_down: bool,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key drives the camera.
    pub fn handle_key(&mut self, code: KeyCode, pressed: bool) -> bool {
        let slot = match code {
            KeyCode::KeyW => &mut self.forward,
            KeyCode::KeyS => &mut self.backward,
            KeyCode::KeyA => &mut self.left,
            KeyCode::KeyD => &mut self.right,
            KeyCode::KeyE => &mut self.up,
            KeyCode::KeyQ => &mut self.down,
            KeyCode::ArrowLeft => &mut self.look_left,
            KeyCode::ArrowRight => &mut self.look_right,
            KeyCode::ArrowUp => &mut self.look_up,
            KeyCode::ArrowDown => &mut self.look_down,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Advance the camera by `dt` seconds. The previous pose belongs to the renderer.
    pub fn update(&self, scene: &mut SceneInfo, dt: f32) {
        let axis = |pos: bool, neg: bool| (pos as i32 - neg as i32) as f32;

        let yaw_delta = axis(self.look_right, self.look_left) * CAMERA_LOOK_SPEED * dt;
        let pitch_delta = axis(self.look_up, self.look_down) * CAMERA_LOOK_SPEED * dt;
        if yaw_delta != 0.0 || pitch_delta != 0.0 {
            let d = scene.camera_direction.try_normalize().unwrap_or(Vec3::Z);
            let yaw = d.x.atan2(d.z) + yaw_delta;
            let pitch = (d.y.clamp(-1.0, 1.0).asin() + pitch_delta).clamp(-MAX_PITCH, MAX_PITCH);
            scene.camera_direction = Vec3::new(
                pitch.cos() * yaw.sin(),
                pitch.sin(),
                pitch.cos() * yaw.cos(),
            );
        }

        let forward = scene.camera_direction.try_normalize().unwrap_or(Vec3::Z);
        let right = Vec3::Y.cross(forward).try_normalize().unwrap_or(Vec3::X);
        let movement = forward * axis(self.forward, self.backward)
            + right * axis(self.right, self.left)
            + Vec3::Y * axis(self.up, self.down);
        scene.camera_position += movement * CAMERA_MOVE_SPEED * dt;
    }
}
