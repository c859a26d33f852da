//! Perspective camera and a fly-through controller.

use glam::{Mat4, Vec2, Vec3};

/// Pitch is kept just short of straight up/down so `look_at` stays defined.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A perspective camera oriented by yaw and pitch.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Radians around +Y; zero looks down -Z.
    pub yaw: f32,
    /// Radians above the horizon.
    pub pitch: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 5.0),
            yaw: 0.0,
            pitch: 0.0,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.to_radians(),
            near,
            far,
            ..Default::default()
        }
    }

    /// Updates the aspect ratio; ignored for an empty drawable.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(-sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Points the camera at `target`.
    pub fn look_at(&mut self, target: Vec3) {
        let direction = target - self.position;
        if direction.length_squared() <= f32::EPSILON {
            return;
        }
        let direction = direction.normalize();
        self.yaw = (-direction.x).atan2(-direction.z);
        self.pitch = direction.y.asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Projection matrix with the Y axis flipped for Vulkan clip space.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Fly-through movement and mouse look.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraController {
    /// Units per second.
    pub move_speed: f32,
    /// Radians per pixel.
    pub look_sensitivity: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            look_sensitivity: 0.003,
        }
    }
}

impl CameraController {
    pub fn new(move_speed: f32, look_sensitivity: f32) -> Self {
        Self {
            move_speed,
            look_sensitivity,
        }
    }

    /// Applies one frame of input.
    ///
    /// `movement` is (right, up, forward) in -1..=1 per axis; `look_delta`
    /// is the cursor travel in pixels.
    pub fn update(&self, camera: &mut Camera, movement: Vec3, look_delta: Vec2, delta_time: f32) {
        camera.yaw -= look_delta.x * self.look_sensitivity;
        camera.pitch = (camera.pitch - look_delta.y * self.look_sensitivity)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let forward = camera.forward();
        let right = camera.right();
        let step = right * movement.x + Vec3::Y * movement.y + forward * movement.z;
        if step.length_squared() > f32::EPSILON {
            camera.position += step.normalize() * self.move_speed * delta_time;
        }
    }
}
