use glam::{Mat4, Vec3};

use crate::surface::Viewport;

/// Orthographic camera orbiting a target point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrthoCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// Distance from the target to the eye along the view direction.
    pub distance: f32,
    /// Half the visible height in world units.
    pub half_height: f32,
    pub near: f32,
    pub far: f32,
    pub sensitivity: f32,
}

impl Default for OrthoCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            yaw: -std::f32::consts::FRAC_PI_2,
            pitch: -0.35,
            distance: 20.0,
            half_height: 5.0,
            near: 0.01,
            far: 100.0,
            sensitivity: 0.005,
        }
    }
}

impl OrthoCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
    }

    pub fn position(&self) -> Vec3 {
        self.target - self.forward() * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// `aspect` is width over height.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let half_width = self.half_height * aspect;
        Mat4::orthographic_rh(
            -half_width,
            half_width,
            -self.half_height,
            self.half_height,
            self.near,
            self.far,
        )
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw += delta_x * self.sensitivity;
        self.pitch -= delta_y * self.sensitivity;

        const PITCH_LIMIT: f32 = 1.5533; // ~89 degrees
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Sets the orthographic size so a box of `bounds_size` centred on the
    /// target fills the viewport.
    pub fn fit_bounds(&mut self, bounds_size: Vec3, viewport: Viewport) {
        let fitted = frame_bounds_ortho(self.target, bounds_size, self.view_matrix(), viewport);
        if fitted > 0.0 {
            self.half_height = fitted;
        }
    }
}

/// Smallest orthographic half-height that keeps all eight corners of an
/// axis-aligned box inside the viewport.
pub fn frame_bounds_ortho(center: Vec3, bounds_size: Vec3, world_to_view: Mat4, viewport: Viewport) -> f32 {
    let half = bounds_size * 0.5;
    let mut max_x: f32 = 0.0;
    let mut max_y: f32 = 0.0;

    for i in 0..8 {
        let corner = center
            + Vec3::new(
                if i & 1 == 0 { -half.x } else { half.x },
                if i & 2 == 0 { -half.y } else { half.y },
                if i & 4 == 0 { -half.z } else { half.z },
            );
        let view_corner = world_to_view.transform_point3(corner);
        max_x = max_x.max(view_corner.x.abs());
        max_y = max_y.max(view_corner.y.abs());
    }

    let aspect = 1.0 / viewport.aspect();
    max_y.max(max_x * aspect)
}
