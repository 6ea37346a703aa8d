use crate::config::CameraConfig;
use bevy_ecs::prelude::Resource;
use glam::{Mat4, UVec2, Vec2, Vec3};

const DEFAULT_UP: Vec3 = Vec3::Y;

/// Perspective camera looking at a fixed target.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, near, far }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: UVec2) -> Mat4 {
        self.projection_matrix(aspect_of(viewport)) * self.view_matrix()
    }

    /// Projects a world point into canvas pixels (origin top-left). Points
    /// behind the camera yield `None`.
    pub fn project_point(&self, point: Vec3, viewport: UVec2) -> Option<Vec2> {
        if viewport.x == 0 || viewport.y == 0 {
            return None;
        }
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new((ndc.x + 1.0) * 0.5 * viewport.x as f32, (1.0 - ndc.y) * 0.5 * viewport.y as f32))
    }
}

fn aspect_of(viewport: UVec2) -> f32 {
    if viewport.y > 0 {
        viewport.x as f32 / viewport.y as f32
    } else {
        1.0
    }
}

/// Camera whose x/y chase the pointer with a fixed per-frame lerp while it
/// keeps looking at the same point.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct CameraRig {
    pub position: Vec3,
    pub base: Vec3,
    pub look_at: Vec3,
    pub pointer_gain: Vec2,
    pub lerp: f32,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraRig {
    pub fn from_config(config: &CameraConfig) -> Self {
        let base = Vec3::from_array(config.position);
        Self {
            position: base,
            base,
            look_at: Vec3::from_array(config.look_at),
            pointer_gain: Vec2::from_array(config.pointer_gain),
            lerp: config.lerp.clamp(0.0, 1.0),
            fov_y_radians: config.fov_degrees.to_radians(),
            near: config.near,
            far: config.far,
        }
    }

    /// One frame of smoothing toward the pointer, given in normalized device
    /// coordinates.
    pub fn follow(&mut self, pointer: Vec2) {
        let pointer = pointer.clamp(Vec2::splat(-1.0), Vec2::splat(1.0));
        let goal = self.base.truncate() + pointer * self.pointer_gain;
        let current = self.position.truncate();
        let next = current + (goal - current) * self.lerp;
        self.position = next.extend(self.position.z);
    }

    pub fn camera(&self) -> Camera3D {
        Camera3D::new(self.position, self.look_at, self.fov_y_radians, self.near, self.far)
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}
