//! Camera for viewing the scene.

use glam::{Mat4, Quat, Vec3};

/// Perspective projection parameters.
#[derive(Clone, Copy, Debug)]
pub struct Perspective {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport width divided by height.
    pub aspect: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// A camera for rendering the scene.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Camera rotation
    pub rotation: Quat,
    /// Projection settings
    pub projection: Perspective,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::IDENTITY,
            projection: Perspective::default(),
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the perspective projection.
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Perspective {
            fov_y,
            aspect,
            near,
            far,
        };
    }

    /// Update the aspect ratio, typically after a window resize.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.projection.aspect = aspect;
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        let target = self.position + self.forward();
        Mat4::look_at_rh(self.position, target, Vec3::Y)
    }

    /// Get the projection matrix (with Vulkan Y-flip).
    pub fn projection_matrix(&self) -> Mat4 {
        let Perspective {
            fov_y,
            aspect,
            near,
            far,
        } = self.projection;
        let mut proj = Mat4::perspective_rh(fov_y, aspect, near, far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        proj
    }

    /// Get the view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the forward direction vector.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Look at a target position.
    pub fn look_at(&mut self, target: Vec3) {
        let forward = (target - self.position).normalize();
        if forward.length_squared() > 0.0 {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, forward);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::new();
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));

        // The origin sits 5 units ahead of the camera in view space
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(origin_in_view.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = Camera::new();
        let Perspective {
            fov_y,
            aspect,
            near,
            far,
        } = camera.projection;

        let unflipped = Mat4::perspective_rh(fov_y, aspect, near, far);
        let proj = camera.projection_matrix();
        assert_eq!(proj.y_axis.y, -unflipped.y_axis.y);
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn set_aspect_only_touches_aspect() {
        let mut camera = Camera::new();
        let before = camera.projection;
        camera.set_aspect(2.0);
        assert_eq!(camera.projection.aspect, 2.0);
        assert_eq!(camera.projection.fov_y, before.fov_y);
        assert_eq!(camera.projection.near, before.near);
        assert_eq!(camera.projection.far, before.far);
    }

    #[test]
    fn look_at_turns_toward_target() {
        let mut camera = Camera::new();
        camera.position = Vec3::new(0.0, 3.0, 5.0);
        camera.look_at(Vec3::ZERO);

        let expected = (Vec3::ZERO - camera.position).normalize();
        assert!(camera.forward().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn view_projection_composes_projection_after_view() {
        let camera = Camera::new();
        let vp = camera.view_projection_matrix();
        let composed = camera.projection_matrix() * camera.view_matrix();
        assert!(vp.abs_diff_eq(composed, 1e-6));
    }
}
