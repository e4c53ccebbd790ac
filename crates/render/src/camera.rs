use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_2, PI};

/// Largest vertical look angle in either direction; keeps the view from
/// flipping over the fixed up axis.
pub const MAX_VERTICAL_ANGLE: f32 = 89.0 * PI / 180.0;

/// Errors from camera construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    #[error("aspect ratio must be positive and finite, got {0}")]
    InvalidAspect(f32),
    #[error("field of view must be in (0, 180) degrees, got {0}")]
    InvalidFov(f32),
    #[error("clip planes must satisfy 0 < near < far, got near={near} far={far}")]
    InvalidClip { near: f32, far: f32 },
    #[error("eye and target coincide or the view is parallel to up")]
    DegenerateView,
}

/// Perspective projection, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    fov_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    matrix: Mat4,
}

impl Projection {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Result<Self, CameraError> {
        if !(aspect.is_finite() && aspect > 0.0) {
            return Err(CameraError::InvalidAspect(aspect));
        }
        if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
            return Err(CameraError::InvalidFov(fov_degrees));
        }
        if !(near > 0.0 && far > near) {
            return Err(CameraError::InvalidClip { near, far });
        }
        Ok(Self {
            fov_degrees,
            aspect,
            near,
            far,
            matrix: Mat4::perspective_rh(fov_degrees.to_radians(), aspect, near, far),
        })
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }
}

/// Anything that can supply view and projection transforms to the renderer.
pub trait Camera {
    fn projection_matrix(&self) -> Mat4;

    fn view_matrix(&self) -> Mat4;

    fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Static camera looking from a fixed eye at a fixed target.
///
/// Fields are only set through [`LookAtCamera::new`], so the view is never
/// degenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAtCamera {
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    projection: Projection,
}

impl LookAtCamera {
    pub fn new(
        projection: Projection,
        eye: Vec3,
        target: Vec3,
        up: Vec3,
    ) -> Result<Self, CameraError> {
        let dir = target - eye;
        if dir.length_squared() <= f32::EPSILON || dir.cross(up).length_squared() <= f32::EPSILON
        {
            return Err(CameraError::DegenerateView);
        }
        Ok(Self {
            eye,
            target,
            up,
            projection,
        })
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

impl Camera for LookAtCamera {
    fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}

/// First-person camera driven by keyboard movement and pointer look.
///
/// Orientation is two angles. The view direction, the horizontal side vector
/// and the target are always derived from them, so `target` is exactly
/// `position + view_direction` after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstPersonCamera {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    horizontal_angle: f32,
    vertical_angle: f32,
    view_direction: Vec3,
    side_vector: Vec3,
    speed: f32,
    sensitivity: f32,
    projection: Projection,
}

impl FirstPersonCamera {
    pub const DEFAULT_SPEED: f32 = 3.0;
    pub const DEFAULT_SENSITIVITY: f32 = 0.005;

    pub fn new(
        projection: Projection,
        position: Vec3,
        horizontal_angle: f32,
        vertical_angle: f32,
    ) -> Self {
        let mut camera = Self {
            position,
            target: position,
            up: Vec3::Y,
            horizontal_angle,
            vertical_angle: vertical_angle.clamp(-MAX_VERTICAL_ANGLE, MAX_VERTICAL_ANGLE),
            view_direction: Vec3::NEG_Z,
            side_vector: Vec3::X,
            speed: Self::DEFAULT_SPEED,
            sensitivity: Self::DEFAULT_SENSITIVITY,
            projection,
        };
        camera.update_vectors();
        camera
    }

    /// Start at `position` aimed at `target`.
    pub fn looking_at(
        projection: Projection,
        position: Vec3,
        target: Vec3,
    ) -> Result<Self, CameraError> {
        let dir = (target - position).try_normalize().ok_or(CameraError::DegenerateView)?;
        let horizontal = dir.x.atan2(dir.z);
        let vertical = dir.y.clamp(-1.0, 1.0).asin();
        Ok(Self::new(projection, position, horizontal, vertical))
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn horizontal_angle(&self) -> f32 {
        self.horizontal_angle
    }

    pub fn vertical_angle(&self) -> f32 {
        self.vertical_angle
    }

    pub fn view_direction(&self) -> Vec3 {
        self.view_direction
    }

    pub fn side_vector(&self) -> Vec3 {
        self.side_vector
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn move_forward(&mut self, dt: f64) {
        self.position += self.view_direction * self.step(dt);
        self.update_target();
    }

    pub fn move_backward(&mut self, dt: f64) {
        self.position -= self.view_direction * self.step(dt);
        self.update_target();
    }

    pub fn move_left(&mut self, dt: f64) {
        self.position -= self.side_vector * self.step(dt);
        self.update_target();
    }

    pub fn move_right(&mut self, dt: f64) {
        self.position += self.side_vector * self.step(dt);
        self.update_target();
    }

    /// Turn by the cursor's displacement from the viewport center.
    ///
    /// Moving the cursor right decreases the horizontal angle; moving it down
    /// decreases the vertical angle. The turn is proportional to the
    /// displacement alone, `_dt` is accepted for call-site symmetry with the
    /// movement operations.
    pub fn update_orientation(
        &mut self,
        _dt: f64,
        cursor_x: f64,
        cursor_y: f64,
        viewport_width: u32,
        viewport_height: u32,
    ) {
        let offset_x = cursor_x - f64::from(viewport_width / 2);
        let offset_y = cursor_y - f64::from(viewport_height / 2);
        if offset_x == 0.0 && offset_y == 0.0 {
            return;
        }

        self.horizontal_angle -= self.sensitivity * offset_x as f32;
        self.vertical_angle = (self.vertical_angle - self.sensitivity * offset_y as f32)
            .clamp(-MAX_VERTICAL_ANGLE, MAX_VERTICAL_ANGLE);
        self.update_vectors();
    }

    fn step(&self, dt: f64) -> f32 {
        self.speed * dt as f32
    }

    fn update_vectors(&mut self) {
        let (sin_v, cos_v) = self.vertical_angle.sin_cos();
        let (sin_h, cos_h) = self.horizontal_angle.sin_cos();
        self.view_direction = Vec3::new(cos_v * sin_h, sin_v, cos_v * cos_h);

        let side = self.horizontal_angle - FRAC_PI_2;
        self.side_vector = Vec3::new(side.sin(), 0.0, side.cos());
        self.update_target();
    }

    fn update_target(&mut self) {
        self.target = self.position + self.view_direction;
    }
}

impl Camera for FirstPersonCamera {
    fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const EPS: f32 = 1e-4;

    fn projection() -> Projection {
        Projection::new(45.0, 4.0 / 3.0, 0.1, 100.0).unwrap()
    }

    fn camera() -> FirstPersonCamera {
        FirstPersonCamera::new(projection(), Vec3::new(2.0, 2.0, 10.0), PI, 0.0)
    }

    #[test]
    fn projection_rejects_bad_parameters() {
        assert_eq!(
            Projection::new(45.0, 0.0, 0.1, 100.0),
            Err(CameraError::InvalidAspect(0.0))
        );
        assert!(Projection::new(45.0, f32::NAN, 0.1, 100.0).is_err());
        assert!(Projection::new(0.0, 1.0, 0.1, 100.0).is_err());
        assert!(Projection::new(45.0, 1.0, 1.0, 0.5).is_err());
    }

    #[test]
    fn projection_matrix_is_cached_perspective() {
        let p = projection();
        let expected = Mat4::perspective_rh(45.0_f32.to_radians(), 4.0 / 3.0, 0.1, 100.0);
        assert!(p.matrix().abs_diff_eq(expected, EPS));
        assert!(camera().projection_matrix().abs_diff_eq(expected, EPS));
    }

    #[test]
    fn facing_negative_z_at_pi() {
        let cam = camera();
        assert!(cam.view_direction().abs_diff_eq(Vec3::NEG_Z, EPS));
        assert!(cam.side_vector().abs_diff_eq(Vec3::X, EPS));
        assert!(cam.target().abs_diff_eq(cam.position() + Vec3::NEG_Z, EPS));
    }

    #[test]
    fn view_matrix_maps_eye_to_origin_and_target_forward() {
        let cam = camera();
        let view = cam.view_matrix();
        assert!(view.determinant().abs() > EPS);

        let eye = view * cam.position().extend(1.0);
        assert!(eye.abs_diff_eq(Vec4::new(0.0, 0.0, 0.0, 1.0), EPS));

        let target = view * cam.target().extend(1.0);
        assert!(target.abs_diff_eq(Vec4::new(0.0, 0.0, -1.0, 1.0), EPS));
    }

    #[test]
    fn forward_then_backward_round_trips() {
        let mut cam = camera();
        cam.update_orientation(0.016, 437.0, 281.0, 800, 600);
        let start = cam.position();
        for dt in [0.0, 0.016, 0.5, 2.0] {
            cam.move_forward(dt);
            cam.move_backward(dt);
            assert!(cam.position().abs_diff_eq(start, EPS));
        }
    }

    #[test]
    fn zero_delta_time_is_noop() {
        let mut cam = camera();
        let before = cam.clone();
        cam.move_forward(0.0);
        cam.move_left(0.0);
        assert_eq!(cam, before);
    }

    #[test]
    fn movement_scales_with_speed_and_dt() {
        let mut cam = camera().with_speed(2.0);
        let start = cam.position();
        cam.move_forward(0.5);
        assert!(cam.position().abs_diff_eq(start + Vec3::NEG_Z, EPS));
        assert!(cam.target().abs_diff_eq(cam.position() + cam.view_direction(), EPS));
    }

    #[test]
    fn strafing_stays_horizontal_when_pitched() {
        let mut cam = camera();
        cam.update_orientation(0.016, 400.0, 100.0, 800, 600);
        assert!(cam.vertical_angle() > 0.5);

        let y = cam.position().y;
        cam.move_right(1.0);
        cam.move_left(0.25);
        assert!((cam.position().y - y).abs() < EPS);
    }

    #[test]
    fn centered_cursor_leaves_orientation_unchanged() {
        let mut cam = camera();
        let before = cam.clone();
        cam.update_orientation(0.016, 400.0, 300.0, 800, 600);
        assert_eq!(cam, before);
    }

    #[test]
    fn cursor_right_decreases_horizontal_angle() {
        let mut cam = camera();
        cam.update_orientation(0.016, 410.0, 300.0, 800, 600);
        assert!((cam.horizontal_angle() - (PI - 0.05)).abs() < EPS);
        assert_eq!(cam.vertical_angle(), 0.0);
    }

    #[test]
    fn cursor_down_looks_down() {
        let mut cam = camera();
        cam.update_orientation(0.016, 400.0, 320.0, 800, 600);
        assert!(cam.vertical_angle() < 0.0);
        assert!(cam.view_direction().y < 0.0);
        assert!(cam.target().abs_diff_eq(cam.position() + cam.view_direction(), EPS));
    }

    #[test]
    fn vertical_angle_is_clamped() {
        let mut cam = camera();
        cam.update_orientation(0.016, 400.0, -100_000.0, 800, 600);
        assert_eq!(cam.vertical_angle(), MAX_VERTICAL_ANGLE);
        cam.update_orientation(0.016, 400.0, 100_000.0, 800, 600);
        assert_eq!(cam.vertical_angle(), -MAX_VERTICAL_ANGLE);
        assert!(!cam.view_matrix().is_nan());
    }

    #[test]
    fn up_is_never_recomputed() {
        let mut cam = camera();
        cam.update_orientation(0.016, 123.0, 456.0, 800, 600);
        cam.move_forward(1.0);
        assert_eq!(cam.up(), Vec3::Y);
    }

    #[test]
    fn looking_at_aims_at_target() {
        let cam = FirstPersonCamera::looking_at(projection(), Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO)
            .unwrap();
        assert!(cam.view_direction().abs_diff_eq(Vec3::NEG_Z, EPS));
        assert!((cam.horizontal_angle() - PI).abs() < EPS);
    }

    #[test]
    fn looking_at_same_point_is_degenerate() {
        let err = FirstPersonCamera::looking_at(projection(), Vec3::ONE, Vec3::ONE).unwrap_err();
        assert_eq!(err, CameraError::DegenerateView);
    }

    #[test]
    fn look_at_camera_matches_glam() {
        let cam = LookAtCamera::new(projection(), Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .unwrap();
        assert_eq!(cam.eye(), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(cam.target(), Vec3::ZERO);
        assert_eq!(cam.up(), Vec3::Y);
        assert_eq!(cam.projection(), &projection());
        let expected = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        assert!(cam.view_matrix().abs_diff_eq(expected, EPS));
        assert!(
            cam.view_projection()
                .abs_diff_eq(projection().matrix() * expected, EPS)
        );
    }

    #[test]
    fn look_at_camera_rejects_parallel_up() {
        let err = LookAtCamera::new(projection(), Vec3::ZERO, Vec3::Y, Vec3::Y).unwrap_err();
        assert_eq!(err, CameraError::DegenerateView);
    }
}
