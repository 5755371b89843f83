//! # Orbit Camera
//!
//! A camera described by an eye position, a target it looks at and an up
//! vector, with the orbit distance kept equal to `|target - eye|`.
//!
//! ## Operations
//!
//! - [`OrbitCamera::translate`] moves eye and target together along a camera basis vector
//! - [`OrbitCamera::orbit`] swings the eye around the target
//! - [`OrbitCamera::turn`] swings the target around the eye (first-person look)
//! - [`OrbitCamera::roll`] spins the up vector around the view direction
//! - [`OrbitCamera::zoom`] scales the orbit distance by `zoom_base^delta`
//! - [`OrbitCamera::set_target`] recenters the pivot, keeping direction and distance
//!
//! Orbit and turn are rigid rotations applied to the whole camera frame, first
//! about the pole axis and then about the horizontal axis. Elevation is clamped
//! to `±max_elevation` from the pole plane so the view direction never lines up
//! with the pole. A sequence of unclamped orbits whose deltas sum to zero
//! returns the camera to where it started.
//!
//! Any operation whose result would be non-finite or degenerate leaves the
//! camera untouched.

use cgmath::{
    EuclideanSpace, InnerSpace, Matrix4, Point3, Quaternion, Rad, Rotation, Rotation3, Vector3,
};

use super::camera_utils::{convert_matrix4_to_array, Camera, CameraUniform};
use crate::settings::{CameraPose, CameraSettings};

const EPSILON: f32 = 1e-6;

/// Direction of a [`OrbitCamera::translate`] step, relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveAxis {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollDirection {
    Clockwise,
    CounterClockwise,
}

/// Limits and step sizes the camera enforces on itself.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCameraBounds {
    pub min_distance: f32,
    pub max_distance: f32,
    pub max_elevation: Rad<f32>,
    pub move_speed: f32,
    pub roll_step: Rad<f32>,
    pub zoom_base: f32,
    pub pan_speed: f32,
}

impl Default for OrbitCameraBounds {
    fn default() -> Self {
        Self::from(&CameraSettings::default())
    }
}

impl From<&CameraSettings> for OrbitCameraBounds {
    fn from(settings: &CameraSettings) -> Self {
        Self {
            min_distance: settings.min_distance,
            max_distance: settings.max_distance.max(settings.min_distance),
            max_elevation: settings.max_elevation,
            move_speed: settings.move_speed,
            roll_step: settings.roll_step,
            zoom_base: settings.zoom_base,
            pan_speed: settings.pan_speed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    eye: Vector3<f32>,
    target: Vector3<f32>,
    up: Vector3<f32>,
    distance: f32,
    pole: Vector3<f32>,
    pub bounds: OrbitCameraBounds,
}

impl Camera for OrbitCamera {
    fn build_view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            Point3::from_vec(self.eye),
            Point3::from_vec(self.target),
            self.up,
        )
    }
}

impl OrbitCamera {
    /// Creates a camera looking at `pose.target` from the given spherical position.
    ///
    /// # Arguments
    /// * `pose` - Target, distance, azimuth and elevation to start from
    /// * `pole` - Orbit axis; falls back to +Y when zero
    /// * `bounds` - Distance/elevation limits and step sizes
    pub fn new(pose: CameraPose, pole: Vector3<f32>, bounds: OrbitCameraBounds) -> Self {
        let pole = if pole.magnitude2() > EPSILON {
            pole.normalize()
        } else {
            Vector3::unit_y()
        };
        let mut camera = Self {
            eye: pose.target,
            target: pose.target,
            up: pole,
            distance: 1.0,
            pole,
            bounds,
        };
        camera.apply_pose(&pose);
        camera
    }

    /// Builds a camera from view settings, starting at the default pose.
    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(
            settings.default_pose,
            settings.pole,
            OrbitCameraBounds::from(settings),
        )
    }

    pub fn eye(&self) -> Vector3<f32> {
        self.eye
    }

    pub fn target(&self) -> Vector3<f32> {
        self.target
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn pole(&self) -> Vector3<f32> {
        self.pole
    }

    /// Unit view direction, from eye towards target.
    pub fn direction(&self) -> Vector3<f32> {
        (self.target - self.eye).normalize()
    }

    /// Unit vector pointing to the right of the view.
    pub fn right(&self) -> Vector3<f32> {
        self.direction().cross(self.up).normalize()
    }

    /// Current elevation of the eye above the pole plane, seen from the target.
    pub fn elevation(&self) -> Rad<f32> {
        let offset = (self.eye - self.target).normalize();
        Rad(offset.dot(self.pole).clamp(-1.0, 1.0).asin())
    }

    /// Moves eye and target together along a camera basis vector.
    ///
    /// The step is `amount * bounds.move_speed`; the orbit distance is unchanged.
    pub fn translate(&mut self, axis: MoveAxis, amount: f32) {
        let basis = match axis {
            MoveAxis::Forward => self.direction(),
            MoveAxis::Backward => -self.direction(),
            MoveAxis::Right => self.right(),
            MoveAxis::Left => -self.right(),
            MoveAxis::Up => self.up,
            MoveAxis::Down => -self.up,
        };
        self.shift(basis * amount * self.bounds.move_speed);
    }

    /// Pans in the view plane by a screen-space delta scaled with the orbit distance.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let scale = self.distance * self.bounds.pan_speed;
        let movement = self.right() * dx * scale + self.up * dy * scale;
        self.shift(movement);
    }

    /// Rotates the eye around the target at fixed distance.
    ///
    /// Positive `d_azimuth` turns counter-clockwise about the pole, positive
    /// `d_elevation` raises the eye.
    pub fn orbit(&mut self, d_azimuth: Rad<f32>, d_elevation: Rad<f32>) {
        let offset = self.eye - self.target;
        let Some(rotation) = self.frame_rotation(offset, d_azimuth, d_elevation) else {
            log::warn!("Ignoring degenerate orbit ({:?}, {:?})", d_azimuth, d_elevation);
            return;
        };
        let eye = self.target + rotation.rotate_vector(offset);
        let up = rotation.rotate_vector(self.up);
        self.commit(eye, self.target, up);
    }

    /// Rotates the target around the eye (first-person look).
    ///
    /// Positive `d_yaw` turns left, positive `d_pitch` looks up.
    pub fn turn(&mut self, d_yaw: Rad<f32>, d_pitch: Rad<f32>) {
        let forward = self.target - self.eye;
        // Pitching the look direction up lowers the eye relative to the target,
        // so the elevation bookkeeping runs on the reversed vector.
        let Some(rotation) = self.frame_rotation(-forward, d_yaw, -d_pitch) else {
            log::warn!("Ignoring degenerate turn ({:?}, {:?})", d_yaw, d_pitch);
            return;
        };
        let target = self.eye + rotation.rotate_vector(forward);
        let up = rotation.rotate_vector(self.up);
        self.commit(self.eye, target, up);
    }

    /// Rotates the up vector about the view direction by one roll step.
    pub fn roll(&mut self, direction: RollDirection) {
        let angle = match direction {
            RollDirection::Clockwise => self.bounds.roll_step,
            RollDirection::CounterClockwise => -self.bounds.roll_step,
        };
        let rotation = Quaternion::from_axis_angle(self.direction(), angle);
        let up = rotation.rotate_vector(self.up);
        self.commit(self.eye, self.target, up);
    }

    /// Scales the orbit distance by `zoom_base^delta`, clamped to the distance bounds.
    ///
    /// Positive deltas move away from the target.
    pub fn zoom(&mut self, delta: f32) {
        let distance = self.distance * self.bounds.zoom_base.powf(delta);
        self.set_distance(distance);
    }

    /// Sets the orbit distance directly, clamped to the distance bounds.
    pub fn set_distance(&mut self, distance: f32) {
        if distance.is_nan() {
            log::warn!("Ignoring NaN camera distance");
            return;
        }
        let distance = distance.clamp(self.bounds.min_distance, self.bounds.max_distance);
        let eye = self.target - self.direction() * distance;
        self.commit(eye, self.target, self.up);
    }

    /// Moves the orbit pivot without changing view direction or distance.
    pub fn set_target(&mut self, target: Vector3<f32>) {
        self.shift(target - self.target);
    }

    /// Moves the eye to `eye`, carrying the target along.
    pub fn move_to(&mut self, eye: Vector3<f32>) {
        self.shift(eye - self.eye);
    }

    /// Targets `center` and backs off until a sphere of `radius` fills the vertical field of view.
    pub fn fit_to(&mut self, center: Vector3<f32>, radius: f32, fovy: Rad<f32>) {
        let half = (fovy.0 * 0.5).sin();
        if half <= EPSILON || !radius.is_finite() {
            return;
        }
        self.set_target(center);
        self.set_distance(radius / half);
    }

    /// Returns the camera to a stored pose.
    pub fn reset_to(&mut self, pose: &CameraPose) {
        self.apply_pose(pose);
    }

    /// Fills a [`CameraUniform`] for upload, combining this camera with a projection matrix.
    pub fn uniform(&self, projection: Matrix4<f32>) -> CameraUniform {
        CameraUniform {
            view_position: [self.eye.x, self.eye.y, self.eye.z, 1.0],
            view_proj: convert_matrix4_to_array(projection * self.build_view_matrix()),
        }
    }

    fn apply_pose(&mut self, pose: &CameraPose) {
        let distance = pose
            .distance
            .clamp(self.bounds.min_distance, self.bounds.max_distance);
        let elevation = pose
            .elevation
            .0
            .clamp(-self.bounds.max_elevation.0, self.bounds.max_elevation.0);

        // Azimuth is measured from the axis perpendicular to the pole closest to +Z.
        let reference = perpendicular_to(self.pole);
        let side = self.pole.cross(reference);
        let horizontal = reference * pose.azimuth.0.cos() + side * pose.azimuth.0.sin();
        let offset = (horizontal * elevation.cos() + self.pole * elevation.sin()) * distance;

        self.target = pose.target;
        self.eye = pose.target + offset;
        self.distance = distance;
        self.up = self.pole;
        self.reorthonormalize();
    }

    /// Composes the azimuth rotation about the pole with the clamped elevation
    /// rotation about the horizontal axis of `offset`.
    fn frame_rotation(
        &self,
        offset: Vector3<f32>,
        d_azimuth: Rad<f32>,
        d_elevation: Rad<f32>,
    ) -> Option<Quaternion<f32>> {
        if !d_azimuth.0.is_finite() || !d_elevation.0.is_finite() {
            return None;
        }
        let length = offset.magnitude();
        if length <= EPSILON {
            return None;
        }

        let azimuth = Quaternion::from_axis_angle(self.pole, d_azimuth);
        let swung = azimuth.rotate_vector(offset);

        let limit = self.bounds.max_elevation.0;
        let current = (swung.dot(self.pole) / length).clamp(-1.0, 1.0).asin();
        let applied = (current + d_elevation.0).clamp(-limit, limit) - current;

        let horizontal = swung.cross(self.pole);
        let axis = if horizontal.magnitude2() > EPSILON {
            horizontal.normalize()
        } else {
            azimuth.rotate_vector(self.right())
        };
        let elevation = Quaternion::from_axis_angle(axis, Rad(applied));
        Some(elevation * azimuth)
    }

    fn shift(&mut self, delta: Vector3<f32>) {
        self.commit(self.eye + delta, self.target + delta, self.up);
    }

    /// Accepts a new frame only if it is finite and non-degenerate.
    fn commit(&mut self, eye: Vector3<f32>, target: Vector3<f32>, up: Vector3<f32>) {
        let forward = target - eye;
        let distance = forward.magnitude();
        let finite = is_finite(eye) && is_finite(target) && is_finite(up);
        if !finite || distance <= EPSILON {
            log::warn!("Rejected degenerate camera update");
            return;
        }
        let forward = forward / distance;
        let up = up - forward * up.dot(forward);
        if up.magnitude2() <= EPSILON {
            log::warn!("Rejected camera update with up vector parallel to view direction");
            return;
        }
        self.eye = eye;
        self.target = target;
        self.distance = distance;
        self.up = up.normalize();
    }

    fn reorthonormalize(&mut self) {
        let forward = self.direction();
        let up = self.up - forward * self.up.dot(forward);
        self.up = if up.magnitude2() > EPSILON {
            up.normalize()
        } else {
            forward.cross(perpendicular_to(forward)).normalize()
        };
    }
}

fn is_finite(v: Vector3<f32>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

/// Some unit vector perpendicular to `axis`, preferring +Z.
fn perpendicular_to(axis: Vector3<f32>) -> Vector3<f32> {
    let axis = axis.normalize();
    for candidate in [Vector3::unit_z(), Vector3::unit_x(), Vector3::unit_y()] {
        let projected = candidate - axis * candidate.dot(axis);
        if projected.magnitude2() > 1e-3 {
            return projected.normalize();
        }
    }
    Vector3::unit_z()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Deg, Zero};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn camera() -> OrbitCamera {
        OrbitCamera::new(
            CameraPose {
                target: Vector3::new(1.0, 2.0, 3.0),
                distance: 5.0,
                azimuth: Rad(0.3),
                elevation: Rad(0.2),
            },
            Vector3::unit_y(),
            OrbitCameraBounds::default(),
        )
    }

    fn assert_vec_eq(a: Vector3<f32>, b: Vector3<f32>) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-3);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-3);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-3);
    }

    #[test]
    fn test_new_places_eye_at_distance() {
        let cam = camera();
        assert_relative_eq!((cam.eye() - cam.target()).magnitude(), 5.0, epsilon = 1e-4);
        assert_relative_eq!(cam.elevation().0, 0.2, epsilon = 1e-4);
        assert_relative_eq!(cam.up().dot(cam.direction()), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orbit_deltas_summing_to_zero_restore_pose() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cam = camera();
        let (eye, target, up) = (cam.eye(), cam.target(), cam.up());

        let steps: Vec<(f32, f32)> = (0..20)
            .map(|_| (rng.random_range(-0.2..0.2), rng.random_range(-0.05..0.05)))
            .collect();
        for (az, el) in &steps {
            cam.orbit(Rad(*az), Rad(*el));
        }
        for (az, el) in steps.iter().rev() {
            cam.orbit(Rad(-*az), Rad(-*el));
        }

        assert_vec_eq(cam.eye(), eye);
        assert_vec_eq(cam.target(), target);
        assert_vec_eq(cam.up(), up);
    }

    #[test]
    fn test_orbit_keeps_distance_and_target() {
        let mut cam = camera();
        cam.orbit(Rad(1.0), Rad(0.4));
        assert_relative_eq!(cam.distance(), 5.0, epsilon = 1e-4);
        assert_vec_eq(cam.target(), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_orbit_elevation_is_clamped() {
        let mut cam = camera();
        cam.orbit(Rad(0.0), Deg(120.0).into());
        let limit: Rad<f32> = Deg(89.0).into();
        assert_relative_eq!(cam.elevation().0, limit.0, epsilon = 1e-3);

        cam.orbit(Rad(0.0), Deg(-300.0).into());
        assert_relative_eq!(cam.elevation().0, -limit.0, epsilon = 1e-3);
        assert!(cam.up().dot(cam.direction()).abs() < 1e-4);
    }

    #[test]
    fn test_turn_moves_target_not_eye() {
        let mut cam = camera();
        let eye = cam.eye();
        cam.turn(Rad(0.3), Rad(0.1));
        assert_vec_eq(cam.eye(), eye);
        assert_relative_eq!(cam.distance(), 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_turn_pitch_up_raises_target() {
        let mut cam = camera();
        let before = cam.direction().dot(Vector3::unit_y());
        cam.turn(Rad(0.0), Rad(0.2));
        assert!(cam.direction().dot(Vector3::unit_y()) > before);
    }

    #[test]
    fn test_roll_keeps_position_and_orthonormal_up() {
        let mut cam = camera();
        let (eye, target, up) = (cam.eye(), cam.target(), cam.up());
        cam.roll(RollDirection::Clockwise);
        assert_vec_eq(cam.eye(), eye);
        assert_vec_eq(cam.target(), target);
        assert!((cam.up() - up).magnitude() > 1e-4);
        assert_relative_eq!(cam.up().magnitude(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(cam.up().dot(cam.direction()), 0.0, epsilon = 1e-5);

        cam.roll(RollDirection::CounterClockwise);
        assert_vec_eq(cam.up(), up);
    }

    #[test]
    fn test_zoom_round_trip() {
        let mut cam = camera();
        cam.zoom(2.0);
        cam.zoom(-2.0);
        assert_relative_eq!(cam.distance(), 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_zoom_clamps_to_bounds() {
        let mut cam = camera();
        cam.zoom(100.0);
        assert_relative_eq!(cam.distance(), cam.bounds.max_distance, epsilon = 1e-4);

        cam.zoom(-100.0);
        assert_relative_eq!(cam.distance(), cam.bounds.min_distance, epsilon = 1e-4);
        assert_vec_eq(cam.target(), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_translate_preserves_distance() {
        let mut cam = camera();
        let dir = cam.direction();
        cam.translate(MoveAxis::Right, 3.0);
        cam.translate(MoveAxis::Up, -2.0);
        cam.translate(MoveAxis::Forward, 1.0);
        assert_relative_eq!(cam.distance(), 5.0, epsilon = 1e-4);
        assert_vec_eq(cam.direction(), dir);
    }

    #[test]
    fn test_set_target_keeps_direction_and_distance() {
        let mut cam = camera();
        let dir = cam.direction();
        cam.set_target(Vector3::new(-4.0, 0.0, 9.0));
        assert_vec_eq(cam.target(), Vector3::new(-4.0, 0.0, 9.0));
        assert_vec_eq(cam.direction(), dir);
        assert_relative_eq!(cam.distance(), 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_degenerate_operations_are_noops() {
        let mut cam = camera();
        let (eye, target) = (cam.eye(), cam.target());
        cam.orbit(Rad(f32::NAN), Rad(0.0));
        cam.turn(Rad(0.0), Rad(f32::INFINITY));
        cam.set_target(Vector3::new(f32::NAN, 0.0, 0.0));
        cam.zoom(f32::NAN);
        assert_eq!(cam.eye(), eye);
        assert_eq!(cam.target(), target);
    }

    #[test]
    fn test_fit_to_frames_sphere() {
        let mut cam = camera();
        cam.fit_to(Vector3::zero(), 1.0, Deg(45.0).into());
        let expected = 1.0 / (Deg(22.5f32)).0.to_radians().sin();
        assert_relative_eq!(cam.distance(), expected, epsilon = 1e-3);
        assert_vec_eq(cam.target(), Vector3::zero());
    }
}
