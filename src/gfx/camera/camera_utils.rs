//! Projection, viewport and screen mapping shared by picking, rendering and
//! the overview's frustum footprint.
//!
//! Screen coordinates are pixels with the origin at the top-left corner and y
//! growing downwards, matching winit cursor positions. Depth is the distance
//! along the camera's view direction, not the distance to the eye.

use cgmath::{
    perspective, InnerSpace, Matrix4, Point2, Rad, SquareMatrix, Vector3, Vector4,
};

use super::orbit_camera::OrbitCamera;
use crate::settings::CameraSettings;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

pub trait Camera: Sized {
    fn build_view_matrix(&self) -> Matrix4<f32>;
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct CameraUniform {
    /// The eye position of the camera in homogenous coordinates.
    ///
    /// Homogenous coordinates are used to fullfill the 16 byte alignment requirement.
    pub view_position: [f32; 4],

    /// Contains the view projection matrix.
    pub view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    /// Creates a default [CameraUniform].
    fn default() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: convert_matrix4_to_array(Matrix4::identity()),
        }
    }
}

pub fn convert_matrix4_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    let mut result = [[0.0; 4]; 4];

    for i in 0..4 {
        for j in 0..4 {
            result[i][j] = matrix4[i][j];
        }
    }

    result
}

/// Size of the drawable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }

    pub fn contains(&self, point: Point2<f32>) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x <= self.width && point.y <= self.height
    }

    /// Screen corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(self.width, 0.0),
            Point2::new(self.width, self.height),
            Point2::new(0.0, self.height),
        ]
    }
}

/// Perspective projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fovy: Rad<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new(fovy: Rad<f32>, aspect: f32, znear: f32, zfar: f32) -> Self {
        Self {
            fovy,
            aspect,
            znear,
            zfar,
        }
    }

    pub fn from_settings(settings: &CameraSettings, viewport: Viewport) -> Self {
        Self::new(settings.fovy, viewport.aspect(), settings.znear, settings.zfar)
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }

    /// OpenGL-convention projection matrix (clip z in -1..1).
    pub fn matrix(&self) -> Matrix4<f32> {
        perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    /// Projection matrix for wgpu's 0..1 depth range.
    pub fn wgpu_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.matrix()
    }
}

/// A point projected to the screen, with its view-space depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub position: Point2<f32>,
    pub depth: f32,
}

/// Maps between world space and screen pixels for one camera, projection and
/// viewport. Build one per frame after the camera has settled.
#[derive(Debug, Clone, Copy)]
pub struct ScreenProjector {
    view_proj: Matrix4<f32>,
    inverse: Option<Matrix4<f32>>,
    eye: Vector3<f32>,
    forward: Vector3<f32>,
    viewport: Viewport,
    projection: Projection,
}

impl ScreenProjector {
    pub fn new(camera: &OrbitCamera, projection: &Projection, viewport: Viewport) -> Self {
        let mut projection = *projection;
        projection.resize(viewport);
        let view_proj = projection.matrix() * camera.build_view_matrix();
        Self {
            view_proj,
            inverse: view_proj.invert(),
            eye: camera.eye(),
            forward: camera.direction(),
            viewport,
            projection,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn eye(&self) -> Vector3<f32> {
        self.eye
    }

    /// View-space depth of a world point.
    pub fn depth_of(&self, world: Vector3<f32>) -> f32 {
        (world - self.eye).dot(self.forward)
    }

    /// Projects a world point to pixels.
    ///
    /// Returns `None` for points on or behind the eye plane. Points outside the
    /// viewport are still returned.
    pub fn project(&self, world: Vector3<f32>) -> Option<ScreenPoint> {
        let clip = self.view_proj * world.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let position = Point2::new(
            (ndc_x + 1.0) * 0.5 * self.viewport.width,
            (1.0 - ndc_y) * 0.5 * self.viewport.height,
        );
        if !position.x.is_finite() || !position.y.is_finite() {
            return None;
        }
        Some(ScreenPoint {
            position,
            depth: self.depth_of(world),
        })
    }

    /// Finds the world point under a pixel at the given view-space depth.
    pub fn unproject(&self, screen: Point2<f32>, depth: f32) -> Option<Vector3<f32>> {
        let direction = self.ray_direction(screen)?;
        let along = direction.dot(self.forward);
        if along <= f32::EPSILON {
            return None;
        }
        let point = self.eye + direction * (depth / along);
        is_finite(point).then_some(point)
    }

    /// Unit direction of the ray from the eye through a pixel.
    pub fn ray_direction(&self, screen: Point2<f32>) -> Option<Vector3<f32>> {
        if self.viewport.is_empty() {
            return None;
        }
        let inverse = self.inverse?;
        let ndc_x = 2.0 * screen.x / self.viewport.width - 1.0;
        let ndc_y = 1.0 - 2.0 * screen.y / self.viewport.height;

        let near = inverse * Vector4::new(ndc_x, ndc_y, -1.0, 1.0);
        let far = inverse * Vector4::new(ndc_x, ndc_y, 1.0, 1.0);
        if near.w.abs() <= f32::EPSILON || far.w.abs() <= f32::EPSILON {
            return None;
        }
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;
        let direction = far - near;
        if direction.magnitude2() <= f32::EPSILON {
            return None;
        }
        Some(direction.normalize())
    }

    /// Pixels covered by one world unit at the given depth.
    pub fn pixels_per_unit(&self, depth: f32) -> f32 {
        if depth <= f32::EPSILON {
            return 0.0;
        }
        let half = (self.projection.fovy.0 * 0.5).tan();
        self.viewport.height / (2.0 * depth * half)
    }
}

fn is_finite(v: Vector3<f32>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::CameraPose;
    use approx::assert_relative_eq;
    use cgmath::{Deg, Zero};

    fn projector() -> ScreenProjector {
        let settings = CameraSettings::default().with_default_pose(CameraPose {
            target: Vector3::zero(),
            distance: 5.0,
            azimuth: Rad(0.4),
            elevation: Rad(0.3),
        });
        let camera = OrbitCamera::from_settings(&settings);
        let viewport = Viewport::new(800.0, 600.0);
        ScreenProjector::new(&camera, &Projection::from_settings(&settings, viewport), viewport)
    }

    #[test]
    fn test_target_projects_to_center() {
        let projector = projector();
        let p = projector.project(Vector3::zero()).unwrap();
        assert_relative_eq!(p.position.x, 400.0, epsilon = 1e-2);
        assert_relative_eq!(p.position.y, 300.0, epsilon = 1e-2);
        assert_relative_eq!(p.depth, 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_unproject_then_project_round_trip() {
        let projector = projector();
        for &(x, y) in &[(0.0, 0.0), (800.0, 600.0), (123.0, 456.0), (799.0, 1.0)] {
            for &depth in &[0.5, 3.0, 20.0, 49.0] {
                let world = projector.unproject(Point2::new(x, y), depth).unwrap();
                let back = projector.project(world).unwrap();
                assert!((back.position.x - x).abs() < 1.0, "x {x} depth {depth}");
                assert!((back.position.y - y).abs() < 1.0, "y {y} depth {depth}");
                assert_relative_eq!(back.depth, depth, epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn test_points_behind_eye_do_not_project() {
        let projector = projector();
        let behind = projector.eye() - (Vector3::zero() - projector.eye()) * 2.0;
        assert!(projector.project(behind).is_none());
    }

    #[test]
    fn test_empty_viewport_unprojects_nothing() {
        let camera = OrbitCamera::from_settings(&CameraSettings::default());
        let projection = Projection::new(Deg(45.0).into(), 1.0, 0.2, 50.0);
        let projector = ScreenProjector::new(&camera, &projection, Viewport::new(0.0, 0.0));
        assert!(projector.unproject(Point2::new(0.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_pixels_per_unit_shrinks_with_depth() {
        let projector = projector();
        assert!(projector.pixels_per_unit(1.0) > projector.pixels_per_unit(10.0));
        assert_eq!(projector.pixels_per_unit(0.0), 0.0);
    }
}
