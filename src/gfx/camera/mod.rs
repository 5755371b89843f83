pub mod camera_controller;
pub mod camera_utils;
pub mod orbit_camera;

// Re-export main types
pub use camera_controller::{drag_light, CameraController, CameraRequests, ControlMode};
pub use camera_utils::{CameraUniform, Projection, ScreenPoint, ScreenProjector, Viewport};
pub use orbit_camera::{MoveAxis, OrbitCamera, OrbitCameraBounds, RollDirection};
