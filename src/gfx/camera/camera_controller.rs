use cgmath::{Point2, Rad, Vector3};
use winit::keyboard::KeyCode;

use super::camera_utils::ScreenProjector;
use super::orbit_camera::{MoveAxis, OrbitCamera, RollDirection};
use crate::input::{InputSnapshot, MouseButton};
use crate::settings::{CameraPose, CameraSettings, LightConfig};

/// Which bindings a view responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Keyboard flight, orbit, turn, roll, pan and zoom.
    Full,
    /// Wheel zoom only; the primary button is left to the view.
    ZoomOnly,
}

/// Camera work the controller can't do on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraRequests {
    /// Refit the camera around the scene.
    pub fit_in_view: bool,
    /// Drag the light with the pointer; see [`drag_light`].
    pub move_light: bool,
}

/// Maps one frame of input onto camera operations.
///
/// | Input                      | Action                     |
/// |----------------------------|----------------------------|
/// | W / S                      | move up / down             |
/// | A / D                      | move left / right          |
/// | Q / E                      | move backward / forward    |
/// | arrows                     | first-person turn          |
/// | Shift + arrows             | orbit                      |
/// | Z / X                      | roll                       |
/// | Alt + pointer motion       | first-person look          |
/// | secondary-button drag      | orbit                      |
/// | Ctrl + secondary drag      | move the light             |
/// | middle-button drag         | pan                        |
/// | wheel                      | zoom                       |
/// | Shift + C                  | reset to the default pose  |
/// | F                          | fit the graph in view      |
pub struct CameraController {
    pub orbit_sensitivity: f32,
    pub turn_sensitivity: f32,
    pub key_orbit_step: Rad<f32>,
    pub key_turn_step: Rad<f32>,
    default_pose: CameraPose,
}

impl CameraController {
    pub fn new(settings: &CameraSettings) -> Self {
        Self {
            orbit_sensitivity: settings.orbit_sensitivity,
            turn_sensitivity: settings.turn_sensitivity,
            key_orbit_step: settings.key_orbit_step,
            key_turn_step: settings.key_turn_step,
            default_pose: settings.default_pose,
        }
    }

    pub fn apply(
        &self,
        input: &InputSnapshot,
        camera: &mut OrbitCamera,
        mode: ControlMode,
    ) -> CameraRequests {
        let mut requests = CameraRequests::default();

        if input.wheel != 0.0 {
            // Scrolling away from the user moves in.
            camera.zoom(-input.wheel);
        }
        if mode == ControlMode::ZoomOnly {
            return requests;
        }

        self.apply_translation(input, camera);
        self.apply_roll(input, camera);
        self.apply_key_rotation(input, camera);
        requests.move_light = self.apply_pointer(input, camera);

        if input.shift() && input.was_key_pressed(KeyCode::KeyC) {
            log::debug!("Resetting camera to default pose");
            camera.reset_to(&self.default_pose);
        } else if input.was_key_pressed(KeyCode::KeyF) {
            requests.fit_in_view = true;
        }
        requests
    }

    fn apply_translation(&self, input: &InputSnapshot, camera: &mut OrbitCamera) {
        const BINDINGS: [(KeyCode, MoveAxis); 6] = [
            (KeyCode::KeyW, MoveAxis::Up),
            (KeyCode::KeyS, MoveAxis::Down),
            (KeyCode::KeyA, MoveAxis::Left),
            (KeyCode::KeyD, MoveAxis::Right),
            (KeyCode::KeyQ, MoveAxis::Backward),
            (KeyCode::KeyE, MoveAxis::Forward),
        ];
        for (key, axis) in BINDINGS {
            if input.is_key_down(key) {
                camera.translate(axis, 1.0);
            }
        }
    }

    fn apply_roll(&self, input: &InputSnapshot, camera: &mut OrbitCamera) {
        if input.is_key_down(KeyCode::KeyX) {
            camera.roll(RollDirection::Clockwise);
        }
        if input.is_key_down(KeyCode::KeyZ) {
            camera.roll(RollDirection::CounterClockwise);
        }
    }

    fn apply_key_rotation(&self, input: &InputSnapshot, camera: &mut OrbitCamera) {
        let horizontal = axis_value(input, KeyCode::ArrowLeft, KeyCode::ArrowRight);
        let vertical = axis_value(input, KeyCode::ArrowUp, KeyCode::ArrowDown);
        if horizontal == 0.0 && vertical == 0.0 {
            return;
        }

        if input.shift() {
            let step = self.key_orbit_step.0;
            camera.orbit(Rad(horizontal * step), Rad(vertical * step));
        } else {
            let step = self.key_turn_step.0;
            camera.turn(Rad(horizontal * step), Rad(vertical * step));
        }
    }

    /// Returns true when the motion belongs to the light instead.
    fn apply_pointer(&self, input: &InputSnapshot, camera: &mut OrbitCamera) -> bool {
        if !input.pointer_moved() {
            return false;
        }
        let (dx, dy) = (input.pointer_delta.x, input.pointer_delta.y);

        if input.alt() {
            camera.turn(
                Rad(-dx * self.turn_sensitivity),
                Rad(-dy * self.turn_sensitivity),
            );
        } else if input.is_button_down(MouseButton::Right) {
            if input.ctrl() {
                return true;
            }
            camera.orbit(
                Rad(-dx * self.orbit_sensitivity),
                Rad(dy * self.orbit_sensitivity),
            );
        } else if input.is_button_down(MouseButton::Middle) {
            camera.pan(-dx, dy);
        }
        false
    }
}

/// Moves a positional light so it follows the pointer on the plane through
/// the light facing the camera.
///
/// Returns false when nothing moved: a directional light, a light behind the
/// eye, or a pointer that can't be unprojected.
pub fn drag_light(light: &mut LightConfig, input: &InputSnapshot, projector: &ScreenProjector) -> bool {
    let [x, y, z, w] = light.position;
    if w == 0.0 {
        return false;
    }
    let Some(pointer) = input.pointer else {
        return false;
    };
    let position = Vector3::new(x, y, z) / w;
    let depth = projector.depth_of(position);
    if depth <= 0.0 {
        return false;
    }
    let previous = Point2::new(pointer.x - input.pointer_delta.x, pointer.y - input.pointer_delta.y);
    let (Some(from), Some(to)) = (
        projector.unproject(previous, depth),
        projector.unproject(pointer, depth),
    ) else {
        return false;
    };
    let moved = (position + (to - from)) * w;
    light.position = [moved.x, moved.y, moved.z, w];
    log::trace!("Light moved to {:?}", light.position);
    true
}

/// +1 while `positive` is held, -1 while `negative` is held, 0 for both or neither.
fn axis_value(input: &InputSnapshot, positive: KeyCode, negative: KeyCode) -> f32 {
    let mut value = 0.0;
    if input.is_key_down(positive) {
        value += 1.0;
    }
    if input.is_key_down(negative) {
        value -= 1.0;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::{Projection, Viewport};
    use crate::input::{InputAggregator, InputEvent};
    use approx::assert_relative_eq;
    use cgmath::{InnerSpace, Vector3};

    fn setup() -> (CameraController, OrbitCamera) {
        let settings = CameraSettings::default();
        (
            CameraController::new(&settings),
            OrbitCamera::from_settings(&settings),
        )
    }

    fn snapshot(events: &[InputEvent]) -> InputSnapshot {
        let aggregator = InputAggregator::new();
        let sink = aggregator.sink();
        for event in events {
            sink.push(*event);
        }
        aggregator.capture()
    }

    #[test]
    fn test_wheel_zooms_in() {
        let (controller, mut camera) = setup();
        let before = camera.distance();
        controller.apply(&snapshot(&[InputEvent::Wheel(2.0)]), &mut camera, ControlMode::Full);
        assert!(camera.distance() < before);
    }

    #[test]
    fn test_zoom_only_ignores_keys() {
        let (controller, mut camera) = setup();
        let eye = camera.eye();
        controller.apply(
            &snapshot(&[InputEvent::KeyPressed(KeyCode::KeyW)]),
            &mut camera,
            ControlMode::ZoomOnly,
        );
        assert_eq!(camera.eye(), eye);
    }

    #[test]
    fn test_held_key_translates_camera() {
        let (controller, mut camera) = setup();
        let target = camera.target();
        controller.apply(
            &snapshot(&[InputEvent::KeyPressed(KeyCode::KeyW)]),
            &mut camera,
            ControlMode::Full,
        );
        let moved = camera.target() - target;
        assert_relative_eq!(moved.dot(camera.up()), 0.04, epsilon = 1e-5);
    }

    #[test]
    fn test_shift_arrow_orbits_instead_of_turning() {
        let (controller, mut camera) = setup();
        let target = camera.target();
        controller.apply(
            &snapshot(&[
                InputEvent::KeyPressed(KeyCode::ShiftLeft),
                InputEvent::KeyPressed(KeyCode::ArrowLeft),
            ]),
            &mut camera,
            ControlMode::Full,
        );
        assert_eq!(camera.target(), target);

        let eye = camera.eye();
        controller.apply(
            &snapshot(&[InputEvent::KeyPressed(KeyCode::ArrowLeft)]),
            &mut camera,
            ControlMode::Full,
        );
        assert!((camera.eye() - eye).magnitude() < 1e-5);
        assert!((camera.target() - target).magnitude() > 1e-4);
    }

    #[test]
    fn test_secondary_drag_orbits() {
        let (controller, mut camera) = setup();
        let eye = camera.eye();
        controller.apply(
            &snapshot(&[
                InputEvent::PointerMoved { x: 100.0, y: 100.0 },
                InputEvent::ButtonPressed(MouseButton::Right),
                InputEvent::PointerMoved { x: 140.0, y: 100.0 },
            ]),
            &mut camera,
            ControlMode::Full,
        );
        assert!((camera.eye() - eye).magnitude() > 1e-3);
        assert_eq!(camera.target(), Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_ctrl_secondary_drag_moves_light_not_camera() {
        let (controller, mut camera) = setup();
        let eye = camera.eye();
        let input = snapshot(&[
            InputEvent::KeyPressed(KeyCode::ControlLeft),
            InputEvent::PointerMoved { x: 100.0, y: 100.0 },
            InputEvent::ButtonPressed(MouseButton::Right),
            InputEvent::PointerMoved { x: 140.0, y: 100.0 },
        ]);
        let requests = controller.apply(&input, &mut camera, ControlMode::Full);
        assert!(requests.move_light);
        assert_eq!(camera.eye(), eye);

        let viewport = Viewport::new(800.0, 600.0);
        let projector = ScreenProjector::new(
            &camera,
            &Projection::from_settings(&CameraSettings::default(), viewport),
            viewport,
        );
        let mut light = LightConfig {
            position: [1.0, 1.0, -2.0, 1.0],
            ..LightConfig::default()
        };
        let before = Vector3::new(light.position[0], light.position[1], light.position[2]);
        let depth = projector.depth_of(before);
        assert!(drag_light(&mut light, &input, &projector));

        let after = Vector3::new(light.position[0], light.position[1], light.position[2]);
        let expected = projector.unproject(Point2::new(140.0, 100.0), depth).unwrap()
            - projector.unproject(Point2::new(100.0, 100.0), depth).unwrap();
        assert!((after - before - expected).magnitude() < 1e-4);
        // Stays on its plane and moves right on screen.
        assert_relative_eq!(projector.depth_of(after), depth, epsilon = 1e-3);
        let (was, now) = (
            projector.project(before).unwrap().position,
            projector.project(after).unwrap().position,
        );
        assert_relative_eq!(now.x - was.x, 40.0, epsilon = 1e-2);
        assert_relative_eq!(now.y, was.y, epsilon = 1e-2);
    }

    #[test]
    fn test_directional_light_does_not_drag() {
        let camera = OrbitCamera::from_settings(&CameraSettings::default());
        let viewport = Viewport::new(800.0, 600.0);
        let projector = ScreenProjector::new(
            &camera,
            &Projection::from_settings(&CameraSettings::default(), viewport),
            viewport,
        );
        let mut light = LightConfig {
            position: [0.0, 0.0, 1.0, 0.0],
            ..LightConfig::default()
        };
        let input = snapshot(&[
            InputEvent::PointerMoved { x: 100.0, y: 100.0 },
            InputEvent::PointerMoved { x: 140.0, y: 100.0 },
        ]);
        assert!(!drag_light(&mut light, &input, &projector));
        assert_eq!(light.position, [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_f_requests_fit_and_shift_c_resets() {
        let (controller, mut camera) = setup();
        let requests = controller.apply(
            &snapshot(&[InputEvent::KeyPressed(KeyCode::KeyF)]),
            &mut camera,
            ControlMode::Full,
        );
        assert!(requests.fit_in_view);

        let eye = camera.eye();
        camera.orbit(Rad(0.5), Rad(0.2));
        camera.zoom(3.0);
        controller.apply(
            &snapshot(&[
                InputEvent::KeyPressed(KeyCode::ShiftRight),
                InputEvent::KeyPressed(KeyCode::KeyC),
            ]),
            &mut camera,
            ControlMode::Full,
        );
        assert!((camera.eye() - eye).magnitude() < 1e-4);
    }
}
