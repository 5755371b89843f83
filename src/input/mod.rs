//! # Input Aggregation
//!
//! Window events arrive on the event-dispatch thread; frame logic runs once per
//! frame and must see a consistent picture of the keyboard and mouse. The two
//! sides meet in a lock-protected buffer:
//!
//! - [`InputSink`] is the cloneable, thread-safe producer end. It only appends.
//! - [`InputAggregator`] is the frame-side consumer. [`InputAggregator::capture`]
//!   takes everything buffered since the last frame as one immutable
//!   [`InputSnapshot`] and starts a fresh buffer.
//!
//! ## Coalescing rules
//!
//! - Pointer motion deltas and wheel notches are summed.
//! - A key or button pressed and released within one frame appears in both
//!   the pressed and released sets of that frame.
//! - A press of something already held (key repeat) is dropped.
//! - After capture, the held set is the physical state at capture time, which
//!   is `held ∪ pressed \ released` whenever presses and releases don't interleave.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cgmath::{Point2, Vector2, Zero};
use winit::{
    event::{ElementState, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

pub use winit::event::MouseButton;

/// Pixel-precise wheel deltas are converted to notches at this rate.
const PIXELS_PER_WHEEL_NOTCH: f32 = 40.0;

/// A raw input event, already stripped of windowing details.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPressed(KeyCode),
    KeyReleased(KeyCode),
    ButtonPressed(MouseButton),
    ButtonReleased(MouseButton),
    /// Absolute pointer position in pixels.
    PointerMoved { x: f32, y: f32 },
    /// Wheel motion in notches; positive scrolls away from the user.
    Wheel(f32),
    PointerLeft,
    PointerEntered,
}

/// Everything that happened to the keyboard and mouse during one frame.
#[derive(Debug, Clone)]
pub struct InputSnapshot {
    pub keys_pressed: HashSet<KeyCode>,
    /// Keys that were already down when the frame started.
    pub keys_held: HashSet<KeyCode>,
    pub keys_released: HashSet<KeyCode>,
    pub buttons_pressed: HashSet<MouseButton>,
    /// Buttons that were already down when the frame started.
    pub buttons_held: HashSet<MouseButton>,
    pub buttons_released: HashSet<MouseButton>,
    /// Pointer position at the first press of each button this frame.
    pub press_positions: HashMap<MouseButton, Point2<f32>>,
    /// Pointer position at the last release of each button this frame.
    pub release_positions: HashMap<MouseButton, Point2<f32>>,
    /// Last known pointer position; `None` until the pointer first moves over the view.
    pub pointer: Option<Point2<f32>>,
    pub pointer_delta: Vector2<f32>,
    pub wheel: f32,
    /// The pointer is outside the tracked surface at the end of the frame.
    pub pointer_left: bool,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self {
            keys_pressed: HashSet::new(),
            keys_held: HashSet::new(),
            keys_released: HashSet::new(),
            buttons_pressed: HashSet::new(),
            buttons_held: HashSet::new(),
            buttons_released: HashSet::new(),
            press_positions: HashMap::new(),
            release_positions: HashMap::new(),
            pointer: None,
            pointer_delta: Vector2::zero(),
            wheel: 0.0,
            pointer_left: false,
        }
    }
}

impl InputSnapshot {
    /// Down at any point during the frame.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key) || self.keys_pressed.contains(&key)
    }

    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons_held.contains(&button) || self.buttons_pressed.contains(&button)
    }

    pub fn was_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    pub fn was_button_released(&self, button: MouseButton) -> bool {
        self.buttons_released.contains(&button)
    }

    pub fn any_button_down(&self) -> bool {
        !self.buttons_held.is_empty() || !self.buttons_pressed.is_empty()
    }

    pub fn shift(&self) -> bool {
        self.is_key_down(KeyCode::ShiftLeft) || self.is_key_down(KeyCode::ShiftRight)
    }

    pub fn alt(&self) -> bool {
        self.is_key_down(KeyCode::AltLeft) || self.is_key_down(KeyCode::AltRight)
    }

    pub fn ctrl(&self) -> bool {
        self.is_key_down(KeyCode::ControlLeft) || self.is_key_down(KeyCode::ControlRight)
    }

    pub fn pointer_moved(&self) -> bool {
        !self.pointer_delta.is_zero()
    }

    /// Pointer position if it is currently over the view.
    pub fn hover_position(&self) -> Option<Point2<f32>> {
        if self.pointer_left {
            None
        } else {
            self.pointer
        }
    }
}

#[derive(Debug, Default)]
struct InputBuffer {
    attached: bool,
    frame: InputSnapshot,
    keys_down: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    /// Last absolute pointer sample, used to derive deltas.
    last_pointer: Option<Point2<f32>>,
}

impl InputBuffer {
    fn new() -> Self {
        Self {
            attached: true,
            ..Default::default()
        }
    }

    fn push(&mut self, event: InputEvent) {
        let frame = &mut self.frame;
        match event {
            InputEvent::KeyPressed(key) => {
                if self.keys_down.insert(key) {
                    frame.keys_pressed.insert(key);
                }
            }
            InputEvent::KeyReleased(key) => {
                if self.keys_down.remove(&key) {
                    frame.keys_released.insert(key);
                }
            }
            InputEvent::ButtonPressed(button) => {
                if self.buttons_down.insert(button) {
                    frame.buttons_pressed.insert(button);
                    if let Some(pointer) = frame.pointer {
                        frame.press_positions.entry(button).or_insert(pointer);
                    }
                }
            }
            InputEvent::ButtonReleased(button) => {
                if self.buttons_down.remove(&button) {
                    frame.buttons_released.insert(button);
                    if let Some(pointer) = frame.pointer {
                        frame.release_positions.insert(button, pointer);
                    }
                }
            }
            InputEvent::PointerMoved { x, y } => {
                let position = Point2::new(x, y);
                if let Some(last) = self.last_pointer {
                    frame.pointer_delta += position - last;
                }
                self.last_pointer = Some(position);
                frame.pointer = Some(position);
                frame.pointer_left = false;
            }
            InputEvent::Wheel(notches) => frame.wheel += notches,
            InputEvent::PointerLeft => {
                frame.pointer_left = true;
                self.last_pointer = None;
            }
            InputEvent::PointerEntered => frame.pointer_left = false,
        }
    }

    fn take(&mut self) -> InputSnapshot {
        let next = InputSnapshot {
            keys_held: self.keys_down.clone(),
            buttons_held: self.buttons_down.clone(),
            pointer: self.frame.pointer,
            pointer_left: self.frame.pointer_left,
            ..Default::default()
        };
        std::mem::replace(&mut self.frame, next)
    }
}

/// Thread-safe producer end of an [`InputAggregator`].
#[derive(Debug, Clone)]
pub struct InputSink {
    buffer: Arc<Mutex<InputBuffer>>,
}

impl InputSink {
    /// Appends one event to the current frame. Dropped once the view is detached.
    pub fn push(&self, event: InputEvent) {
        let mut buffer = lock(&self.buffer);
        if !buffer.attached {
            log::trace!("Dropping {:?} for detached view", event);
            return;
        }
        buffer.push(event);
    }

    /// Translates a winit window event and pushes it.
    ///
    /// Returns true if the event carried input this sink understands.
    pub fn handle_window_event(&self, event: &WindowEvent) -> bool {
        let translated = match event {
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(code) => Some(match event.state {
                    ElementState::Pressed => InputEvent::KeyPressed(code),
                    ElementState::Released => InputEvent::KeyReleased(code),
                }),
                PhysicalKey::Unidentified(_) => None,
            },
            WindowEvent::MouseInput { state, button, .. } => Some(match state {
                ElementState::Pressed => InputEvent::ButtonPressed(*button),
                ElementState::Released => InputEvent::ButtonReleased(*button),
            }),
            WindowEvent::CursorMoved { position, .. } => Some(InputEvent::PointerMoved {
                x: position.x as f32,
                y: position.y as f32,
            }),
            WindowEvent::MouseWheel { delta, .. } => Some(InputEvent::Wheel(match delta {
                MouseScrollDelta::LineDelta(_, lines) => *lines,
                MouseScrollDelta::PixelDelta(position) => {
                    position.y as f32 / PIXELS_PER_WHEEL_NOTCH
                }
            })),
            WindowEvent::CursorLeft { .. } => Some(InputEvent::PointerLeft),
            WindowEvent::CursorEntered { .. } => Some(InputEvent::PointerEntered),
            _ => None,
        };

        match translated {
            Some(event) => {
                self.push(event);
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.buffer).attached
    }
}

/// Frame-side owner of the input buffer.
#[derive(Debug)]
pub struct InputAggregator {
    buffer: Arc<Mutex<InputBuffer>>,
}

impl Default for InputAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl InputAggregator {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(InputBuffer::new())),
        }
    }

    /// A producer handle for the event-dispatch side.
    pub fn sink(&self) -> InputSink {
        InputSink {
            buffer: Arc::clone(&self.buffer),
        }
    }

    /// Takes this frame's input and advances the held state.
    pub fn capture(&self) -> InputSnapshot {
        lock(&self.buffer).take()
    }

    /// Stops accepting events from every sink and discards anything buffered.
    pub fn detach(&self) {
        let mut buffer = lock(&self.buffer);
        buffer.attached = false;
        buffer.frame = InputSnapshot::default();
        buffer.keys_down.clear();
        buffer.buttons_down.clear();
    }
}

fn lock(buffer: &Mutex<InputBuffer>) -> MutexGuard<'_, InputBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}
