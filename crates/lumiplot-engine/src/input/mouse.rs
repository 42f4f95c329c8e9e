use crate::coords::Vec2;

use super::types::{ButtonState, InputEvent, Modifiers, MouseButton};

/// Pixels the pointer must travel with a button held before a press turns
/// into a drag.
const DRAG_THRESHOLD: f32 = 3.0;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum MouseState {
    #[default]
    Inactive,
    /// A button is held but the pointer has not moved past the threshold.
    Pressed,
    Dragging,
    /// Wheel moved this frame.
    Wheeling,
    /// Button released without dragging this frame.
    Clicked,
}

/// Interaction state derived from the public mouse events of one canvas.
///
/// Transient states (`Clicked`, `Wheeling`) last until `end_frame`.
#[derive(Debug, Clone, Default)]
pub struct Mouse {
    pub state: MouseState,
    pub button: Option<MouseButton>,
    pub pos: Vec2,
    pub last_pos: Vec2,
    /// Pointer position at the last button press.
    pub press_pos: Vec2,
    /// Wheel movement accumulated this frame, in pixels.
    pub wheel_delta: Vec2,
    pub modifiers: Modifiers,
}

impl Mouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset from the press position while dragging, zero otherwise.
    pub fn drag_delta(&self) -> Vec2 {
        if self.state == MouseState::Dragging {
            self.pos - self.press_pos
        } else {
            Vec2::zero()
        }
    }

    pub fn handle(&mut self, event: &InputEvent) {
        self.modifiers = event.modifiers();
        match *event {
            InputEvent::MouseMove { pos, .. } => {
                self.last_pos = self.pos;
                self.pos = pos;
                if self.state == MouseState::Pressed {
                    let d = pos - self.press_pos;
                    if d.x.abs() > DRAG_THRESHOLD || d.y.abs() > DRAG_THRESHOLD {
                        self.state = MouseState::Dragging;
                    }
                }
            }

            InputEvent::MouseButton { button, state: ButtonState::Pressed, pos, .. } => {
                self.button = Some(button);
                self.pos = pos;
                self.press_pos = pos;
                self.state = MouseState::Pressed;
            }

            InputEvent::MouseButton { state: ButtonState::Released, pos, .. } => {
                self.pos = pos;
                self.state = match self.state {
                    MouseState::Pressed => MouseState::Clicked,
                    _ => MouseState::Inactive,
                };
                if self.state == MouseState::Inactive {
                    self.button = None;
                }
            }

            InputEvent::MouseWheel { delta, pos, .. } => {
                self.pos = pos;
                self.wheel_delta = self.wheel_delta + delta.to_pixels();
                if matches!(self.state, MouseState::Inactive | MouseState::Clicked) {
                    self.state = MouseState::Wheeling;
                }
            }

            InputEvent::Key { .. } => {}
        }
    }

    /// Clears per-frame state.
    pub fn end_frame(&mut self) {
        self.wheel_delta = Vec2::zero();
        if matches!(self.state, MouseState::Clicked | MouseState::Wheeling) {
            self.state = MouseState::Inactive;
            self.button = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MouseWheelDelta;

    fn press(x: f32, y: f32) -> InputEvent {
        InputEvent::MouseButton {
            button: MouseButton::Left,
            state: ButtonState::Pressed,
            pos: Vec2::new(x, y),
            modifiers: Modifiers::default(),
        }
    }

    fn release(x: f32, y: f32) -> InputEvent {
        InputEvent::MouseButton {
            button: MouseButton::Left,
            state: ButtonState::Released,
            pos: Vec2::new(x, y),
            modifiers: Modifiers::default(),
        }
    }

    fn moved(x: f32, y: f32) -> InputEvent {
        InputEvent::MouseMove { pos: Vec2::new(x, y), modifiers: Modifiers::default() }
    }

    #[test]
    fn press_and_release_in_place_is_a_click() {
        let mut m = Mouse::new();
        m.handle(&press(10.0, 10.0));
        m.handle(&moved(11.0, 10.0));
        m.handle(&release(11.0, 10.0));
        assert_eq!(m.state, MouseState::Clicked);
        assert_eq!(m.button, Some(MouseButton::Left));

        m.end_frame();
        assert_eq!(m.state, MouseState::Inactive);
        assert_eq!(m.button, None);
    }

    #[test]
    fn moving_past_threshold_starts_a_drag() {
        let mut m = Mouse::new();
        m.handle(&press(10.0, 10.0));
        m.handle(&moved(30.0, 5.0));
        assert_eq!(m.state, MouseState::Dragging);
        assert_eq!(m.drag_delta(), Vec2::new(20.0, -5.0));

        m.handle(&release(30.0, 5.0));
        assert_eq!(m.state, MouseState::Inactive);
    }

    #[test]
    fn wheel_accumulates_until_end_of_frame() {
        let mut m = Mouse::new();
        let wheel = InputEvent::MouseWheel {
            delta: MouseWheelDelta::Line { x: 0.0, y: 1.0 },
            pos: Vec2::zero(),
            modifiers: Modifiers::default(),
        };
        m.handle(&wheel);
        m.handle(&wheel);
        assert_eq!(m.state, MouseState::Wheeling);
        assert_eq!(m.wheel_delta, Vec2::new(0.0, 40.0));

        m.end_frame();
        assert_eq!(m.wheel_delta, Vec2::zero());
        assert_eq!(m.state, MouseState::Inactive);
    }
}
