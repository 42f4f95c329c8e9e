use std::fmt;

use crate::coords::Vec2;

/// Keyboard key identifier.
///
/// The runtime maps platform key codes into these variants where possible.
/// Unsupported keys use `Key::Unknown(u32)` with a stable platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    Home,
    End,
    PageUp,
    PageDown,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    Shift,
    Control,
    Alt,
    Meta,

    Plus,
    Minus,

    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Digits
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    /// Platform-dependent key not represented here.
    Unknown(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Pressed/released state of a key or button.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Modifier keys state.
///
/// Stored as booleans rather than bitflags to keep it explicit.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Mouse wheel delta.
///
/// `Line` is "scroll lines" style input; `Pixel` is high precision.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MouseWheelDelta {
    Line { x: f32, y: f32 },
    Pixel { x: f32, y: f32 },
}

impl MouseWheelDelta {
    /// Pixels scrolled per wheel line.
    pub const LINE_HEIGHT: f32 = 20.0;

    /// Delta in pixels.
    pub fn to_pixels(self) -> Vec2 {
        match self {
            MouseWheelDelta::Line { x, y } => Vec2::new(x, y) * Self::LINE_HEIGHT,
            MouseWheelDelta::Pixel { x, y } => Vec2::new(x, y),
        }
    }
}

/// Public canvas event kinds user callbacks subscribe to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EventKind {
    MouseMove,
    MouseButton,
    MouseWheel,
    Key,
}

/// Platform-agnostic input events, positions in framebuffer pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MouseMove {
        pos: Vec2,
        modifiers: Modifiers,
    },
    MouseButton {
        button: MouseButton,
        state: ButtonState,
        pos: Vec2,
        modifiers: Modifiers,
    },
    MouseWheel {
        delta: MouseWheelDelta,
        pos: Vec2,
        modifiers: Modifiers,
    },
    Key {
        key: Key,
        state: ButtonState,
        modifiers: Modifiers,
        /// True when the event is a key repeat.
        repeat: bool,
    },
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::MouseMove { .. } => EventKind::MouseMove,
            InputEvent::MouseButton { .. } => EventKind::MouseButton,
            InputEvent::MouseWheel { .. } => EventKind::MouseWheel,
            InputEvent::Key { .. } => EventKind::Key,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            InputEvent::MouseMove { modifiers, .. }
            | InputEvent::MouseButton { modifiers, .. }
            | InputEvent::MouseWheel { modifiers, .. }
            | InputEvent::Key { modifiers, .. } => *modifiers,
        }
    }
}
