//! Keyboard and mouse state for the host's camera controls.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

/// Input accumulated between two frames.
///
/// Window events are fed in as they arrive; the host reads the state while
/// updating the scene and calls [`InputState::begin_frame`] afterwards.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    pressed_buttons: HashSet<MouseButton>,
    mouse_position: Option<(f32, f32)>,
    /// Sum of cursor movement since the last `begin_frame`.
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame state.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.pressed_buttons.insert(button);
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Records a cursor position. The first position after focus produces no delta.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        if let Some((old_x, old_y)) = self.mouse_position {
            self.mouse_delta.0 += x - old_x;
            self.mouse_delta.1 += y - old_y;
        }
        self.mouse_position = Some((x, y));
    }

    /// Forgets the cursor position, e.g. when the cursor leaves the window.
    pub fn on_mouse_left(&mut self) {
        self.mouse_position = None;
    }

    /// Releases everything, e.g. on focus loss.
    pub fn clear(&mut self) {
        self.pressed_keys.clear();
        self.pressed_buttons.clear();
        self.mouse_position = None;
        self.begin_frame();
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// `1.0` if only `positive` is held, `-1.0` if only `negative`, else `0.0`.
    pub fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.is_key_pressed(positive) {
            value += 1.0;
        }
        if self.is_key_pressed(negative) {
            value -= 1.0;
        }
        value
    }

    /// Cursor movement since the last `begin_frame`.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_pressed_lasts_one_frame() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Digit2);
        assert!(input.is_key_just_pressed(KeyCode::Digit2));
        input.begin_frame();
        assert!(!input.is_key_just_pressed(KeyCode::Digit2));
        assert!(input.is_key_pressed(KeyCode::Digit2));
    }

    #[test]
    fn test_key_repeat_is_not_just_pressed() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_axis() {
        let mut input = InputState::new();
        assert_eq!(input.axis(KeyCode::KeyD, KeyCode::KeyA), 0.0);
        input.on_key_pressed(KeyCode::KeyD);
        assert_eq!(input.axis(KeyCode::KeyD, KeyCode::KeyA), 1.0);
        input.on_key_pressed(KeyCode::KeyA);
        assert_eq!(input.axis(KeyCode::KeyD, KeyCode::KeyA), 0.0);
        input.on_key_released(KeyCode::KeyD);
        assert_eq!(input.axis(KeyCode::KeyD, KeyCode::KeyA), -1.0);
    }

    #[test]
    fn test_mouse_delta_accumulates() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 100.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
        input.on_mouse_moved(110.0, 95.0);
        input.on_mouse_moved(115.0, 90.0);
        assert_eq!(input.mouse_delta(), (15.0, -10.0));
        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_clear_releases_buttons() {
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Right);
        input.on_key_pressed(KeyCode::KeyQ);
        input.clear();
        assert!(!input.is_mouse_pressed(MouseButton::Right));
        assert!(!input.is_key_pressed(KeyCode::KeyQ));
    }
}
