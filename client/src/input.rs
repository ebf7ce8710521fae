//! Keyboard sampling with edge detection for one-shot actions

use crate::game::FrameInput;
use macroquad::prelude::*;
use shared::Vec2;

/// Key presses that act on the client rather than the game
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Toggles {
    pub debug_geometry: bool,
}

pub struct InputManager {
    // Previous frame key states for edge detection
    prev_key_f1: bool,
    prev_key_f5: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_key_f1: false,
            prev_key_f5: false,
        }
    }

    /// Samples the keyboard for this frame.
    pub fn update(&mut self) -> (Toggles, FrameInput) {
        let mut direction = Vec2::ZERO;
        if is_key_down(KeyCode::A) || is_key_down(KeyCode::Left) {
            direction.x -= 1.0;
        }
        if is_key_down(KeyCode::D) || is_key_down(KeyCode::Right) {
            direction.x += 1.0;
        }
        if is_key_down(KeyCode::W) || is_key_down(KeyCode::Up) {
            direction.y -= 1.0;
        }
        if is_key_down(KeyCode::S) || is_key_down(KeyCode::Down) {
            direction.y += 1.0;
        }

        let key_f1 = is_key_down(KeyCode::F1);
        let key_f5 = is_key_down(KeyCode::F5);

        let toggles = Toggles {
            debug_geometry: key_f1 && !self.prev_key_f1,
        };
        let input = FrameInput {
            direction,
            running: is_key_down(KeyCode::LeftShift) || is_key_down(KeyCode::RightShift),
            attacking: is_key_down(KeyCode::Space),
            save_requested: key_f5 && !self.prev_key_f5,
        };

        self.prev_key_f1 = key_f1;
        self.prev_key_f5 = key_f5;

        (toggles, input)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(!input_manager.prev_key_f1);
        assert!(!input_manager.prev_key_f5);
    }
}
