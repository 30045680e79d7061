//! Events delivered to the application as plain data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTick {
    /// Milliseconds since the driver started.
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierState {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// A raw key transition as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInput {
    /// Physical key code, e.g. `KeyA` or `ArrowLeft`.
    pub code: String,
    /// Produced character or key name, e.g. `a` or `Enter`.
    pub key: String,
    #[serde(default)]
    pub modifiers: ModifierState,
}

impl KeyInput {
    pub fn new(code: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            key: key.into(),
            modifiers: ModifierState::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: ModifierState) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Keys that also produce a `KeyPress`.
    pub fn is_printable(&self) -> bool {
        self.key.chars().count() == 1
            || matches!(self.key.as_str(), "Enter" | "Tab" | "Backspace" | "Delete")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardEvent {
    pub key_code: String,
    pub key: String,
    /// True when the key was already down (auto-repeat).
    pub is_held: bool,
    /// Codes of all keys held after this transition, sorted.
    pub held_keys: Vec<String>,
    pub modifiers: ModifierState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseMove {
    pub client_x: f64,
    pub client_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wheel {
    pub delta_x: f64,
    pub delta_y: f64,
    pub delta_z: f64,
    pub client_x: f64,
    pub client_y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseButton {
    pub button: i16,
    pub client_x: f64,
    pub client_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

/// Everything a session's handler may receive besides frame ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    KeyDown(KeyboardEvent),
    KeyUp(KeyboardEvent),
    KeyPress(KeyboardEvent),
    MouseMove(MouseMove),
    Wheel(Wheel),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    Resize(Resize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_keys() {
        assert!(KeyInput::new("KeyA", "a").is_printable());
        assert!(KeyInput::new("Enter", "Enter").is_printable());
        assert!(KeyInput::new("Backspace", "Backspace").is_printable());
        assert!(!KeyInput::new("ArrowLeft", "ArrowLeft").is_printable());
        assert!(!KeyInput::new("ShiftLeft", "Shift").is_printable());
    }

    #[test]
    fn test_event_serialization() {
        let event = InputEvent::Resize(Resize {
            width: 640,
            height: 480,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "resize");
        assert_eq!(json["width"], 640);
    }
}
