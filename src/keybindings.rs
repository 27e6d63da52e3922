//! Keyboard shortcuts for prompt drawing.
//!
//! Tool hotkeys are configurable; the editing keys (Enter, Escape, Backspace,
//! Delete) are fixed and interpreted by [`crate::drafts::DraftManager`].

use serde::{Deserialize, Serialize};

use crate::interaction::PromptTool;

/// A key press as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Escape,
    Backspace,
    Delete,
    /// A printable character; matched case-insensitively
    Char(char),
}

/// What a bound key asks the host to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Switch the prompt tool
    SelectTool(PromptTool),
    /// Toggle between editing the ROI and editing prompts
    ToggleRoiEditing,
    /// Flip the polarity used for new prompts
    TogglePolarity,
}

/// Keybinding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    /// Hotkey for the point tool
    pub tool_point: char,
    /// Hotkey for the box tool
    pub tool_box: char,
    /// Hotkey for the polygon tool
    pub tool_polygon: char,
    /// Hotkey for switching between ROI and prompt editing
    pub toggle_roi: char,
    /// Hotkey for flipping include/exclude
    pub toggle_polarity: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            tool_point: 't',
            tool_box: 'e',
            tool_polygon: 'r',
            toggle_roi: 'o',
            toggle_polarity: 'x',
        }
    }
}

impl KeyBindings {
    /// Create new keybindings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the action bound to a key press, if any.
    pub fn action_for_key(&self, key: Key) -> Option<KeyAction> {
        let Key::Char(c) = key else {
            return None;
        };
        let c = c.to_ascii_lowercase();
        let matches = |bound: char| bound.to_ascii_lowercase() == c;
        if matches(self.tool_point) {
            Some(KeyAction::SelectTool(PromptTool::Point))
        } else if matches(self.tool_box) {
            Some(KeyAction::SelectTool(PromptTool::Box))
        } else if matches(self.tool_polygon) {
            Some(KeyAction::SelectTool(PromptTool::Polygon))
        } else if matches(self.toggle_roi) {
            Some(KeyAction::ToggleRoiEditing)
        } else if matches(self.toggle_polarity) {
            Some(KeyAction::TogglePolarity)
        } else {
            None
        }
    }

    /// Get the hotkey for a specific tool.
    pub fn key_for_tool(&self, tool: PromptTool) -> char {
        match tool {
            PromptTool::Point => self.tool_point,
            PromptTool::Box => self.tool_box,
            PromptTool::Polygon => self.tool_polygon,
        }
    }

    /// Set the hotkey for a tool.
    pub fn set_tool_key(&mut self, tool: PromptTool, key: char) {
        match tool {
            PromptTool::Point => self.tool_point = key,
            PromptTool::Box => self.tool_box = key,
            PromptTool::Polygon => self.tool_polygon = key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tool_keys() {
        let bindings = KeyBindings::new();
        assert_eq!(
            bindings.action_for_key(Key::Char('e')),
            Some(KeyAction::SelectTool(PromptTool::Box))
        );
        assert_eq!(
            bindings.action_for_key(Key::Char('R')),
            Some(KeyAction::SelectTool(PromptTool::Polygon))
        );
        assert_eq!(
            bindings.action_for_key(Key::Char('o')),
            Some(KeyAction::ToggleRoiEditing)
        );
        assert_eq!(bindings.action_for_key(Key::Char('z')), None);
        assert_eq!(bindings.action_for_key(Key::Enter), None);
    }

    #[test]
    fn test_rebind_tool() {
        let mut bindings = KeyBindings::new();
        bindings.set_tool_key(PromptTool::Point, 'p');
        assert_eq!(bindings.key_for_tool(PromptTool::Point), 'p');
        assert_eq!(
            bindings.action_for_key(Key::Char('p')),
            Some(KeyAction::SelectTool(PromptTool::Point))
        );
        assert_eq!(bindings.action_for_key(Key::Char('t')), None);
    }
}
