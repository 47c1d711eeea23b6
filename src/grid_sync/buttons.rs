use crate::config::GridConfig;
use crate::messages::{GridPress, OutgoingMessage};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ButtonAction {
    ScrollUp,
    ScrollDown,
    Play,
    Stop,
    StopAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBinding {
    pub x: u8,
    pub y: u8,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonOutcome {
    Unhandled,
    /// A binding matched a release. The LED is echoed, routing continues.
    Released { x: u8, y: u8 },
    /// A binding matched a press. The LED goes on, then the action runs.
    Pressed { x: u8, y: u8, action: ButtonAction },
}

impl ButtonOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, ButtonOutcome::Pressed { .. })
    }

    pub fn led(&self) -> Option<OutgoingMessage> {
        match *self {
            ButtonOutcome::Unhandled => None,
            ButtonOutcome::Released { x, y } => Some(OutgoingMessage::Led { x, y, on: false }),
            ButtonOutcome::Pressed { x, y, .. } => Some(OutgoingMessage::Led { x, y, on: true }),
        }
    }
}

/// Fixed-position buttons, matched in registration order.
#[derive(Debug, Clone, Default)]
pub struct ButtonRegistry {
    bindings: Vec<ButtonBinding>,
}

impl ButtonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scroll up/down at the left of the control row, play/stop at its right,
    /// stop-all above stop.
    pub fn with_default_layout(config: &GridConfig) -> Self {
        let right = config.width - 1;
        let bottom = config.height - 1;

        let mut registry = Self::new();
        registry.register(0, bottom, ButtonAction::ScrollUp);
        registry.register(1, bottom, ButtonAction::ScrollDown);
        registry.register(right - 1, bottom, ButtonAction::Play);
        registry.register(right, bottom, ButtonAction::Stop);
        registry.register(right, bottom - 1, ButtonAction::StopAll);
        registry
    }

    pub fn register(&mut self, x: u8, y: u8, action: ButtonAction) {
        self.bindings.push(ButtonBinding { x, y, action });
    }

    pub fn dispatch(&self, press: GridPress) -> ButtonOutcome {
        let Some(binding) = self
            .bindings
            .iter()
            .find(|b| b.x == press.x && b.y == press.y)
        else {
            return ButtonOutcome::Unhandled;
        };

        if press.is_press() {
            ButtonOutcome::Pressed {
                x: binding.x,
                y: binding.y,
                action: binding.action,
            }
        } else {
            ButtonOutcome::Released {
                x: binding.x,
                y: binding.y,
            }
        }
    }

    pub fn bindings(&self) -> &[ButtonBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
