// MIT License - Copyright (c) 2026 Peter Wright

use bitflags::bitflags;

use crate::constants::ButtonAction;
use crate::protocol::{DeviceKey, Message, Operation};

bitflags! {
    /// Pressed-button bitmask of a remote.
    ///
    /// Bit `n` is the remote's `n`-th button counted from its lowest button
    /// number. On a five-button Pico that gives the named flags below; larger
    /// keypads use the higher bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonState: u32 {
        /// On / top button
        const ON       = 0b0_0001;
        /// Favorite / middle button
        const FAVORITE = 0b0_0010;
        /// Off / bottom button
        const OFF      = 0b0_0100;
        /// Raise arrow
        const RAISE    = 0b0_1000;
        /// Lower arrow
        const LOWER    = 0b1_0000;
    }
}

impl ButtonState {
    /// Names of the flags that are set, lowest bit first.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// A wireless remote or keypad. Each button is a DEVICE component.
#[derive(Debug, Clone)]
pub struct Remote {
    pub id: u32,
    pub name: String,
    pub area: Option<String>,
    buttons: Vec<u32>,
    state: ButtonState,
}

impl Remote {
    pub fn new(id: u32, name: impl Into<String>, buttons: Vec<u32>) -> Self {
        Self {
            id,
            name: name.into(),
            area: None,
            buttons,
            state: ButtonState::empty(),
        }
    }

    pub fn buttons(&self) -> &[u32] {
        &self.buttons
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Bus keys to subscribe: one per button component.
    pub fn keys(&self) -> Vec<DeviceKey> {
        self.buttons
            .iter()
            .map(|&button| DeviceKey::new(self.id, button))
            .collect()
    }

    fn min_button(&self) -> Option<u32> {
        self.buttons.iter().copied().min()
    }

    /// Apply a press or release. Returns true if the bitmask changed.
    pub fn update(&mut self, message: &Message) -> bool {
        if message.operation != Operation::Device || message.integration_id != self.id {
            return false;
        }
        let Some(min) = self.min_button() else {
            return false;
        };
        let state = match message.button_action() {
            Some(ButtonAction::Press) => {
                let bit = message.action.saturating_sub(min);
                if bit >= u32::BITS {
                    return false;
                }
                ButtonState::from_bits_retain(1 << bit)
            }
            Some(ButtonAction::Release) => ButtonState::empty(),
            None => return false,
        };
        let changed = self.state != state;
        self.state = state;
        changed
    }
}
