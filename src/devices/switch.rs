// MIT License - Copyright (c) 2026 Peter Wright

use crate::protocol::{Command, Level, Message, Operation};

/// An on/off zone.
#[derive(Debug, Clone)]
pub struct Switch {
    pub id: u32,
    pub name: String,
    pub area: Option<String>,
    on: Option<bool>,
}

impl Switch {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            area: None,
            on: None,
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        self.on
    }

    pub fn update(&mut self, message: &Message) -> bool {
        if message.operation != Operation::Output || message.integration_id != self.id {
            return false;
        }
        let Some(level) = message.level() else {
            return false;
        };
        let on = !level.is_off();
        let changed = self.on != Some(on);
        self.on = Some(on);
        changed
    }

    pub fn turn_on(&self) -> Command {
        Command::set_level(self.id, Level::FULL, None, None)
    }

    pub fn turn_off(&self) -> Command {
        Command::set_level(self.id, Level::OFF, None, None)
    }
}
