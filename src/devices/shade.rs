// MIT License - Copyright (c) 2026 Peter Wright

use crate::protocol::{Command, FadeTime, Level, Message, Operation};

/// A motorized shade ("cover"). Position is reported as an output level,
/// 0 closed and 100 open.
#[derive(Debug, Clone)]
pub struct Shade {
    pub id: u32,
    pub name: String,
    pub area: Option<String>,
    position: Option<Level>,
}

impl Shade {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            area: None,
            position: None,
        }
    }

    pub fn position(&self) -> Option<Level> {
        self.position
    }

    pub fn is_closed(&self) -> Option<bool> {
        self.position.map(|p| p.is_off())
    }

    pub fn update(&mut self, message: &Message) -> bool {
        if message.operation != Operation::Output || message.integration_id != self.id {
            return false;
        }
        let Some(position) = message.level() else {
            return false;
        };
        let changed = self.position != Some(position);
        self.position = Some(position);
        changed
    }

    pub fn open(&self) -> Command {
        Command::raise(self.id)
    }

    pub fn close(&self) -> Command {
        Command::lower(self.id)
    }

    pub fn stop(&self) -> Command {
        Command::stop(self.id)
    }

    /// Move to `position` immediately.
    pub fn set_position(&self, position: Level) -> Command {
        Command::set_level(self.id, position, Some(FadeTime::ZERO), Some(FadeTime::ZERO))
    }
}
