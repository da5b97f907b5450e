// MIT License - Copyright (c) 2026 Peter Wright

use crate::protocol::{Command, FanSpeed, Message, Operation};

/// A fan speed controller.
#[derive(Debug, Clone)]
pub struct Fan {
    pub id: u32,
    pub name: String,
    pub area: Option<String>,
    speed: Option<FanSpeed>,
}

impl Fan {
    /// Speed used by `turn_on` when none is given.
    pub const DEFAULT_SPEED: FanSpeed = FanSpeed::Medium;

    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            area: None,
            speed: None,
        }
    }

    pub fn speed(&self) -> Option<FanSpeed> {
        self.speed
    }

    pub fn update(&mut self, message: &Message) -> bool {
        if message.operation != Operation::Output || message.integration_id != self.id {
            return false;
        }
        let Some(level) = message.level() else {
            return false;
        };
        let speed = FanSpeed::from_level(level);
        let changed = self.speed != Some(speed);
        self.speed = Some(speed);
        changed
    }

    pub fn set_speed(&self, speed: FanSpeed) -> Command {
        Command::set_fan_speed(self.id, speed)
    }

    pub fn turn_on(&self, speed: Option<FanSpeed>) -> Command {
        self.set_speed(speed.unwrap_or(Self::DEFAULT_SPEED))
    }

    pub fn turn_off(&self) -> Command {
        self.set_speed(FanSpeed::Off)
    }
}
