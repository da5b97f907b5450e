// MIT License - Copyright (c) 2026 Peter Wright

use crate::protocol::{Command, FadeTime, Level, Message, Operation};

/// A dimmer zone.
#[derive(Debug, Clone)]
pub struct Light {
    pub id: u32,
    pub name: String,
    pub area: Option<String>,
    /// Fade applied when a request does not name one
    pub default_fade: Option<FadeTime>,
    level: Option<Level>,
}

impl Light {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            area: None,
            default_fade: None,
            level: None,
        }
    }

    /// Last reported level; `None` until the first report.
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    pub fn is_on(&self) -> bool {
        self.level.is_some_and(|l| !l.is_off())
    }

    /// Update from an OUTPUT level report. Returns true if the level changed.
    pub fn update(&mut self, message: &Message) -> bool {
        if message.operation != Operation::Output || message.integration_id != self.id {
            return false;
        }
        let Some(level) = message.level() else {
            return false;
        };
        let changed = self.level != Some(level);
        self.level = Some(level);
        changed
    }

    pub fn set_level(&self, level: Level, fade: Option<FadeTime>) -> Command {
        Command::set_level(self.id, level, fade.or(self.default_fade), None)
    }

    pub fn turn_on(&self, fade: Option<FadeTime>) -> Command {
        self.set_level(Level::FULL, fade)
    }

    pub fn turn_off(&self, fade: Option<FadeTime>) -> Command {
        self.set_level(Level::OFF, fade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    #[test]
    fn test_light_tracks_level() {
        let mut light = Light::new(4, "Kitchen");
        assert!(!light.is_on());
        assert!(light.update(&decode("~OUTPUT,4,1,33.33").unwrap()));
        assert!(light.is_on());
        assert_eq!(light.level().unwrap().to_string(), "33.33");
        assert!(!light.update(&decode("~OUTPUT,4,1,33.33").unwrap()));
        assert!(!light.update(&decode("~OUTPUT,5,1,0").unwrap()));
    }

    #[test]
    fn test_light_commands_use_default_fade() {
        let mut light = Light::new(4, "Kitchen");
        light.default_fade = Some(FadeTime::from_secs(2));
        assert_eq!(light.turn_on(None).to_wire_string(), "#OUTPUT,4,1,100,00:00:02");
        assert_eq!(
            light.turn_off(Some(FadeTime::from_secs_f64(0.5))).to_wire_string(),
            "#OUTPUT,4,1,0,0.50"
        );
    }
}
