// MIT License - Copyright (c) 2026 Peter Wright

use crate::protocol::Command;

/// A scene programmed on the bridge, triggered by pressing one of the
/// bridge's virtual buttons.
#[derive(Debug, Clone)]
pub struct Scene {
    pub scene_id: u32,
    pub name: String,
}

impl Scene {
    pub fn new(scene_id: u32, name: impl Into<String>) -> Self {
        Self {
            scene_id,
            name: name.into(),
        }
    }

    pub fn activate(&self) -> Command {
        Command::activate_scene(self.scene_id)
    }
}
