// MIT License - Copyright (c) 2026 Peter Wright

//! Device adapters built on top of the bridge connection.
//!
//! Each adapter turns notifications into cached state and requests into
//! commands. They never touch the socket themselves.

pub mod fan;
pub mod light;
pub mod remote;
pub mod scene;
pub mod shade;
pub mod switch;

pub use fan::Fan;
pub use light::Light;
pub use remote::{ButtonState, Remote};
pub use scene::Scene;
pub use shade::Shade;
pub use switch::Switch;

use serde::Serialize;

use crate::catalog::{CatalogEntry, DeviceKind};
use crate::constants::{BRIDGE_INTEGRATION_ID, OutputAction};
use crate::error::{LutronError, Result};
use crate::protocol::{Command, DeviceKey, FadeTime, FanSpeed, Level, Message};

/// Something a caller wants a device to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceRequest {
    TurnOn { fade: Option<FadeTime> },
    TurnOff { fade: Option<FadeTime> },
    SetLevel { level: Level, fade: Option<FadeTime> },
    Open,
    Close,
    Stop,
    SetSpeed(FanSpeed),
    Activate,
}

/// Flat state report, suitable for JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum Device {
    Light(Light),
    Switch(Switch),
    Cover(Shade),
    Fan(Fan),
    Scene(Scene),
    Remote(Remote),
}

impl Device {
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        let area = entry.area.clone();
        match entry.kind {
            DeviceKind::Light => {
                let mut light = Light::new(entry.id, &entry.name);
                light.area = area;
                Self::Light(light)
            }
            DeviceKind::Switch => {
                let mut switch = Switch::new(entry.id, &entry.name);
                switch.area = area;
                Self::Switch(switch)
            }
            DeviceKind::Cover => {
                let mut shade = Shade::new(entry.id, &entry.name);
                shade.area = area;
                Self::Cover(shade)
            }
            DeviceKind::Fan => {
                let mut fan = Fan::new(entry.id, &entry.name);
                fan.area = area;
                Self::Fan(fan)
            }
            DeviceKind::Scene => Self::Scene(Scene::new(entry.scene_id.unwrap_or_default(), &entry.name)),
            DeviceKind::Remote => {
                let mut remote = Remote::new(entry.id, &entry.name, entry.buttons.clone());
                remote.area = area;
                Self::Remote(remote)
            }
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Light(_) => DeviceKind::Light,
            Self::Switch(_) => DeviceKind::Switch,
            Self::Cover(_) => DeviceKind::Cover,
            Self::Fan(_) => DeviceKind::Fan,
            Self::Scene(_) => DeviceKind::Scene,
            Self::Remote(_) => DeviceKind::Remote,
        }
    }

    /// Integration ID; scenes live on the bridge itself.
    pub fn id(&self) -> u32 {
        match self {
            Self::Light(d) => d.id,
            Self::Switch(d) => d.id,
            Self::Cover(d) => d.id,
            Self::Fan(d) => d.id,
            Self::Scene(_) => BRIDGE_INTEGRATION_ID,
            Self::Remote(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Light(d) => &d.name,
            Self::Switch(d) => &d.name,
            Self::Cover(d) => &d.name,
            Self::Fan(d) => &d.name,
            Self::Scene(d) => &d.name,
            Self::Remote(d) => &d.name,
        }
    }

    pub fn area(&self) -> Option<&str> {
        match self {
            Self::Light(d) => d.area.as_deref(),
            Self::Switch(d) => d.area.as_deref(),
            Self::Cover(d) => d.area.as_deref(),
            Self::Fan(d) => d.area.as_deref(),
            Self::Scene(_) => None,
            Self::Remote(d) => d.area.as_deref(),
        }
    }

    /// Bridge button number, for scenes.
    pub fn scene_id(&self) -> Option<u32> {
        match self {
            Self::Scene(d) => Some(d.scene_id),
            _ => None,
        }
    }

    /// Bus keys this device listens on.
    pub fn keys(&self) -> Vec<DeviceKey> {
        match self {
            Self::Light(_) | Self::Switch(_) | Self::Cover(_) | Self::Fan(_) => {
                vec![DeviceKey::new(self.id(), OutputAction::Set.number())]
            }
            Self::Scene(_) => Vec::new(),
            Self::Remote(remote) => remote.keys(),
        }
    }

    /// Query that refreshes cached state, for devices that have any.
    pub fn refresh(&self) -> Option<Command> {
        match self {
            Self::Light(_) | Self::Switch(_) | Self::Cover(_) | Self::Fan(_) => {
                Some(Command::query_output(self.id()))
            }
            Self::Scene(_) | Self::Remote(_) => None,
        }
    }

    /// Apply a notification or query reply. Returns true if state changed.
    pub fn update(&mut self, message: &Message) -> bool {
        match self {
            Self::Light(d) => d.update(message),
            Self::Switch(d) => d.update(message),
            Self::Cover(d) => d.update(message),
            Self::Fan(d) => d.update(message),
            Self::Scene(_) => false,
            Self::Remote(d) => d.update(message),
        }
    }

    pub fn state(&self) -> DeviceState {
        match self {
            Self::Light(d) => DeviceState {
                on: d.level().map(|l| !l.is_off()),
                level: d.level().map(|l| l.as_f64()),
                ..Default::default()
            },
            Self::Switch(d) => DeviceState {
                on: d.is_on(),
                ..Default::default()
            },
            Self::Cover(d) => DeviceState {
                position: d.position().map(|p| p.as_f64()),
                ..Default::default()
            },
            Self::Fan(d) => DeviceState {
                on: d.speed().map(|s| s != FanSpeed::Off),
                speed: d.speed().map(|s| s.name()),
                ..Default::default()
            },
            Self::Scene(_) => DeviceState::default(),
            Self::Remote(d) => DeviceState {
                buttons: Some(d.state().bits()),
                ..Default::default()
            },
        }
    }

    /// Command for a request, or `InvalidCommand` if this kind of device
    /// cannot do it.
    pub fn command(&self, request: DeviceRequest) -> Result<Command> {
        let command = match (self, request) {
            (Self::Light(d), DeviceRequest::TurnOn { fade }) => d.turn_on(fade),
            (Self::Light(d), DeviceRequest::TurnOff { fade }) => d.turn_off(fade),
            (Self::Light(d), DeviceRequest::SetLevel { level, fade }) => d.set_level(level, fade),
            (Self::Switch(d), DeviceRequest::TurnOn { .. }) => d.turn_on(),
            (Self::Switch(d), DeviceRequest::TurnOff { .. }) => d.turn_off(),
            (Self::Cover(d), DeviceRequest::Open) => d.open(),
            (Self::Cover(d), DeviceRequest::Close) => d.close(),
            (Self::Cover(d), DeviceRequest::Stop) => d.stop(),
            (Self::Cover(d), DeviceRequest::SetLevel { level, .. }) => d.set_position(level),
            (Self::Fan(d), DeviceRequest::TurnOn { .. }) => d.turn_on(None),
            (Self::Fan(d), DeviceRequest::TurnOff { .. }) => d.turn_off(),
            (Self::Fan(d), DeviceRequest::SetSpeed(speed)) => d.set_speed(speed),
            (Self::Scene(d), DeviceRequest::Activate) => d.activate(),
            (device, request) => {
                return Err(LutronError::InvalidCommand {
                    details: format!("{:?} not supported by {} {}", request, device.kind(), device.name()),
                });
            }
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::protocol::decode;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::from_json(
            r#"{"LIPIdList": {
                "Zones": [{"ID": 2, "Name": "Lamp"}, {"ID": 3, "Name": "Fan"}],
                "Devices": [
                    {"ID": 1, "Buttons": [{"Number": 5, "Name": "Evening"}]},
                    {"ID": 10, "Name": "Pico", "Buttons": [{"Number": 2}, {"Number": 4}]}
                ]
            }}"#,
        )
        .unwrap();
        catalog.retype(DeviceKind::Fan, &[3]);
        catalog
    }

    #[test]
    fn test_devices_from_catalog() {
        let devices: Vec<Device> = catalog().entries().iter().map(Device::from_entry).collect();
        let kinds: Vec<DeviceKind> = devices.iter().map(Device::kind).collect();
        assert_eq!(
            kinds,
            vec![DeviceKind::Light, DeviceKind::Fan, DeviceKind::Scene, DeviceKind::Remote]
        );
        assert_eq!(devices[0].keys(), vec![DeviceKey::new(2, 1)]);
        assert_eq!(devices[2].id(), 1);
        assert!(devices[2].keys().is_empty());
        assert_eq!(
            devices[3].keys(),
            vec![DeviceKey::new(10, 2), DeviceKey::new(10, 4)]
        );
        assert_eq!(devices[0].refresh().unwrap().to_wire_string(), "?OUTPUT,2,1");
        assert!(devices[3].refresh().is_none());
    }

    #[test]
    fn test_state_reports() {
        let mut devices: Vec<Device> = catalog().entries().iter().map(Device::from_entry).collect();
        assert!(devices[0].update(&decode("~OUTPUT,2,1,12.5").unwrap()));
        assert_eq!(
            serde_json::to_value(devices[0].state()).unwrap(),
            serde_json::json!({"on": true, "level": 12.5})
        );
        assert!(devices[1].update(&decode("~OUTPUT,3,1,25").unwrap()));
        assert_eq!(
            serde_json::to_value(devices[1].state()).unwrap(),
            serde_json::json!({"on": true, "speed": "low"})
        );
    }

    #[test]
    fn test_requests() {
        let devices: Vec<Device> = catalog().entries().iter().map(Device::from_entry).collect();
        let scene = devices[2].command(DeviceRequest::Activate).unwrap();
        assert_eq!(scene.to_wire_string(), "#DEVICE,1,5,3");
        assert!(matches!(
            devices[3].command(DeviceRequest::TurnOn { fade: None }),
            Err(LutronError::InvalidCommand { .. })
        ));
        let fan = devices[1].command(DeviceRequest::SetSpeed(FanSpeed::High)).unwrap();
        assert_eq!(fan.to_wire_string(), "#OUTPUT,3,1,100");
    }
}
