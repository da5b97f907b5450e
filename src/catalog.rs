// MIT License - Copyright (c) 2026 Peter Wright

//! Device catalog built from the bridge's JSON integration report.
//!
//! Zones become lights, devices with buttons become remotes, and the
//! bridge's own buttons (integration ID 1) become scenes unless they still
//! carry a default `Button N` name. Zones can be re-typed as switch, cover
//! or fan from configuration.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::BRIDGE_INTEGRATION_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Light,
    Switch,
    Cover,
    Fan,
    Scene,
    Remote,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Cover => "cover",
            Self::Fan => "fan",
            Self::Scene => "scene",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
    pub kind: DeviceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// Button number on the bridge, for scenes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<u32>,
    /// Button numbers, for remotes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Cannot read integration report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid integration report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct IntegrationReport {
    #[serde(rename = "LIPIdList")]
    lip_id_list: Option<LipIdList>,
}

#[derive(Deserialize)]
struct LipIdList {
    #[serde(rename = "Zones", default)]
    zones: Vec<ReportZone>,
    #[serde(rename = "Devices", default)]
    devices: Vec<ReportDevice>,
}

#[derive(Deserialize)]
struct ReportArea {
    #[serde(rename = "Name")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ReportZone {
    #[serde(rename = "ID")]
    id: u32,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Area")]
    area: Option<ReportArea>,
}

#[derive(Deserialize)]
struct ReportDevice {
    #[serde(rename = "ID")]
    id: u32,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Buttons")]
    buttons: Option<Vec<ReportButton>>,
    #[serde(rename = "Area")]
    area: Option<ReportArea>,
}

#[derive(Deserialize)]
struct ReportButton {
    #[serde(rename = "Number")]
    number: u32,
    #[serde(rename = "Name", default)]
    name: String,
}

fn area_name(area: Option<ReportArea>) -> Option<String> {
    area.and_then(|a| a.name)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let report: IntegrationReport = serde_json::from_str(json)?;
        let Some(list) = report.lip_id_list else {
            warn!("'LIPIdList' not found in the integration report; no devices loaded");
            return Ok(Self::default());
        };

        let mut entries = Vec::new();
        for zone in list.zones {
            entries.push(CatalogEntry {
                id: zone.id,
                name: zone.name,
                kind: DeviceKind::Light,
                area: area_name(zone.area),
                scene_id: None,
                buttons: Vec::new(),
            });
        }

        for device in list.devices {
            let Some(buttons) = device.buttons else {
                continue;
            };
            if device.id == BRIDGE_INTEGRATION_ID {
                for button in buttons {
                    if button.name.starts_with("Button ") {
                        continue;
                    }
                    info!("Found scene {}, {}", button.number, button.name);
                    entries.push(CatalogEntry {
                        id: device.id,
                        name: button.name,
                        kind: DeviceKind::Scene,
                        area: None,
                        scene_id: Some(button.number),
                        buttons: Vec::new(),
                    });
                }
            } else {
                entries.push(CatalogEntry {
                    id: device.id,
                    name: device.name,
                    kind: DeviceKind::Remote,
                    area: area_name(device.area),
                    scene_id: None,
                    buttons: buttons.into_iter().map(|b| b.number).collect(),
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The non-scene entry with this integration ID.
    pub fn device(&self, id: u32) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id && e.kind != DeviceKind::Scene)
    }

    pub fn scene(&self, scene_id: u32) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.kind == DeviceKind::Scene && e.scene_id == Some(scene_id))
    }

    /// Re-type zones listed in configuration. Unknown IDs are warned about
    /// and returned.
    pub fn retype(&mut self, kind: DeviceKind, ids: &[u32]) -> Vec<u32> {
        let mut missing = Vec::new();
        for &id in ids {
            match self
                .entries
                .iter_mut()
                .find(|e| e.id == id && e.kind != DeviceKind::Scene)
            {
                Some(entry) => entry.kind = kind,
                None => {
                    warn!(
                        "Integration ID {} for type {} not found in the integration report",
                        id, kind
                    );
                    missing.push(id);
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "LIPIdList": {
            "Zones": [
                {"ID": 2, "Name": "Kitchen Pendants", "Area": {"Name": "Kitchen"}},
                {"ID": 3, "Name": "Porch"},
                {"ID": 4, "Name": "Blinds", "Area": {"Name": "Living"}}
            ],
            "Devices": [
                {"ID": 1, "Name": "Smart Bridge", "Buttons": [
                    {"Number": 1, "Name": "Movie Night"},
                    {"Number": 2, "Name": "Button 2"}
                ]},
                {"ID": 10, "Name": "Pico", "Area": {"Name": "Living"}, "Buttons": [
                    {"Number": 2}, {"Number": 3}, {"Number": 4}, {"Number": 5}, {"Number": 6}
                ]},
                {"ID": 11, "Name": "Occupancy Sensor"}
            ]
        }
    }"#;

    #[test]
    fn test_parse_integration_report() {
        let catalog = Catalog::from_json(REPORT).unwrap();
        assert_eq!(catalog.len(), 5);

        let kitchen = catalog.device(2).unwrap();
        assert_eq!(kitchen.kind, DeviceKind::Light);
        assert_eq!(kitchen.area.as_deref(), Some("Kitchen"));
        assert_eq!(catalog.device(3).unwrap().area, None);

        let scene = catalog.scene(1).unwrap();
        assert_eq!(scene.name, "Movie Night");
        assert_eq!(scene.id, 1);
        assert!(catalog.scene(2).is_none());

        let pico = catalog.device(10).unwrap();
        assert_eq!(pico.kind, DeviceKind::Remote);
        assert_eq!(pico.buttons, vec![2, 3, 4, 5, 6]);
        assert!(catalog.device(11).is_none());
    }

    #[test]
    fn test_retype_zones() {
        let mut catalog = Catalog::from_json(REPORT).unwrap();
        let missing = catalog.retype(DeviceKind::Cover, &[4, 99]);
        assert_eq!(missing, vec![99]);
        assert_eq!(catalog.device(4).unwrap().kind, DeviceKind::Cover);
        // Scenes keep their kind.
        catalog.retype(DeviceKind::Switch, &[1]);
        assert_eq!(catalog.scene(1).unwrap().kind, DeviceKind::Scene);
    }

    #[test]
    fn test_missing_lip_id_list() {
        let catalog = Catalog::from_json(r#"{"Other": {}}"#).unwrap();
        assert!(catalog.is_empty());
        assert!(matches!(
            Catalog::from_json("not json"),
            Err(CatalogError::Json(_))
        ));
    }

    #[test]
    fn test_entry_serialization() {
        let catalog = Catalog::from_json(REPORT).unwrap();
        let json = serde_json::to_value(catalog.scene(1).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "name": "Movie Night", "kind": "scene", "scene_id": 1})
        );
    }
}
