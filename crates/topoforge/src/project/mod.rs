//! Project files
//!
//! A project is saved as pretty-printed JSON in the versioned
//! [`ProjectDocument`] format. Loading accepts that format and the older flat
//! version 1 layout, which is converted on the fly. Reading and writing
//! files is left to the caller.

mod document;
mod legacy;

use tracing::info;

pub use document::{
    deserialize, serialize, ConfigRecord, ConnectionRecord, DeviceRecord, InterfaceRecord,
    PortRecord, PositionRecord, ProjectDocument, VolumeRecord, FORMAT_MARKER, SCHEMA_VERSION,
};
pub use legacy::{import as import_legacy, is_legacy, LegacyImport};

use crate::core::{Result, Topology, TopologyError};

/// Project-level fields that live outside the topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMeta {
    pub name: String,
    pub description: String,
}

impl Default for ProjectMeta {
    fn default() -> Self {
        Self::named("Untitled Project")
    }
}

impl ProjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A project read from text
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProject {
    pub topology: Topology,
    pub meta: ProjectMeta,
    /// Adjustments made while importing an older file
    pub warnings: Vec<String>,
    /// True if the text was in the version 1 layout
    pub legacy: bool,
}

/// Render a project as pretty-printed JSON
pub fn to_json_string(topology: &Topology, meta: &ProjectMeta) -> Result<String> {
    let document = serialize(topology, meta);
    serde_json::to_string_pretty(&document)
        .map_err(|e| TopologyError::corrupt(format!("failed to encode project: {}", e)))
}

/// Parse project text in either supported layout
pub fn load_project(text: &str) -> Result<LoadedProject> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| TopologyError::corrupt(format!("malformed JSON: {}", e)))?;
    if !value.is_object() {
        return Err(TopologyError::corrupt("project root must be an object"));
    }

    match value.get("schema_version") {
        Some(version) if version.as_u64() == Some(u64::from(SCHEMA_VERSION)) => {
            let document: ProjectDocument = serde_json::from_value(value)
                .map_err(|e| TopologyError::corrupt(e.to_string()))?;
            let (topology, meta) = deserialize(&document)?;
            info!(devices = topology.device_count(), "Project loaded");
            Ok(LoadedProject {
                topology,
                meta,
                warnings: Vec::new(),
                legacy: false,
            })
        }
        Some(version) if version.as_u64() == Some(1) => from_legacy(value),
        Some(version) => Err(TopologyError::unsupported(version.to_string())),
        None if is_legacy(&value) => from_legacy(value),
        None => Err(TopologyError::corrupt("missing schema_version")),
    }
}

fn from_legacy(value: serde_json::Value) -> Result<LoadedProject> {
    let imported = legacy::import(value)?;
    info!(
        devices = imported.topology.device_count(),
        warnings = imported.warnings.len(),
        "Imported version 1 project"
    );
    Ok(LoadedProject {
        topology: imported.topology,
        meta: imported.meta,
        warnings: imported.warnings,
        legacy: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeviceKind, ErrorTag, Position, TopologyStore};

    fn sample() -> Topology {
        let mut store = TopologyStore::new();
        let a = store
            .add_device_from_template(DeviceKind::Computer, "a", Position::new(1.0, 2.0))
            .unwrap();
        let b = store
            .add_device_from_template(DeviceKind::Router, "r", Position::new(3.0, 4.0))
            .unwrap();
        store.add_connection(a, b, None).unwrap();
        store.topology().clone()
    }

    #[test]
    fn test_text_round_trip() {
        let topology = sample();
        let meta = ProjectMeta::named("lab").with_description("bench");
        let text = to_json_string(&topology, &meta).unwrap();
        let loaded = load_project(&text).unwrap();
        assert_eq!(loaded.topology, topology);
        assert_eq!(loaded.meta, meta);
        assert!(!loaded.legacy);
        assert!(loaded.warnings.is_empty());

        // saving again yields the same bytes
        assert_eq!(to_json_string(&loaded.topology, &loaded.meta).unwrap(), text);
    }

    #[test]
    fn test_empty_project_round_trip() {
        let text = to_json_string(&Topology::new(), &ProjectMeta::default()).unwrap();
        let loaded = load_project(&text).unwrap();
        assert!(loaded.topology.is_empty());
        assert_eq!(loaded.meta.name, "Untitled Project");
    }

    #[test]
    fn test_load_errors() {
        let tag = |text: &str| load_project(text).unwrap_err().tag();
        assert_eq!(tag("{not json"), ErrorTag::CorruptProject);
        assert_eq!(tag("[]"), ErrorTag::CorruptProject);
        assert_eq!(tag(r#"{"name": "x"}"#), ErrorTag::CorruptProject);
        assert_eq!(tag(r#"{"schema_version": 7}"#), ErrorTag::UnsupportedVersion);
        assert_eq!(
            tag(r#"{"format": "topoforge-project", "schema_version": 2, "name": "x", "extra": 1}"#),
            ErrorTag::CorruptProject
        );
    }

    #[test]
    fn test_legacy_text_is_flagged() {
        let text = r#"{"name": "old", "version": "1.0.0", "devices": {}, "connections": {}}"#;
        let loaded = load_project(text).unwrap();
        assert!(loaded.legacy);
        assert_eq!(loaded.meta.name, "old");
    }
}
