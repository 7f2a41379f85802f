//! Import of flat version 1 project files
//!
//! Older files keep the device configuration as loose strings
//! (`"memory_limit": "512m"`, `"ports": ["8080:80"]`) and pick the image from
//! an OS list. They are read leniently: a value that cannot be understood is
//! dropped with a warning instead of failing the whole import. Structural
//! problems such as dangling connections still fail. These files are never
//! written.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::key_violation;
use crate::core::naming::is_valid_network_name;
use crate::core::shorthand::{parse_memory_size, parse_port_mapping, parse_volume_mount};
use crate::core::{
    kind_schema, Connection, ConnectionId, CpuLimit, Device, DeviceConfig, DeviceId, DeviceKind,
    InterfaceAddress, InterfaceId, InterfaceSpec, Position, RestartPolicy, Result, Topology,
    TopologyError,
};

use super::ProjectMeta;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LegacyProject {
    name: String,
    description: String,
    devices: BTreeMap<String, LegacyDevice>,
    connections: BTreeMap<String, LegacyConnection>,
}

impl Default for LegacyProject {
    fn default() -> Self {
        Self {
            name: "Untitled Project".to_string(),
            description: String::new(),
            devices: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyDevice {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    name: String,
    x: f64,
    y: f64,
    config: Option<LegacyConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LegacyConfig {
    cpu_limit: Option<f64>,
    memory_limit: String,
    storage_volume: String,
    os: String,
    custom_image: String,
    environment_vars: BTreeMap<String, String>,
    ports: Vec<String>,
    interfaces: Vec<LegacyInterface>,
    command: String,
    entrypoint: String,
    restart_policy: String,
    labels: BTreeMap<String, String>,
    capabilities: Vec<String>,
    privileged: bool,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            cpu_limit: Some(1.0),
            memory_limit: "512m".to_string(),
            storage_volume: String::new(),
            os: "alpine:latest".to_string(),
            custom_image: String::new(),
            environment_vars: BTreeMap::new(),
            ports: Vec::new(),
            interfaces: Vec::new(),
            command: String::new(),
            entrypoint: String::new(),
            restart_policy: "unless-stopped".to_string(),
            labels: BTreeMap::new(),
            capabilities: Vec::new(),
            privileged: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LegacyInterface {
    id: Option<String>,
    name: String,
    ip_address: String,
    cidr: Option<u8>,
    is_primary: bool,
}

impl Default for LegacyInterface {
    fn default() -> Self {
        Self {
            id: None,
            name: "eth0".to_string(),
            ip_address: String::new(),
            cidr: Some(24),
            is_primary: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyConnection {
    source_id: String,
    target_id: String,
    network_name: Option<String>,
    bandwidth: Option<String>,
    latency: Option<String>,
}

/// Result of importing a legacy file
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyImport {
    pub topology: Topology,
    pub meta: ProjectMeta,
    /// Values that were dropped or adjusted
    pub warnings: Vec<String>,
}

/// Returns true if `value` looks like a flat version 1 document
pub fn is_legacy(value: &serde_json::Value) -> bool {
    if let Some(version) = value.get("schema_version") {
        return version.as_u64() == Some(1);
    }
    let has_typed_device = value
        .get("devices")
        .and_then(|d| d.as_object())
        .map(|devices| devices.values().any(|d| d.get("type").is_some()))
        .unwrap_or(false);
    has_typed_device || value.get("version").map(|v| v.is_string()).unwrap_or(false)
}

struct Importer {
    warnings: Vec<String>,
}

impl Importer {
    fn warn(&mut self, message: String) {
        warn!(%message, "Legacy import");
        self.warnings.push(message);
    }

    fn config(&mut self, device: &str, kind: DeviceKind, legacy: Option<LegacyConfig>) -> DeviceConfig {
        let Some(legacy) = legacy else {
            return kind_schema(kind).template_config();
        };
        let mut config = DeviceConfig::default();

        config.cpus = match legacy.cpu_limit {
            Some(cores) => {
                let limit = CpuLimit::new(cores).filter(CpuLimit::is_in_range);
                if limit.is_none() {
                    self.warn(format!("{}: dropped cpu limit {}", device, cores));
                }
                limit
            }
            None => None,
        };

        if !legacy.memory_limit.trim().is_empty() {
            match parse_memory_size(&legacy.memory_limit) {
                Ok(memory) => config.memory = Some(memory),
                Err(e) => self.warn(format!("{}: dropped memory limit: {}", device, e)),
            }
        }

        config.restart = match legacy.restart_policy.as_str() {
            "" => RestartPolicy::default(),
            "no" => RestartPolicy::Never,
            other => other.parse().unwrap_or_else(|_| {
                self.warn(format!("{}: unknown restart policy '{}'", device, other));
                RestartPolicy::default()
            }),
        };

        let image = if legacy.os == "custom" {
            legacy.custom_image.trim().to_string()
        } else {
            legacy.os.trim().to_string()
        };
        config.image = (!image.is_empty()).then_some(image);

        let mut published = BTreeSet::new();
        for raw in &legacy.ports {
            match parse_port_mapping(raw) {
                Ok(port) if published.insert((port.external, port.protocol)) => {
                    config.ports.push(port)
                }
                Ok(port) => self.warn(format!("{}: dropped duplicate port {}", device, port)),
                Err(e) => self.warn(format!("{}: dropped port: {}", device, e)),
            }
        }

        if !legacy.storage_volume.trim().is_empty() {
            match parse_volume_mount(&legacy.storage_volume) {
                Ok(volume) => config.volumes.push(volume),
                Err(e) => self.warn(format!("{}: dropped volume: {}", device, e)),
            }
        }

        config.environment = self.keyed(device, "environment variable", legacy.environment_vars);
        config.labels = self.keyed(device, "label", legacy.labels);

        for cap in legacy.capabilities {
            let cap = cap.trim().to_ascii_uppercase();
            if cap.is_empty() || config.capabilities.contains(&cap) {
                continue;
            }
            config.capabilities.push(cap);
        }

        config.command = non_empty(legacy.command);
        config.entrypoint = non_empty(legacy.entrypoint);
        config.privileged = legacy.privileged;
        config
    }

    fn keyed(
        &mut self,
        device: &str,
        what: &str,
        entries: BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (key, value) in entries {
            match key_violation(&key) {
                None => {
                    out.insert(key, value);
                }
                Some(reason) => {
                    self.warn(format!("{}: dropped {} '{}': {}", device, what, key, reason))
                }
            }
        }
        out
    }

    fn interfaces(&mut self, device: &str, legacy: &[LegacyInterface]) -> Vec<InterfaceSpec> {
        let mut names = BTreeSet::new();
        let mut has_primary = false;
        let mut out = Vec::new();

        for iface in legacy {
            if !names.insert(iface.name.clone()) || iface.name.trim().is_empty() {
                self.warn(format!("{}: dropped interface '{}'", device, iface.name));
                continue;
            }
            let mut spec = InterfaceSpec::new(iface.name.clone());
            if let Some(id) = iface.id.as_deref().and_then(|s| Uuid::parse_str(s).ok()) {
                spec.id = InterfaceId::from_uuid(id);
            }
            if !iface.ip_address.trim().is_empty() {
                let raw = match iface.cidr {
                    Some(cidr) => format!("{}/{}", iface.ip_address.trim(), cidr),
                    None => iface.ip_address.trim().to_string(),
                };
                match raw.parse::<InterfaceAddress>() {
                    Ok(address) => spec.address = Some(address),
                    Err(e) => self.warn(format!("{}: {}", device, e)),
                }
            }
            spec.primary = iface.is_primary && !has_primary;
            has_primary |= spec.primary;
            out.push(spec);
        }
        out
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Keep a parseable legacy id, otherwise mint a new one
fn legacy_uuid(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Convert a flat version 1 document into the current model
pub fn import(value: serde_json::Value) -> Result<LegacyImport> {
    let project: LegacyProject = serde_json::from_value(value)
        .map_err(|e| TopologyError::corrupt(format!("legacy project: {}", e)))?;
    let mut importer = Importer {
        warnings: Vec::new(),
    };

    let mut ids: HashMap<String, DeviceId> = HashMap::new();
    let mut devices = Vec::with_capacity(project.devices.len());
    let mut counts: BTreeMap<DeviceKind, usize> = BTreeMap::new();

    for (key, legacy) in project.devices {
        let raw_kind = legacy.kind.as_deref().unwrap_or("computer");
        let kind: DeviceKind = raw_kind.parse().map_err(|_| {
            TopologyError::unsupported(format!("unknown device kind '{}'", raw_kind))
        })?;
        let count = counts.entry(kind).or_insert(0);
        *count += 1;

        let id = legacy_uuid(legacy.id.as_deref().unwrap_or(&key))
            .map(DeviceId::from_uuid)
            .unwrap_or_default();
        ids.insert(key.clone(), id);
        if let Some(own) = &legacy.id {
            ids.insert(own.clone(), id);
        }

        let name = if legacy.name.trim().is_empty() {
            let fallback = format!("{}_{}", kind.token(), count);
            importer.warn(format!("{}: unnamed device renamed to '{}'", key, fallback));
            fallback
        } else {
            legacy.name.clone()
        };

        let interfaces = match &legacy.config {
            Some(config) => importer.interfaces(&name, &config.interfaces),
            None => kind_schema(kind).template_interfaces(),
        };
        let config = importer.config(&name, kind, legacy.config);

        devices.push(Device {
            id,
            kind,
            name,
            position: Position::new(legacy.x, legacy.y),
            interfaces,
            config,
        });
    }

    let mut connections: Vec<Connection> = Vec::with_capacity(project.connections.len());
    for (key, legacy) in project.connections {
        let endpoint = |raw: &str| {
            ids.get(raw).copied().ok_or_else(|| {
                TopologyError::corrupt(format!(
                    "connection {} references missing device '{}'",
                    key, raw
                ))
            })
        };
        let source = endpoint(&legacy.source_id)?;
        let target = endpoint(&legacy.target_id)?;

        let network = legacy
            .network_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "default".to_string());
        if !is_valid_network_name(&network) {
            return Err(TopologyError::corrupt(format!(
                "connection {} has invalid network name '{}'",
                key, network
            )));
        }

        let mut conn = Connection::new(source, target, network);
        if let Some(uuid) = legacy_uuid(&key) {
            conn.id = ConnectionId::from_uuid(uuid);
        }
        conn.bandwidth = legacy.bandwidth;
        conn.latency = legacy.latency;

        if connections.iter().any(|existing| existing.duplicates(&conn)) {
            importer.warn(format!("connection {}: duplicate dropped", key));
            continue;
        }
        connections.push(conn);
    }

    let topology = Topology::from_parts(devices, connections)?;
    debug!(
        devices = topology.device_count(),
        connections = topology.connection_count(),
        warnings = importer.warnings.len(),
        "Legacy project imported"
    );

    Ok(LegacyImport {
        topology,
        meta: ProjectMeta {
            name: project.name,
            description: project.description,
        },
        warnings: importer.warnings,
    })
}
