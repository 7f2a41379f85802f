//! Canonical project document
//!
//! Records mirror the model one to one. Enum values are stored as their
//! tokens and converted by hand so an unknown token can be reported as a
//! version problem rather than a generic parse failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::{
    Connection, ConnectionId, CpuLimit, Device, DeviceConfig, DeviceId, DeviceKind,
    InterfaceAddress, InterfaceId, InterfaceSpec, MemorySize, MountMode, PortMapping, Position,
    Protocol, RestartPolicy, Result, Topology, TopologyError, VolumeMount,
};

use super::ProjectMeta;

/// Value of the `format` key
pub const FORMAT_MARKER: &str = "topoforge-project";

/// Schema version written by this build
pub const SCHEMA_VERSION: u32 = 2;

/// Top-level project file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDocument {
    pub format: String,
    pub schema_version: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceRecord>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceRecord {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub position: PositionRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceRecord>,
    #[serde(default)]
    pub config: ConfigRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionRecord {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortRecord {
    pub external: u16,
    pub internal: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeRecord {
    pub host: String,
    pub container: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub privileged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionRecord {
    pub id: String,
    pub source: String,
    pub target: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Unknown enum tokens mean the file came from a newer build
fn token<T: std::str::FromStr>(what: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| TopologyError::unsupported(format!("unknown {} '{}'", what, raw)))
}

fn parse_id<T: std::str::FromStr>(what: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| TopologyError::corrupt(format!("malformed {} id '{}'", what, raw)))
}

// model -> records

fn config_record(config: &DeviceConfig) -> ConfigRecord {
    ConfigRecord {
        cpus: config.cpus.map(|c| c.cores()),
        memory: config.memory.map(|m| m.to_string()),
        restart: Some(config.restart.token().to_string()),
        environment: config.environment.clone(),
        ports: config
            .ports
            .iter()
            .map(|p| PortRecord {
                external: p.external,
                internal: p.internal,
                protocol: p.protocol.token().to_string(),
            })
            .collect(),
        volumes: config
            .volumes
            .iter()
            .map(|v| VolumeRecord {
                host: v.host.clone(),
                container: v.container.clone(),
                mode: v.mode.token().to_string(),
            })
            .collect(),
        image: config.image.clone(),
        command: config.command.clone(),
        entrypoint: config.entrypoint.clone(),
        labels: config.labels.clone(),
        capabilities: config.capabilities.clone(),
        privileged: config.privileged,
        service: config.service,
    }
}

fn device_record(device: &Device) -> DeviceRecord {
    DeviceRecord {
        id: device.id.to_string(),
        kind: device.kind.token().to_string(),
        name: device.name.clone(),
        position: PositionRecord {
            x: device.position.x,
            y: device.position.y,
        },
        interfaces: device
            .interfaces
            .iter()
            .map(|iface| InterfaceRecord {
                id: iface.id.to_string(),
                name: iface.name.clone(),
                address: iface.address.map(|a| a.to_string()),
                network: iface.network.clone(),
                primary: iface.primary,
            })
            .collect(),
        config: config_record(&device.config),
    }
}

fn connection_record(conn: &Connection) -> ConnectionRecord {
    ConnectionRecord {
        id: conn.id.to_string(),
        source: conn.source.to_string(),
        target: conn.target.to_string(),
        network: conn.network.clone(),
        bandwidth: conn.bandwidth.clone(),
        latency: conn.latency.clone(),
    }
}

/// Convert a topology into its document form
pub fn serialize(topology: &Topology, meta: &ProjectMeta) -> ProjectDocument {
    ProjectDocument {
        format: FORMAT_MARKER.to_string(),
        schema_version: SCHEMA_VERSION,
        name: meta.name.clone(),
        description: meta.description.clone(),
        devices: topology
            .devices()
            .map(|d| (d.id.to_string(), device_record(d)))
            .collect(),
        connections: topology
            .connections()
            .map(|c| (c.id.to_string(), connection_record(c)))
            .collect(),
    }
}

// records -> model

fn config_from_record(record: &ConfigRecord) -> Result<DeviceConfig> {
    let cpus = match record.cpus {
        Some(cores) => Some(CpuLimit::new(cores).ok_or_else(|| {
            TopologyError::corrupt(format!("cpu limit {} is not positive", cores))
        })?),
        None => None,
    };
    let memory = match &record.memory {
        Some(raw) => Some(
            raw.parse::<MemorySize>()
                .map_err(|e| TopologyError::corrupt(e.to_string()))?,
        ),
        None => None,
    };
    let restart = match &record.restart {
        Some(raw) => token::<RestartPolicy>("restart policy", raw)?,
        None => RestartPolicy::default(),
    };

    let mut ports = Vec::with_capacity(record.ports.len());
    for port in &record.ports {
        ports.push(PortMapping::new(
            port.external,
            port.internal,
            token::<Protocol>("protocol", &port.protocol)?,
        ));
    }
    let mut volumes = Vec::with_capacity(record.volumes.len());
    for volume in &record.volumes {
        volumes.push(VolumeMount::new(
            volume.host.clone(),
            volume.container.clone(),
            token::<MountMode>("mount mode", &volume.mode)?,
        ));
    }

    Ok(DeviceConfig {
        cpus,
        memory,
        restart,
        environment: record.environment.clone(),
        ports,
        volumes,
        image: record.image.clone(),
        command: record.command.clone(),
        entrypoint: record.entrypoint.clone(),
        labels: record.labels.clone(),
        capabilities: record.capabilities.clone(),
        privileged: record.privileged,
        service: record.service,
    })
}

fn interface_from_record(record: &InterfaceRecord) -> Result<InterfaceSpec> {
    let address = match &record.address {
        Some(raw) => Some(raw.parse::<InterfaceAddress>().map_err(TopologyError::corrupt)?),
        None => None,
    };
    Ok(InterfaceSpec {
        id: parse_id::<InterfaceId>("interface", &record.id)?,
        name: record.name.clone(),
        address,
        network: record.network.clone(),
        primary: record.primary,
    })
}

fn device_from_record(key: &str, record: &DeviceRecord) -> Result<Device> {
    if key != record.id {
        return Err(TopologyError::corrupt(format!(
            "device record key '{}' does not match its id '{}'",
            key, record.id
        )));
    }

    let interfaces = record
        .interfaces
        .iter()
        .map(interface_from_record)
        .collect::<Result<Vec<_>>>()?;

    Ok(Device {
        id: parse_id::<DeviceId>("device", &record.id)?,
        kind: token::<DeviceKind>("device kind", &record.kind)?,
        name: record.name.clone(),
        position: Position::new(record.position.x, record.position.y),
        interfaces,
        config: config_from_record(&record.config)?,
    })
}

fn connection_from_record(key: &str, record: &ConnectionRecord) -> Result<Connection> {
    if key != record.id {
        return Err(TopologyError::corrupt(format!(
            "connection record key '{}' does not match its id '{}'",
            key, record.id
        )));
    }
    Ok(Connection {
        id: parse_id::<ConnectionId>("connection", &record.id)?,
        source: parse_id::<DeviceId>("device", &record.source)?,
        target: parse_id::<DeviceId>("device", &record.target)?,
        network: record.network.clone(),
        bandwidth: record.bandwidth.clone(),
        latency: record.latency.clone(),
    })
}

/// Rebuild a topology from a document, re-checking every invariant
pub fn deserialize(document: &ProjectDocument) -> Result<(Topology, ProjectMeta)> {
    if document.format != FORMAT_MARKER {
        return Err(TopologyError::corrupt(format!(
            "not a topoforge project (format '{}')",
            document.format
        )));
    }
    if document.schema_version != SCHEMA_VERSION {
        return Err(TopologyError::unsupported(document.schema_version.to_string()));
    }

    let devices = document
        .devices
        .iter()
        .map(|(key, record)| device_from_record(key, record))
        .collect::<Result<Vec<_>>>()?;
    let connections = document
        .connections
        .iter()
        .map(|(key, record)| connection_from_record(key, record))
        .collect::<Result<Vec<_>>>()?;
    trace!(
        devices = devices.len(),
        connections = connections.len(),
        "Records converted"
    );

    let topology = Topology::from_parts(devices, connections).map_err(TopologyError::into_corrupt)?;
    let meta = ProjectMeta {
        name: document.name.clone(),
        description: document.description.clone(),
    };
    Ok((topology, meta))
}
