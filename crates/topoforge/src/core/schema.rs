//! Per-kind defaults and export mapping
//!
//! Device kinds differ only in data, never in behaviour: this table says
//! which kinds become containers and what a freshly placed device looks like.

use super::{CpuLimit, DeviceConfig, DeviceKind, InterfaceSpec, MemorySize, RestartPolicy};

/// Static description of a device kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindSchema {
    pub kind: DeviceKind,
    /// Rendered as a container unless the device says otherwise
    pub service_by_default: bool,
    pub default_cpus: Option<f64>,
    pub default_memory: Option<MemorySize>,
    pub default_restart: RestartPolicy,
    /// Name of the interface created with the device, if any
    pub default_interface: Option<&'static str>,
    /// One-line description shown in palettes and `topoforge kinds`
    pub summary: &'static str,
}

static SCHEMAS: [KindSchema; 6] = [
    KindSchema {
        kind: DeviceKind::Computer,
        service_by_default: true,
        default_cpus: Some(1.0),
        default_memory: Some(MemorySize::mebibytes(512)),
        default_restart: RestartPolicy::UnlessStopped,
        default_interface: Some("eth0"),
        summary: "General purpose container",
    },
    KindSchema {
        kind: DeviceKind::Router,
        service_by_default: false,
        default_cpus: None,
        default_memory: None,
        default_restart: RestartPolicy::UnlessStopped,
        default_interface: None,
        summary: "Routes between networks",
    },
    KindSchema {
        kind: DeviceKind::Switch,
        service_by_default: false,
        default_cpus: None,
        default_memory: None,
        default_restart: RestartPolicy::UnlessStopped,
        default_interface: None,
        summary: "Joins devices on one network",
    },
    KindSchema {
        kind: DeviceKind::Firewall,
        service_by_default: false,
        default_cpus: None,
        default_memory: None,
        default_restart: RestartPolicy::UnlessStopped,
        default_interface: None,
        summary: "Filters traffic between networks",
    },
    KindSchema {
        kind: DeviceKind::Database,
        service_by_default: true,
        default_cpus: Some(1.0),
        default_memory: Some(MemorySize::gibibytes(1)),
        default_restart: RestartPolicy::UnlessStopped,
        default_interface: Some("eth0"),
        summary: "Database server container",
    },
    KindSchema {
        kind: DeviceKind::LoadBalancer,
        service_by_default: false,
        default_cpus: Some(0.5),
        default_memory: Some(MemorySize::mebibytes(256)),
        default_restart: RestartPolicy::UnlessStopped,
        default_interface: None,
        summary: "Spreads traffic across services",
    },
];

/// Schema entry for `kind`
pub fn kind_schema(kind: DeviceKind) -> &'static KindSchema {
    match kind {
        DeviceKind::Computer => &SCHEMAS[0],
        DeviceKind::Router => &SCHEMAS[1],
        DeviceKind::Switch => &SCHEMAS[2],
        DeviceKind::Firewall => &SCHEMAS[3],
        DeviceKind::Database => &SCHEMAS[4],
        DeviceKind::LoadBalancer => &SCHEMAS[5],
    }
}

/// All schema entries, in palette order
pub fn kind_schemas() -> &'static [KindSchema] {
    &SCHEMAS
}

impl KindSchema {
    /// Configuration of a freshly placed device
    pub fn template_config(&self) -> DeviceConfig {
        DeviceConfig {
            cpus: self.default_cpus.and_then(CpuLimit::new),
            memory: self.default_memory,
            restart: self.default_restart,
            ..Default::default()
        }
    }

    /// Interfaces of a freshly placed device
    pub fn template_interfaces(&self) -> Vec<InterfaceSpec> {
        self.default_interface
            .map(|name| vec![InterfaceSpec::new(name).primary()])
            .unwrap_or_default()
    }
}
