//! Devices, their interfaces and partial updates

use std::collections::{BTreeMap, BTreeSet};

use super::naming::is_valid_network_name;
use super::{
    kind_schema, CpuLimit, DeviceConfig, DeviceId, DeviceKind, InterfaceAddress, InterfaceId,
    MemorySize, PortMapping, Position, RestartPolicy, VolumeMount,
};

/// A network interface owned by a device
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceSpec {
    pub id: InterfaceId,
    pub name: String,
    pub address: Option<InterfaceAddress>,
    /// Logical network this interface is attached to
    pub network: Option<String>,
    pub primary: bool,
}

impl InterfaceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: InterfaceId::new(),
            name: name.into(),
            address: None,
            network: None,
            primary: false,
        }
    }

    pub fn with_address(mut self, address: InterfaceAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn on_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// A node of the topology
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
    pub position: Position,
    pub interfaces: Vec<InterfaceSpec>,
    pub config: DeviceConfig,
}

impl Device {
    pub fn new(kind: DeviceKind, name: impl Into<String>, position: Position) -> Self {
        Self {
            id: DeviceId::new(),
            kind,
            name: name.into(),
            position,
            interfaces: Vec::new(),
            config: DeviceConfig::default(),
        }
    }

    /// Whether this device becomes a container in generated artifacts
    pub fn renders_service(&self) -> bool {
        self.config
            .service
            .unwrap_or_else(|| kind_schema(self.kind).service_by_default)
    }

    /// The flagged primary interface, or the first one
    pub fn primary_interface(&self) -> Option<&InterfaceSpec> {
        self.interfaces
            .iter()
            .find(|iface| iface.primary)
            .or_else(|| self.interfaces.first())
    }

    /// Interface attached to `network`, if any
    pub fn interface_on(&self, network: &str) -> Option<&InterfaceSpec> {
        self.interfaces
            .iter()
            .find(|iface| iface.network.as_deref() == Some(network))
    }

    /// Every rule this device breaks, including its configuration
    pub fn violations(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        if self.name.trim().is_empty() {
            reasons.push("device name is empty".to_string());
        }
        if !self.position.is_finite() {
            reasons.push(format!("position {} is not finite", self.position));
        }

        let mut names = BTreeSet::new();
        let mut ids = BTreeSet::new();
        let mut primaries = 0;
        for iface in &self.interfaces {
            if iface.name.trim().is_empty() {
                reasons.push("interface name is empty".to_string());
            } else if !names.insert(iface.name.as_str()) {
                reasons.push(format!("interface name '{}' is used twice", iface.name));
            }
            if !ids.insert(iface.id) {
                reasons.push(format!("interface id {} is used twice", iface.id));
            }
            if let Some(network) = &iface.network {
                if !is_valid_network_name(network) {
                    reasons.push(format!(
                        "interface '{}': invalid network name '{}'",
                        iface.name, network
                    ));
                }
            }
            if iface.primary {
                primaries += 1;
            }
        }
        if primaries > 1 {
            reasons.push("more than one primary interface".to_string());
        }

        reasons.extend(self.config.violations());
        reasons
    }
}

/// Partial replacement for a device. Unset fields are left alone.
///
/// Optional config fields use `Option<Option<T>>`: `Some(None)` clears the
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub interfaces: Option<Vec<InterfaceSpec>>,
    pub cpus: Option<Option<CpuLimit>>,
    pub memory: Option<Option<MemorySize>>,
    pub restart: Option<RestartPolicy>,
    pub environment: Option<BTreeMap<String, String>>,
    pub ports: Option<Vec<PortMapping>>,
    pub volumes: Option<Vec<VolumeMount>>,
    pub image: Option<Option<String>>,
    pub command: Option<Option<String>>,
    pub entrypoint: Option<Option<String>>,
    pub labels: Option<BTreeMap<String, String>>,
    pub capabilities: Option<Vec<String>>,
    pub privileged: Option<bool>,
    pub service: Option<Option<bool>>,
}

impl DeviceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn interfaces(mut self, interfaces: Vec<InterfaceSpec>) -> Self {
        self.interfaces = Some(interfaces);
        self
    }

    pub fn image(mut self, image: Option<&str>) -> Self {
        self.image = Some(image.map(str::to_string));
        self
    }

    pub fn command(mut self, command: Option<&str>) -> Self {
        self.command = Some(command.map(str::to_string));
        self
    }

    pub fn entrypoint(mut self, entrypoint: Option<&str>) -> Self {
        self.entrypoint = Some(entrypoint.map(str::to_string));
        self
    }

    pub fn ports(mut self, ports: Vec<PortMapping>) -> Self {
        self.ports = Some(ports);
        self
    }

    pub fn environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn memory(mut self, memory: Option<MemorySize>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn cpus(mut self, cpus: Option<CpuLimit>) -> Self {
        self.cpus = Some(cpus);
        self
    }

    pub fn restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = Some(restart);
        self
    }

    pub fn service(mut self, service: Option<bool>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into a copy of `device`
    pub fn merged(&self, device: &Device) -> Device {
        let mut out = device.clone();
        let config = &mut out.config;

        if let Some(name) = &self.name {
            out.name = name.clone();
        }
        if let Some(interfaces) = &self.interfaces {
            out.interfaces = interfaces.clone();
        }
        if let Some(cpus) = self.cpus {
            config.cpus = cpus;
        }
        if let Some(memory) = self.memory {
            config.memory = memory;
        }
        if let Some(restart) = self.restart {
            config.restart = restart;
        }
        if let Some(environment) = &self.environment {
            config.environment = environment.clone();
        }
        if let Some(ports) = &self.ports {
            config.ports = ports.clone();
        }
        if let Some(volumes) = &self.volumes {
            config.volumes = volumes.clone();
        }
        if let Some(image) = &self.image {
            config.image = image.clone();
        }
        if let Some(command) = &self.command {
            config.command = command.clone();
        }
        if let Some(entrypoint) = &self.entrypoint {
            config.entrypoint = entrypoint.clone();
        }
        if let Some(labels) = &self.labels {
            config.labels = labels.clone();
        }
        if let Some(capabilities) = &self.capabilities {
            config.capabilities = capabilities.clone();
        }
        if let Some(privileged) = self.privileged {
            config.privileged = privileged;
        }
        if let Some(service) = self.service {
            config.service = service;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn computer() -> Device {
        Device::new(DeviceKind::Computer, "web", Position::default())
    }

    #[test]
    fn test_renders_service_follows_kind_then_override() {
        let mut router = Device::new(DeviceKind::Router, "r1", Position::default());
        assert!(!router.renders_service());
        router.config.service = Some(true);
        assert!(router.renders_service());

        let mut web = computer();
        assert!(web.renders_service());
        web.config.service = Some(false);
        assert!(!web.renders_service());
    }

    #[test]
    fn test_primary_interface_defaults_to_first() {
        let mut device = computer();
        assert!(device.primary_interface().is_none());
        device.interfaces = vec![InterfaceSpec::new("eth0"), InterfaceSpec::new("eth1")];
        assert_eq!(device.primary_interface().unwrap().name, "eth0");
        device.interfaces[1].primary = true;
        assert_eq!(device.primary_interface().unwrap().name, "eth1");
    }

    #[test]
    fn test_interface_rules() {
        let mut device = computer();
        device.interfaces = vec![
            InterfaceSpec::new("eth0").primary(),
            InterfaceSpec::new("eth0").primary().on_network("bad name"),
        ];
        let reasons = device.violations();
        assert_eq!(reasons.len(), 3, "{:?}", reasons);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let device = Device::new(DeviceKind::Switch, "   ", Position::default());
        assert_eq!(device.violations(), vec!["device name is empty".to_string()]);
    }

    #[test]
    fn test_update_merges_only_set_fields() {
        let mut device = computer();
        device.config.image = Some("nginx".into());
        device.config.privileged = true;

        let update = DeviceUpdate::new()
            .name("frontend")
            .ports(vec![PortMapping::tcp(8080, 80)]);
        let merged = update.merged(&device);

        assert_eq!(merged.name, "frontend");
        assert_eq!(merged.config.ports, vec![PortMapping::tcp(8080, 80)]);
        assert_eq!(merged.config.image.as_deref(), Some("nginx"));
        assert!(merged.config.privileged);
        assert_eq!(merged.id, device.id);
    }

    #[test]
    fn test_update_can_clear_optional_fields() {
        let mut device = computer();
        device.config.image = Some("nginx".into());
        let merged = DeviceUpdate::new().image(None).merged(&device);
        assert!(merged.config.image.is_none());
        assert!(DeviceUpdate::new().is_empty());
        assert!(!DeviceUpdate::new().image(None).is_empty());
    }
}
