//! Device configuration value types
//!
//! Everything a device can carry that ends up in a generated artifact:
//! resource limits, ports, volumes, environment, image and so on. Values are
//! checked by [`DeviceConfig::violations`], which reports every problem at
//! once instead of stopping at the first.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use super::shorthand::{self, ShorthandError};
use super::{MountMode, Protocol, RestartPolicy};

/// CPU limit in cores. Positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CpuLimit(f64);

impl CpuLimit {
    /// Smallest limit a device may carry
    pub const MIN_CORES: f64 = 0.01;
    /// Largest limit a device may carry
    pub const MAX_CORES: f64 = 1024.0;

    /// Create a limit, rejecting zero, negative and non-finite values
    pub fn new(cores: f64) -> Option<Self> {
        if cores.is_finite() && cores > 0.0 {
            Some(Self(cores))
        } else {
            None
        }
    }

    pub fn cores(&self) -> f64 {
        self.0
    }

    /// Returns true if the limit lies within `MIN_CORES..=MAX_CORES`
    pub fn is_in_range(&self) -> bool {
        (Self::MIN_CORES..=Self::MAX_CORES).contains(&self.0)
    }

    /// Relative CPU weight as understood by Docker (1 core = 1024 shares)
    pub fn shares(&self) -> u64 {
        (self.0 * 1024.0).round().max(1.0) as u64
    }
}

impl fmt::Display for CpuLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `{:?}` keeps the trailing `.0` so `1` renders as `1.0`
        write!(f, "{:?}", self.0)
    }
}

/// Unit suffix of a [`MemorySize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryUnit {
    Bytes,
    Kibibytes,
    Mebibytes,
    Gibibytes,
}

impl MemoryUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            MemoryUnit::Bytes => "b",
            MemoryUnit::Kibibytes => "k",
            MemoryUnit::Mebibytes => "m",
            MemoryUnit::Gibibytes => "g",
        }
    }

    pub fn multiplier(&self) -> u64 {
        match self {
            MemoryUnit::Bytes => 1,
            MemoryUnit::Kibibytes => 1 << 10,
            MemoryUnit::Mebibytes => 1 << 20,
            MemoryUnit::Gibibytes => 1 << 30,
        }
    }
}

/// Memory limit written as `<integer><unit>`, e.g. `512m`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemorySize {
    value: u64,
    unit: MemoryUnit,
}

impl MemorySize {
    pub const fn new(value: u64, unit: MemoryUnit) -> Self {
        Self { value, unit }
    }

    pub const fn mebibytes(value: u64) -> Self {
        Self::new(value, MemoryUnit::Mebibytes)
    }

    pub const fn gibibytes(value: u64) -> Self {
        Self::new(value, MemoryUnit::Gibibytes)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn unit(&self) -> MemoryUnit {
        self.unit
    }

    /// Size in bytes, saturating on overflow
    pub fn bytes(&self) -> u64 {
        self.value.saturating_mul(self.unit.multiplier())
    }

    /// Size in MiB, rounded up
    pub fn mebibytes_ceil(&self) -> u64 {
        self.bytes().div_ceil(MemoryUnit::Mebibytes.multiplier())
    }

    /// Compose form, which uses upper-case unit letters (`512M`)
    pub fn compose_value(&self) -> String {
        format!("{}{}", self.value, self.unit.suffix().to_ascii_uppercase())
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for MemorySize {
    type Err = ShorthandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        shorthand::parse_memory_size(s)
    }
}

/// A published port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortMapping {
    pub external: u16,
    pub internal: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn new(external: u16, internal: u16, protocol: Protocol) -> Self {
        Self {
            external,
            internal,
            protocol,
        }
    }

    pub fn tcp(external: u16, internal: u16) -> Self {
        Self::new(external, internal, Protocol::Tcp)
    }

    pub fn udp(external: u16, internal: u16) -> Self {
        Self::new(external, internal, Protocol::Udp)
    }
}

impl fmt::Display for PortMapping {
    /// `ext:int` for TCP, `ext:int/udp` otherwise
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.external, self.internal)?;
        if self.protocol != Protocol::Tcp {
            write!(f, "/{}", self.protocol)?;
        }
        Ok(())
    }
}

impl FromStr for PortMapping {
    type Err = ShorthandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        shorthand::parse_port_mapping(s)
    }
}

/// A host path (or named volume) mounted into the container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeMount {
    pub host: String,
    pub container: String,
    pub mode: MountMode,
}

impl VolumeMount {
    pub fn new(host: impl Into<String>, container: impl Into<String>, mode: MountMode) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode,
        }
    }

    /// A named volume is managed by Docker rather than bind-mounted
    pub fn is_named(&self) -> bool {
        !(self.host.starts_with('/') || self.host.starts_with('.') || self.host.starts_with('~'))
    }
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)?;
        if self.mode.is_read_only() {
            write!(f, ":ro")?;
        }
        Ok(())
    }
}

impl FromStr for VolumeMount {
    type Err = ShorthandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        shorthand::parse_volume_mount(s)
    }
}

/// IP address of an interface with an optional prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceAddress {
    ip: IpAddr,
    prefix: Option<u8>,
}

impl InterfaceAddress {
    pub fn new(ip: IpAddr, prefix: Option<u8>) -> Option<Self> {
        let max = match ip {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        match prefix {
            Some(p) if p > max => None,
            _ => Some(Self { ip, prefix }),
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }

    pub fn is_ipv4(&self) -> bool {
        self.ip.is_ipv4()
    }
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}/{}", self.ip, prefix),
            None => write!(f, "{}", self.ip),
        }
    }
}

impl FromStr for InterfaceAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => {
                let prefix = prefix
                    .parse::<u8>()
                    .map_err(|_| format!("Invalid prefix length in '{}'", s))?;
                (addr, Some(prefix))
            }
            None => (s, None),
        };
        let ip = IpAddr::from_str(addr).map_err(|_| format!("Invalid IP address: {}", addr))?;
        Self::new(ip, prefix).ok_or_else(|| format!("Prefix length out of range in '{}'", s))
    }
}

/// Configuration embedded in every device
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceConfig {
    pub cpus: Option<CpuLimit>,
    pub memory: Option<MemorySize>,
    pub restart: RestartPolicy,
    pub environment: BTreeMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMount>,
    pub image: Option<String>,
    pub command: Option<String>,
    pub entrypoint: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
    pub privileged: bool,
    /// Explicit override of whether the device renders as a service
    pub service: Option<bool>,
}

impl DeviceConfig {
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_port(mut self, port: PortMapping) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_volume(mut self, volume: VolumeMount) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_service(mut self, service: bool) -> Self {
        self.service = Some(service);
        self
    }

    /// Every rule this configuration breaks, in field order
    pub fn violations(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        if let Some(memory) = &self.memory {
            if memory.value() == 0 {
                reasons.push("memory limit must be greater than zero".to_string());
            }
        }
        if let Some(cpus) = &self.cpus {
            if !cpus.is_in_range() {
                reasons.push(format!(
                    "cpu limit {} must be between {} and {} cores",
                    cpus,
                    CpuLimit::MIN_CORES,
                    CpuLimit::MAX_CORES
                ));
            }
        }

        for key in self.environment.keys() {
            if let Some(reason) = key_violation(key) {
                reasons.push(format!("environment key '{}': {}", key, reason));
            }
        }

        let mut published = BTreeSet::new();
        for port in &self.ports {
            if port.external == 0 || port.internal == 0 {
                reasons.push(format!("port mapping {}: ports must be in 1-65535", port));
            }
            if !published.insert((port.external, port.protocol)) {
                reasons.push(format!(
                    "host port {}/{} is published twice",
                    port.external, port.protocol
                ));
            }
        }

        for volume in &self.volumes {
            if volume.host.trim().is_empty() {
                reasons.push(format!("volume {}: host path is empty", volume));
            }
            if !volume.container.starts_with('/') {
                reasons.push(format!(
                    "volume {}: container path must be absolute",
                    volume
                ));
            }
        }

        if let Some(image) = &self.image {
            if image.is_empty() || image.chars().any(char::is_whitespace) {
                reasons.push(format!("image '{}' must be non-empty without whitespace", image));
            }
        }
        if matches!(&self.command, Some(c) if c.trim().is_empty()) {
            reasons.push("command is empty".to_string());
        }
        if matches!(&self.entrypoint, Some(e) if e.trim().is_empty()) {
            reasons.push("entrypoint is empty".to_string());
        }

        for key in self.labels.keys() {
            if let Some(reason) = key_violation(key) {
                reasons.push(format!("label key '{}': {}", key, reason));
            }
        }

        let mut seen = BTreeSet::new();
        for cap in &self.capabilities {
            let well_formed = !cap.is_empty()
                && cap
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
            if !well_formed {
                reasons.push(format!(
                    "capability '{}' must be an upper-case identifier",
                    cap
                ));
            }
            if !seen.insert(cap.as_str()) {
                reasons.push(format!("capability '{}' is listed twice", cap));
            }
        }

        reasons
    }
}

/// Reason an environment or label key is rejected, if any
pub(crate) fn key_violation(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        Some("key is empty")
    } else if key.contains('=') {
        Some("key contains '='")
    } else if key.chars().any(char::is_whitespace) {
        Some("key contains whitespace")
    } else {
        None
    }
}
