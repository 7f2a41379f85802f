//! Core type definitions for the topology model
//!
//! Closed enumerations (device kinds, restart policies, port protocols,
//! mount modes) and the canvas position. Every enumeration has a stable
//! string token used by the project format; tokens never change meaning.

use std::fmt;
use std::str::FromStr;

/// The kind of a device on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceKind {
    Computer,
    Router,
    Switch,
    Firewall,
    Database,
    LoadBalancer,
}

impl DeviceKind {
    /// Every kind, in palette order
    pub const ALL: [DeviceKind; 6] = [
        DeviceKind::Computer,
        DeviceKind::Router,
        DeviceKind::Switch,
        DeviceKind::Firewall,
        DeviceKind::Database,
        DeviceKind::LoadBalancer,
    ];

    /// Stable token used in project files
    pub fn token(&self) -> &'static str {
        match self {
            DeviceKind::Computer => "computer",
            DeviceKind::Router => "router",
            DeviceKind::Switch => "switch",
            DeviceKind::Firewall => "firewall",
            DeviceKind::Database => "database",
            DeviceKind::LoadBalancer => "loadbalancer",
        }
    }

    /// Returns true for kinds that only shape the network by default
    pub fn is_network_gear(&self) -> bool {
        matches!(
            self,
            DeviceKind::Router | DeviceKind::Switch | DeviceKind::Firewall
        )
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.token() == s)
            .ok_or_else(|| format!("Unknown device kind: {}", s))
    }
}

/// Container restart policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RestartPolicy {
    Never,
    OnFailure,
    #[default]
    UnlessStopped,
    Always,
}

impl RestartPolicy {
    pub const ALL: [RestartPolicy; 4] = [
        RestartPolicy::Never,
        RestartPolicy::OnFailure,
        RestartPolicy::UnlessStopped,
        RestartPolicy::Always,
    ];

    /// Stable token used in project files
    pub fn token(&self) -> &'static str {
        match self {
            RestartPolicy::Never => "never",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::UnlessStopped => "unless-stopped",
            RestartPolicy::Always => "always",
        }
    }

    /// Value understood by Docker (`no` instead of `never`)
    pub fn docker_value(&self) -> &'static str {
        match self {
            RestartPolicy::Never => "no",
            other => other.token(),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RestartPolicy::ALL
            .iter()
            .copied()
            .find(|policy| policy.token() == s)
            .ok_or_else(|| format!("Unknown restart policy: {}", s))
    }
}

/// Transport protocol of a published port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn token(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(format!("Unknown protocol: {}", s)),
        }
    }
}

/// Access mode of a volume mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MountMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl MountMode {
    pub fn token(&self) -> &'static str {
        match self {
            MountMode::ReadWrite => "rw",
            MountMode::ReadOnly => "ro",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, MountMode::ReadOnly)
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for MountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rw" => Ok(MountMode::ReadWrite),
            "ro" => Ok(MountMode::ReadOnly),
            _ => Err(format!("Unknown mount mode: {}", s)),
        }
    }
}

/// Canvas position of a device. A presentation hint only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Snap to the nearest multiple of `grid`
    pub fn snapped(&self, grid: f64) -> Self {
        if grid <= 0.0 {
            return *self;
        }
        Self {
            x: (self.x / grid).round() * grid,
            y: (self.y / grid).round() * grid,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
