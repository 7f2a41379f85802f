//! Export diagnostics
//!
//! Issues stop an export; warnings ride along with the artifacts.

use std::fmt;

use crate::core::{DeviceId, Protocol};

/// A problem that prevents artifacts from being produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportIssue {
    /// A device that renders as a service has no image
    MissingImage { device: DeviceId, name: String },
    /// Two services publish the same host port
    HostPortConflict {
        device: DeviceId,
        name: String,
        port: u16,
        protocol: Protocol,
        other: String,
    },
    /// A command or entrypoint cannot be split into arguments
    UnsplittableCommand {
        device: DeviceId,
        name: String,
        field: &'static str,
        value: String,
    },
    /// A renderer failed to encode its output
    Encoding { artifact: &'static str, message: String },
}

impl ExportIssue {
    /// The offending device, if the issue is tied to one
    pub fn device(&self) -> Option<DeviceId> {
        match self {
            ExportIssue::MissingImage { device, .. }
            | ExportIssue::HostPortConflict { device, .. }
            | ExportIssue::UnsplittableCommand { device, .. } => Some(*device),
            ExportIssue::Encoding { .. } => None,
        }
    }
}

impl fmt::Display for ExportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportIssue::MissingImage { device, name } => {
                write!(f, "device '{}' ({}) has no image", name, device)
            }
            ExportIssue::HostPortConflict {
                device,
                name,
                port,
                protocol,
                other,
            } => write!(
                f,
                "device '{}' ({}) publishes host port {}/{} already used by '{}'",
                name, device, port, protocol, other
            ),
            ExportIssue::UnsplittableCommand {
                device,
                name,
                field,
                value,
            } => write!(
                f,
                "device '{}' ({}) has a {} with unbalanced quotes or escapes: {}",
                name, device, field, value
            ),
            ExportIssue::Encoding { artifact, message } => {
                write!(f, "could not encode {}: {}", artifact, message)
            }
        }
    }
}

/// A non-fatal observation about the export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportWarning {
    /// Two devices slug to the same resource name; the later one was renamed
    DuplicateResourceName {
        device: DeviceId,
        name: String,
        resolved: String,
    },
    /// A service is not attached to any network
    Isolated { device: DeviceId, name: String },
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportWarning::DuplicateResourceName { name, resolved, .. } => write!(
                f,
                "resource name of '{}' collides with another device, using '{}'",
                name, resolved
            ),
            ExportWarning::Isolated { name, .. } => {
                write!(f, "service '{}' is not connected to any network", name)
            }
        }
    }
}

/// Every issue found while planning an export
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportReport {
    pub issues: Vec<ExportIssue>,
}

impl ExportReport {
    pub fn new(issues: Vec<ExportIssue>) -> Self {
        Self { issues }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Devices named by at least one issue, in issue order without repeats
    pub fn offending_devices(&self) -> Vec<DeviceId> {
        let mut devices = Vec::new();
        for device in self.issues.iter().filter_map(ExportIssue::device) {
            if !devices.contains(&device) {
                devices.push(device);
            }
        }
        devices
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}
