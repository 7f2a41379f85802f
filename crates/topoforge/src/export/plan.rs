//! Export planning
//!
//! Both renderers read the same [`ExportPlan`], so a service, network or
//! volume exists in the compose file exactly when it exists in the Terraform
//! file. Planning is also where every export issue is found.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace, warn};

use super::report::{ExportIssue, ExportReport, ExportWarning};
use super::ExportConfig;
use crate::core::naming::{slug_or, terraform_ident};
use crate::core::{
    Device, DeviceConfig, DeviceId, DeviceKind, InterfaceAddress, Protocol, Topology,
};

/// A service's membership in one network
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAttachment {
    pub network: String,
    /// Address of the interface attached to this network, if it has one
    pub address: Option<InterfaceAddress>,
}

/// One container to generate
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePlan {
    pub device: DeviceId,
    pub kind: DeviceKind,
    pub display_name: String,
    /// Compose service key and container name
    pub resource_name: String,
    /// Terraform resource label
    pub ident: String,
    pub image: String,
    /// Command split into arguments with shell quoting rules
    pub command: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub config: DeviceConfig,
    /// Sorted by network name, no repeats
    pub networks: Vec<NetworkAttachment>,
}

/// One logical network to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlan {
    pub name: String,
    pub ident: String,
}

/// One Docker-managed volume to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePlan {
    pub name: String,
    pub ident: String,
}

/// Everything the renderers need, resolved and validated
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub project_name: Option<String>,
    pub network_driver: String,
    pub services: Vec<ServicePlan>,
    pub networks: Vec<NetworkPlan>,
    pub volumes: Vec<VolumePlan>,
    pub warnings: Vec<ExportWarning>,
}

impl ExportPlan {
    /// Plan an export of `topology`.
    ///
    /// Fails with a report of every issue found; never stops at the first.
    pub fn build(
        topology: &Topology,
        config: &ExportConfig,
    ) -> std::result::Result<Self, ExportReport> {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        // Devices iterate in id order, which fixes the order of everything below
        let mut used_names = BTreeSet::new();
        let mut published: BTreeMap<(u16, Protocol), String> = BTreeMap::new();
        let mut services = Vec::new();

        for device in topology.devices().filter(|d| d.renders_service()) {
            let base = slug_or(&device.name, device.kind.token());
            let resource_name = if used_names.contains(&base) {
                let resolved = format!("{}-{}", base, device.id.short());
                warnings.push(ExportWarning::DuplicateResourceName {
                    device: device.id,
                    name: device.name.clone(),
                    resolved: resolved.clone(),
                });
                resolved
            } else {
                base
            };
            used_names.insert(resource_name.clone());

            let image = match &device.config.image {
                Some(image) => image.clone(),
                None => {
                    issues.push(ExportIssue::MissingImage {
                        device: device.id,
                        name: device.name.clone(),
                    });
                    String::new()
                }
            };

            let command = split_words(device, "command", &device.config.command, &mut issues);
            let entrypoint =
                split_words(device, "entrypoint", &device.config.entrypoint, &mut issues);

            for port in &device.config.ports {
                match published.get(&(port.external, port.protocol)) {
                    Some(other) => issues.push(ExportIssue::HostPortConflict {
                        device: device.id,
                        name: device.name.clone(),
                        port: port.external,
                        protocol: port.protocol,
                        other: other.clone(),
                    }),
                    None => {
                        published.insert((port.external, port.protocol), device.name.clone());
                    }
                }
            }

            let networks: BTreeSet<&str> = topology
                .connections_of(device.id)
                .into_iter()
                .map(|c| c.network.as_str())
                .collect();
            let networks: Vec<NetworkAttachment> = networks
                .into_iter()
                .map(|network| NetworkAttachment {
                    network: network.to_string(),
                    address: device.interface_on(network).and_then(|iface| iface.address),
                })
                .collect();

            if networks.is_empty() {
                warnings.push(ExportWarning::Isolated {
                    device: device.id,
                    name: device.name.clone(),
                });
            }

            trace!(
                device_id = %device.id,
                %resource_name,
                network_count = networks.len(),
                "Planned service"
            );
            services.push(ServicePlan {
                device: device.id,
                kind: device.kind,
                display_name: device.name.clone(),
                ident: String::new(),
                resource_name,
                image,
                command,
                entrypoint,
                config: device.config.clone(),
                networks,
            });
        }

        if !issues.is_empty() {
            debug!(issue_count = issues.len(), "Export plan rejected");
            return Err(ExportReport::new(issues));
        }

        let service_idents = unique_idents(services.iter().map(|s| s.resource_name.as_str()), "svc_");
        for (service, ident) in services.iter_mut().zip(service_idents) {
            service.ident = ident;
        }

        let network_names = topology.network_names();
        let network_idents = unique_idents(network_names.iter().map(String::as_str), "net_");
        let networks = network_names
            .into_iter()
            .zip(network_idents)
            .map(|(name, ident)| NetworkPlan { name, ident })
            .collect();

        let volume_names: BTreeSet<&str> = services
            .iter()
            .flat_map(|s| &s.config.volumes)
            .filter(|v| v.is_named())
            .map(|v| v.host.as_str())
            .collect();
        let volume_idents = unique_idents(volume_names.iter().copied(), "vol_");
        let volumes = volume_names
            .into_iter()
            .zip(volume_idents)
            .map(|(name, ident)| VolumePlan {
                name: name.to_string(),
                ident,
            })
            .collect();

        for warning in &warnings {
            warn!(%warning, "Export warning");
        }

        let plan = ExportPlan {
            project_name: config.project_name.clone(),
            network_driver: config.network_driver.clone(),
            services,
            networks,
            volumes,
            warnings,
        };
        debug!(
            service_count = plan.services.len(),
            network_count = plan.networks.len(),
            volume_count = plan.volumes.len(),
            "Export plan built"
        );
        Ok(plan)
    }

    /// Terraform label of a network by name
    pub fn network_ident(&self, name: &str) -> Option<&str> {
        self.networks
            .iter()
            .find(|n| n.name == name)
            .map(|n| n.ident.as_str())
    }

    /// Terraform label of a named volume
    pub fn volume_ident(&self, name: &str) -> Option<&str> {
        self.volumes
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.ident.as_str())
    }
}

/// Split a command line the way a POSIX shell would, recording an issue if
/// the quoting is unbalanced
fn split_words(
    device: &Device,
    field: &'static str,
    value: &Option<String>,
    issues: &mut Vec<ExportIssue>,
) -> Option<Vec<String>> {
    let value = value.as_deref()?;
    match shlex::split(value) {
        Some(words) if !words.is_empty() => Some(words),
        _ => {
            issues.push(ExportIssue::UnsplittableCommand {
                device: device.id,
                name: device.name.clone(),
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

/// Map names to Terraform labels, suffixing `_2`, `_3`, ... on collision
fn unique_idents<'a>(names: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<String> {
    let mut taken = BTreeSet::new();
    names
        .map(|name| {
            let base = terraform_ident(name, prefix);
            let mut ident = base.clone();
            let mut n = 2;
            while !taken.insert(ident.clone()) {
                ident = format!("{}_{}", base, n);
                n += 1;
            }
            ident
        })
        .collect()
}
