//! Docker Compose renderer
//!
//! The document is modelled as serde structs and handed to `serde_yaml`.
//! Maps are `IndexMap`s filled in plan order so key order is fixed.

use indexmap::IndexMap;
use serde::Serialize;

use super::plan::{ExportPlan, ServicePlan};
use super::report::ExportIssue;
use super::Exporter;

const HEADER: &str = "# Generated by topoforge. Edits are overwritten on the next export.\n";

#[derive(Debug, Serialize)]
struct ComposeFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    services: IndexMap<String, ComposeService>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    networks: IndexMap<String, ComposeNetwork>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    volumes: IndexMap<String, ComposeVolume>,
}

#[derive(Debug, Serialize)]
struct ComposeService {
    image: String,
    container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entrypoint: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    environment: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    restart: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    deploy: Option<Deploy>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    labels: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cap_add: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    privileged: bool,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    networks: IndexMap<String, ComposeAttachment>,
}

#[derive(Debug, Serialize)]
struct Deploy {
    resources: Resources,
}

#[derive(Debug, Serialize)]
struct Resources {
    limits: Limits,
}

#[derive(Debug, Serialize)]
struct Limits {
    #[serde(skip_serializing_if = "Option::is_none")]
    cpus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct ComposeAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv4_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6_address: Option<String>,
}

#[derive(Debug, Serialize)]
struct ComposeNetwork {
    driver: String,
}

#[derive(Debug, Serialize)]
struct ComposeVolume {}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Escape `$` so compose does not substitute host variables
fn literal(value: &str) -> String {
    value.replace('$', "$$")
}

fn literals(values: &[String]) -> Vec<String> {
    values.iter().map(|v| literal(v)).collect()
}

fn service(plan: &ServicePlan) -> ComposeService {
    let config = &plan.config;

    let limits = Limits {
        cpus: config.cpus.map(|c| c.to_string()),
        memory: config.memory.map(|m| m.compose_value()),
    };
    let deploy = (limits.cpus.is_some() || limits.memory.is_some()).then_some(Deploy {
        resources: Resources { limits },
    });

    let networks = plan
        .networks
        .iter()
        .map(|attachment| {
            let mut entry = ComposeAttachment::default();
            if let Some(address) = attachment.address {
                if address.is_ipv4() {
                    entry.ipv4_address = Some(address.ip().to_string());
                } else {
                    entry.ipv6_address = Some(address.ip().to_string());
                }
            }
            (attachment.network.clone(), entry)
        })
        .collect();

    ComposeService {
        image: literal(&plan.image),
        container_name: plan.resource_name.clone(),
        command: plan.command.as_deref().map(literals),
        entrypoint: plan.entrypoint.as_deref().map(literals),
        ports: config.ports.iter().map(|p| p.to_string()).collect(),
        environment: config
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), literal(v)))
            .collect(),
        volumes: config
            .volumes
            .iter()
            .map(|v| literal(&v.to_string()))
            .collect(),
        restart: config.restart.docker_value(),
        deploy,
        labels: config
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), literal(v)))
            .collect(),
        cap_add: config.capabilities.clone(),
        privileged: config.privileged,
        networks,
    }
}

/// Renders the compose artifact
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeExporter;

impl ComposeExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for ComposeExporter {
    fn name(&self) -> &'static str {
        "compose"
    }

    fn render(&self, plan: &ExportPlan) -> std::result::Result<String, ExportIssue> {
        let file = ComposeFile {
            name: plan.project_name.clone(),
            services: plan
                .services
                .iter()
                .map(|s| (s.resource_name.clone(), service(s)))
                .collect(),
            networks: plan
                .networks
                .iter()
                .map(|n| {
                    (
                        n.name.clone(),
                        ComposeNetwork {
                            driver: plan.network_driver.clone(),
                        },
                    )
                })
                .collect(),
            volumes: plan
                .volumes
                .iter()
                .map(|v| (v.name.clone(), ComposeVolume {}))
                .collect(),
        };

        let body = serde_yaml::to_string(&file).map_err(|e| ExportIssue::Encoding {
            artifact: self.name(),
            message: e.to_string(),
        })?;
        Ok(format!("{}{}", HEADER, body))
    }
}
