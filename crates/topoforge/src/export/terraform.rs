//! Terraform renderer for the Docker provider
//!
//! Output is built as a small tree of blocks and attributes and printed in
//! `terraform fmt` layout: two-space indent, `=` aligned across consecutive
//! attributes. Containers reference networks and volumes through resource
//! attributes, never through string interpolation, so Terraform sees the
//! dependency.

use std::fmt::Write as _;

use super::plan::{ExportPlan, ServicePlan};
use super::report::ExportIssue;
use super::Exporter;
use crate::core::{Protocol, VolumeMount};

const HEADER: &str = "# Generated by topoforge. Edits are overwritten on the next export.\n";

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    /// Expression written as-is (references, numbers, function calls)
    Expr(String),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    fn str(s: impl AsRef<str>) -> Self {
        Value::Str(s.as_ref().to_string())
    }

    fn expr(s: impl Into<String>) -> Self {
        Value::Expr(s.into())
    }

    fn num(n: impl std::fmt::Display) -> Self {
        Value::Expr(n.to_string())
    }

    fn bool(b: bool) -> Self {
        Value::Expr(b.to_string())
    }

    fn strings<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        Value::List(items.into_iter().map(Value::str).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Attr(String, Value),
    Block(String, Vec<Item>),
}

fn attr(key: &str, value: Value) -> Item {
    Item::Attr(key.to_string(), value)
}

fn block(header: impl Into<String>, body: Vec<Item>) -> Item {
    Item::Block(header.into(), body)
}

/// Escape a string for an HCL quoted literal, template sequences included
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Str(s) => {
            let _ = write!(out, "\"{}\"", escape(s));
        }
        Value::Expr(e) => out.push_str(e),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, depth);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
            for (key, field) in fields {
                indent(out, depth + 1);
                let _ = write!(out, "{:width$} = ", key, width = width);
                write_value(out, field, depth + 1);
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
        }
    }
}

fn write_items(out: &mut String, items: &[Item], depth: usize) {
    let mut i = 0;
    while i < items.len() {
        match &items[i] {
            Item::Attr(..) => {
                let run_end = items[i..]
                    .iter()
                    .position(|item| matches!(item, Item::Block(..)))
                    .map(|offset| i + offset)
                    .unwrap_or(items.len());
                let width = items[i..run_end]
                    .iter()
                    .map(|item| match item {
                        Item::Attr(key, _) => key.len(),
                        Item::Block(..) => 0,
                    })
                    .max()
                    .unwrap_or(0);
                for item in &items[i..run_end] {
                    if let Item::Attr(key, value) = item {
                        indent(out, depth);
                        let _ = write!(out, "{:width$} = ", key, width = width);
                        write_value(out, value, depth);
                        out.push('\n');
                    }
                }
                i = run_end;
            }
            Item::Block(header, body) => {
                if i > 0 {
                    out.push('\n');
                }
                indent(out, depth);
                if body.is_empty() {
                    let _ = writeln!(out, "{} {{}}", header);
                } else {
                    let _ = writeln!(out, "{} {{", header);
                    write_items(out, body, depth + 1);
                    indent(out, depth);
                    out.push_str("}\n");
                }
                i += 1;
            }
        }
    }
}

fn settings_block(plan_source: &str, plan_version: &str) -> Item {
    block(
        "terraform",
        vec![block(
            "required_providers",
            vec![attr(
                "docker",
                Value::Object(vec![
                    ("source".to_string(), Value::str(plan_source)),
                    ("version".to_string(), Value::str(plan_version)),
                ]),
            )],
        )],
    )
}

fn host_path(volume: &VolumeMount) -> Value {
    if volume.host.starts_with('/') {
        Value::str(&volume.host)
    } else if volume.host.starts_with('~') {
        Value::expr(format!("pathexpand(\"{}\")", escape(&volume.host)))
    } else {
        Value::expr(format!("abspath(\"{}\")", escape(&volume.host)))
    }
}

fn container_resource(plan: &ExportPlan, service: &ServicePlan) -> Item {
    let config = &service.config;
    let mut body = vec![
        attr("name", Value::str(&service.resource_name)),
        attr("image", Value::str(&service.image)),
        attr("restart", Value::str(config.restart.docker_value())),
    ];

    if let Some(memory) = config.memory {
        body.push(attr("memory", Value::num(memory.mebibytes_ceil())));
    }
    if let Some(cpus) = config.cpus {
        body.push(attr("cpu_shares", Value::num(cpus.shares())));
    }
    if config.privileged {
        body.push(attr("privileged", Value::bool(true)));
    }
    if let Some(command) = &service.command {
        body.push(attr("command", Value::strings(command.iter().map(String::as_str))));
    }
    if let Some(entrypoint) = &service.entrypoint {
        body.push(attr(
            "entrypoint",
            Value::strings(entrypoint.iter().map(String::as_str)),
        ));
    }
    if !config.environment.is_empty() {
        let env: Vec<String> = config
            .environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        body.push(attr("env", Value::strings(env.iter().map(String::as_str))));
    }

    for attachment in &service.networks {
        let Some(ident) = plan.network_ident(&attachment.network) else {
            continue;
        };
        let mut network = vec![attr(
            "name",
            Value::expr(format!("docker_network.{}.name", ident)),
        )];
        if let Some(address) = attachment.address {
            let key = if address.is_ipv4() {
                "ipv4_address"
            } else {
                "ipv6_address"
            };
            network.push(attr(key, Value::str(address.ip().to_string())));
        }
        body.push(block("networks_advanced", network));
    }

    for port in &config.ports {
        let mut ports = vec![
            attr("internal", Value::num(port.internal)),
            attr("external", Value::num(port.external)),
        ];
        if port.protocol != Protocol::Tcp {
            ports.push(attr("protocol", Value::str(port.protocol.token())));
        }
        body.push(block("ports", ports));
    }

    for volume in &config.volumes {
        let mut mount = match plan.volume_ident(&volume.host).filter(|_| volume.is_named()) {
            Some(ident) => vec![attr(
                "volume_name",
                Value::expr(format!("docker_volume.{}.name", ident)),
            )],
            None => vec![attr("host_path", host_path(volume))],
        };
        mount.push(attr("container_path", Value::str(&volume.container)));
        if volume.mode.is_read_only() {
            mount.push(attr("read_only", Value::bool(true)));
        }
        body.push(block("volumes", mount));
    }

    for (key, value) in &config.labels {
        body.push(block(
            "labels",
            vec![attr("label", Value::str(key)), attr("value", Value::str(value))],
        ));
    }

    if !config.capabilities.is_empty() {
        body.push(block(
            "capabilities",
            vec![attr(
                "add",
                Value::strings(config.capabilities.iter().map(String::as_str)),
            )],
        ));
    }

    block(
        format!("resource \"docker_container\" \"{}\"", service.ident),
        body,
    )
}

/// Renders the Terraform artifact
#[derive(Debug, Clone, Default)]
pub struct TerraformExporter {
    provider_source: String,
    provider_version: String,
}

impl TerraformExporter {
    pub fn new(provider_source: impl Into<String>, provider_version: impl Into<String>) -> Self {
        Self {
            provider_source: provider_source.into(),
            provider_version: provider_version.into(),
        }
    }
}

impl Exporter for TerraformExporter {
    fn name(&self) -> &'static str {
        "terraform"
    }

    fn render(&self, plan: &ExportPlan) -> std::result::Result<String, ExportIssue> {
        let mut items = vec![
            settings_block(&self.provider_source, &self.provider_version),
            block("provider \"docker\"", vec![]),
        ];

        for network in &plan.networks {
            items.push(block(
                format!("resource \"docker_network\" \"{}\"", network.ident),
                vec![
                    attr("name", Value::str(&network.name)),
                    attr("driver", Value::str(&plan.network_driver)),
                ],
            ));
        }

        for volume in &plan.volumes {
            items.push(block(
                format!("resource \"docker_volume\" \"{}\"", volume.ident),
                vec![attr("name", Value::str(&volume.name))],
            ));
        }

        for service in &plan.services {
            items.push(container_resource(plan, service));
        }

        let mut out = String::from(HEADER);
        out.push('\n');
        write_items(&mut out, &items, 0);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape("${HOME}"), "$${HOME}");
        assert_eq!(escape("%{if}"), "%%{if}");
        assert_eq!(escape("100%"), "100%");
        assert_eq!(escape("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_attributes_are_aligned() {
        let mut out = String::new();
        write_items(
            &mut out,
            &[block(
                "resource \"x\" \"y\"",
                vec![
                    attr("name", Value::str("a")),
                    attr("cpu_shares", Value::num(512)),
                    block("ports", vec![attr("internal", Value::num(80))]),
                ],
            )],
            0,
        );
        let expected = "resource \"x\" \"y\" {\n  name       = \"a\"\n  cpu_shares = 512\n\n  ports {\n    internal = 80\n  }\n}\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_empty_block_and_object() {
        let mut out = String::new();
        write_items(
            &mut out,
            &[
                block("provider \"docker\"", vec![]),
                settings_block("kreuzwerker/docker", "~> 3.0"),
            ],
            0,
        );
        assert!(out.starts_with("provider \"docker\" {}\n\nterraform {\n"));
        assert!(out.contains("    docker = {\n      source  = \"kreuzwerker/docker\"\n"));
    }

    #[test]
    fn test_host_path_forms() {
        let v = |host: &str| VolumeMount::new(host, "/d", crate::core::MountMode::ReadWrite);
        assert_eq!(host_path(&v("/srv")), Value::str("/srv"));
        assert_eq!(host_path(&v("./data")), Value::expr("abspath(\"./data\")"));
        assert_eq!(host_path(&v("~/data")), Value::expr("pathexpand(\"~/data\")"));
    }
}
