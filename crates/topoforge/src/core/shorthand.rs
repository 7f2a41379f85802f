//! Short-syntax parsers using chumsky
//!
//! Docker-style one-liners used by the legacy project importer and the CLI:
//!
//! - ports: `8080:80`, `53:53/udp`, `443`
//! - volumes: `./data:/var/lib/data`, `cache:/cache:ro`
//! - memory: `512m`, `1g`, `2048k`, `512mb`
//! - environment: `KEY=value`
//!
//! The grammars only recognise the shape. Numeric ranges and key rules are
//! checked afterwards so the error can say what was wrong.

use chumsky::prelude::*;
use thiserror::Error;

use super::{MemorySize, MemoryUnit, MountMode, PortMapping, Protocol, VolumeMount};

/// A short-syntax string that could not be understood
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {what} '{input}': {reason}")]
pub struct ShorthandError {
    pub what: &'static str,
    pub input: String,
    pub reason: String,
}

impl ShorthandError {
    fn new(what: &'static str, input: &str, reason: impl Into<String>) -> Self {
        Self {
            what,
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

fn digits<'src>() -> impl Parser<'src, &'src str, String> + Clone {
    one_of('0'..='9').repeated().at_least(1).collect::<String>()
}

fn protocol<'src>() -> impl Parser<'src, &'src str, Protocol> + Clone {
    just("tcp")
        .to(Protocol::Tcp)
        .or(just("udp").to(Protocol::Udp))
}

/// `ext[:int][/proto]`
fn port_parser<'src>(
) -> impl Parser<'src, &'src str, (String, Option<String>, Option<Protocol>)> + Clone {
    digits()
        .then(just(':').ignore_then(digits()).or_not())
        .then(just('/').ignore_then(protocol()).or_not())
        .map(|((external, internal), protocol)| (external, internal, protocol))
}

fn mount_mode<'src>() -> impl Parser<'src, &'src str, MountMode> + Clone {
    just("ro")
        .to(MountMode::ReadOnly)
        .or(just("rw").to(MountMode::ReadWrite))
}

/// `host:container[:mode]`
fn volume_parser<'src>() -> impl Parser<'src, &'src str, (String, String, Option<MountMode>)> + Clone
{
    let segment = none_of(':').repeated().at_least(1).collect::<String>();

    segment
        .clone()
        .then_ignore(just(':'))
        .then(segment)
        .then(just(':').ignore_then(mount_mode()).or_not())
        .map(|((host, container), mode)| (host, container, mode))
}

fn memory_unit<'src>() -> impl Parser<'src, &'src str, MemoryUnit> + Clone {
    let unit = one_of("bB")
        .to(MemoryUnit::Bytes)
        .or(one_of("kK").to(MemoryUnit::Kibibytes))
        .or(one_of("mM").to(MemoryUnit::Mebibytes))
        .or(one_of("gG").to(MemoryUnit::Gibibytes));

    // `512mb` is accepted as a synonym for `512m`
    unit.then_ignore(one_of("bB").or_not())
}

/// `<digits>[unit]`
fn memory_parser<'src>() -> impl Parser<'src, &'src str, (String, Option<MemoryUnit>)> + Clone {
    digits().then(memory_unit().or_not())
}

/// `KEY=value`, the value may be empty and may contain `=`
fn env_parser<'src>() -> impl Parser<'src, &'src str, (String, String)> + Clone {
    none_of('=')
        .repeated()
        .at_least(1)
        .collect::<String>()
        .then_ignore(just('='))
        .then(any().repeated().collect::<String>())
}

fn port_number(what: &'static str, input: &str, digits: &str) -> Result<u16, ShorthandError> {
    match digits.parse::<u32>() {
        Ok(n) if (1..=65535).contains(&n) => Ok(n as u16),
        _ => Err(ShorthandError::new(
            what,
            input,
            format!("port {} is outside 1-65535", digits),
        )),
    }
}

/// Parse a Docker-style port mapping
pub fn parse_port_mapping(input: &str) -> Result<PortMapping, ShorthandError> {
    let trimmed = input.trim();
    let (external, internal, protocol) = port_parser()
        .then_ignore(end())
        .parse(trimmed)
        .into_result()
        .map_err(|_| {
            ShorthandError::new("port mapping", input, "expected EXTERNAL[:INTERNAL][/tcp|udp]")
        })?;

    let external = port_number("port mapping", input, &external)?;
    let internal = match internal {
        Some(digits) => port_number("port mapping", input, &digits)?,
        None => external,
    };

    Ok(PortMapping::new(external, internal, protocol.unwrap_or_default()))
}

/// Parse a Docker-style volume mount
pub fn parse_volume_mount(input: &str) -> Result<VolumeMount, ShorthandError> {
    let trimmed = input.trim();
    let (host, container, mode) = volume_parser()
        .then_ignore(end())
        .parse(trimmed)
        .into_result()
        .map_err(|_| ShorthandError::new("volume mount", input, "expected HOST:CONTAINER[:ro|rw]"))?;

    if !container.starts_with('/') {
        return Err(ShorthandError::new(
            "volume mount",
            input,
            format!("container path '{}' must be absolute", container),
        ));
    }

    Ok(VolumeMount::new(host, container, mode.unwrap_or_default()))
}

/// Parse a memory size such as `512m`. A bare number is a byte count.
pub fn parse_memory_size(input: &str) -> Result<MemorySize, ShorthandError> {
    let trimmed = input.trim();
    let (digits, unit) = memory_parser()
        .then_ignore(end())
        .parse(trimmed)
        .into_result()
        .map_err(|_| ShorthandError::new("memory size", input, "expected NUMBER[b|k|m|g]"))?;

    let value = digits
        .parse::<u64>()
        .map_err(|_| ShorthandError::new("memory size", input, "number too large"))?;
    if value == 0 {
        return Err(ShorthandError::new("memory size", input, "must be greater than zero"));
    }

    Ok(MemorySize::new(value, unit.unwrap_or(MemoryUnit::Bytes)))
}

/// Parse a `KEY=value` assignment
pub fn parse_env_assignment(input: &str) -> Result<(String, String), ShorthandError> {
    let (key, value) = env_parser()
        .then_ignore(end())
        .parse(input)
        .into_result()
        .map_err(|_| ShorthandError::new("environment entry", input, "expected KEY=VALUE"))?;

    let key = key.trim().to_string();
    if let Some(reason) = super::config::key_violation(&key) {
        return Err(ShorthandError::new("environment entry", input, reason));
    }

    Ok((key, value))
}
