//! Core error types for topology editing, persistence and export
//!
//! Every fallible operation in the crate returns [`TopologyError`]. The
//! variants are the tags the presentation layer switches on, see
//! [`ErrorTag`].

use std::fmt;

use thiserror::Error;

use crate::export::ExportReport;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Which id space a missing reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Device,
    Connection,
    Interface,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Device => write!(f, "device"),
            EntityKind::Connection => write!(f, "connection"),
            EntityKind::Interface => write!(f, "interface"),
        }
    }
}

/// Errors produced by the topology core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("Invalid configuration{}: {}", subject_suffix(.subject), .reasons.join("; "))]
    InvalidConfig {
        subject: Option<String>,
        reasons: Vec<String>,
    },

    #[error("Device {device} cannot be connected to itself")]
    SelfConnection { device: String },

    #[error("Connection between {first} and {second} on network '{network}' already exists ({existing})")]
    DuplicateConnection {
        first: String,
        second: String,
        network: String,
        existing: String,
    },

    #[error("Corrupt project: {message}")]
    CorruptProject { message: String },

    #[error("Unsupported project version: {found}")]
    UnsupportedVersion { found: String },

    #[error("Export failed: {0}")]
    Export(ExportReport),
}

fn subject_suffix(subject: &Option<String>) -> String {
    subject
        .as_ref()
        .map(|s| format!(" for {}", s))
        .unwrap_or_default()
}

/// Stable tag of an error, as surfaced in notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorTag {
    NotFound,
    InvalidConfig,
    SelfConnection,
    DuplicateConnection,
    CorruptProject,
    UnsupportedVersion,
    ExportError,
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorTag::NotFound => "NotFound",
            ErrorTag::InvalidConfig => "InvalidConfig",
            ErrorTag::SelfConnection => "SelfConnection",
            ErrorTag::DuplicateConnection => "DuplicateConnection",
            ErrorTag::CorruptProject => "CorruptProject",
            ErrorTag::UnsupportedVersion => "UnsupportedVersion",
            ErrorTag::ExportError => "ExportError",
        };
        f.write_str(tag)
    }
}

impl TopologyError {
    /// Create a new not-found error
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create an invalid-config error with a single reason
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            subject: None,
            reasons: vec![reason.into()],
        }
    }

    /// Create an invalid-config error from every collected violation
    pub fn invalid_config_for(subject: impl Into<String>, reasons: Vec<String>) -> Self {
        Self::InvalidConfig {
            subject: Some(subject.into()),
            reasons,
        }
    }

    /// Create a corrupt-project error
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptProject {
            message: message.into(),
        }
    }

    /// Create an unsupported-version error
    pub fn unsupported(found: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            found: found.into(),
        }
    }

    /// Re-tag a model error raised while loading a document.
    ///
    /// Version errors pass through; everything else means the document is
    /// broken.
    pub fn into_corrupt(self) -> Self {
        match self {
            err @ (Self::UnsupportedVersion { .. } | Self::CorruptProject { .. }) => err,
            other => Self::corrupt(other.to_string()),
        }
    }

    /// The stable tag for this error
    pub fn tag(&self) -> ErrorTag {
        match self {
            Self::NotFound { .. } => ErrorTag::NotFound,
            Self::InvalidConfig { .. } => ErrorTag::InvalidConfig,
            Self::SelfConnection { .. } => ErrorTag::SelfConnection,
            Self::DuplicateConnection { .. } => ErrorTag::DuplicateConnection,
            Self::CorruptProject { .. } => ErrorTag::CorruptProject,
            Self::UnsupportedVersion { .. } => ErrorTag::UnsupportedVersion,
            Self::Export(_) => ErrorTag::ExportError,
        }
    }
}
