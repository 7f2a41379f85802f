//! Topoforge - Design network topologies and generate infrastructure code
//!
//! A library for modelling a network of devices and the logical networks
//! between them, saving it as a project file, and exporting it as a Docker
//! Compose file plus an equivalent Terraform configuration.
//!
//! # Quick Start
//!
//! ```rust
//! use topoforge::prelude::*;
//!
//! let mut store = TopologyStore::new();
//! let web = store
//!     .add_device_from_template(DeviceKind::Computer, "web", Position::new(0.0, 0.0))
//!     .unwrap();
//! let db = store
//!     .add_device_from_template(DeviceKind::Database, "db", Position::new(200.0, 0.0))
//!     .unwrap();
//! store
//!     .update_device(web, &DeviceUpdate::new().image(Some("nginx:latest")))
//!     .unwrap();
//! store
//!     .update_device(db, &DeviceUpdate::new().image(Some("postgres:15")))
//!     .unwrap();
//! store.add_connection(web, db, Some("backend")).unwrap();
//!
//! let bundle = topoforge::export(store.topology()).unwrap();
//! assert!(bundle.compose.contains("backend"));
//! assert!(bundle.terraform.contains("docker_network.backend.name"));
//! ```
//!
//! # Editing Sessions
//!
//! Front ends drive a [`Session`](session::Session), which adds pointer
//! gestures, undo/redo and change notifications on top of the store:
//!
//! ```rust
//! use topoforge::prelude::*;
//!
//! let mut session = Session::default();
//! session.subscribe(|n: &Notification| println!("{}", n));
//! session.arm_placement(DeviceKind::Router);
//! session
//!     .pointer(PointerEvent::Click(Target::Canvas(Position::new(40.0, 40.0))))
//!     .unwrap();
//! assert_eq!(session.topology().device_count(), 1);
//! assert!(session.undo());
//! ```

pub mod core;
pub mod export;
pub mod interaction;
pub mod project;
pub mod session;

pub use core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        ConnectionId, DeviceConfig, DeviceId, DeviceKind, DeviceUpdate, ErrorTag, MemorySize,
        PortMapping, Position, RestartPolicy, Topology, TopologyError, TopologyStore,
        VolumeMount,
    };
    pub use crate::export::{ArtifactNames, ExportBundle, ExportConfig, ExportEngine};
    pub use crate::interaction::{GestureOutcome, InteractionMachine, Mode, PointerEvent, Target};
    pub use crate::project::{load_project, to_json_string, ProjectMeta};
    pub use crate::session::{Change, Notification, Session};
}

pub use export::export;

/// Load project text and export it with default settings
///
/// # Example
/// ```rust
/// let text = r#"{"format": "topoforge-project", "schema_version": 2, "name": "empty"}"#;
/// let bundle = topoforge::export_project(text).unwrap();
/// assert!(bundle.compose.contains("services"));
/// ```
pub fn export_project(text: &str) -> Result<export::ExportBundle> {
    let loaded = project::load_project(text)?;
    export::export(&loaded.topology)
}
