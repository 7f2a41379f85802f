//! Core topology model
//!
//! Value types, validation rules and the [`TopologyStore`] that owns the
//! graph of devices and connections.

mod config;
mod connection;
mod device;
mod error;
mod ids;
pub mod logging;
pub mod naming;
mod schema;
pub mod shorthand;
mod store;
mod types;

pub use config::*;
pub(crate) use config::key_violation;
pub use connection::*;
pub use device::*;
pub use error::*;
pub use ids::*;
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use schema::*;
pub use shorthand::ShorthandError;
pub use store::*;
pub use types::*;
