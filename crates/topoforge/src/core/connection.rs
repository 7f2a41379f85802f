//! Connections between devices

use super::{ConnectionId, DeviceId};

/// An edge of the topology: two devices joined on a logical network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: DeviceId,
    pub target: DeviceId,
    pub network: String,
    /// Free-form annotation, carried through save and load only
    pub bandwidth: Option<String>,
    pub latency: Option<String>,
}

impl Connection {
    pub fn new(source: DeviceId, target: DeviceId, network: impl Into<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            source,
            target,
            network: network.into(),
            bandwidth: None,
            latency: None,
        }
    }

    pub fn touches(&self, device: DeviceId) -> bool {
        self.source == device || self.target == device
    }

    /// The endpoint opposite `device`
    pub fn other_end(&self, device: DeviceId) -> Option<DeviceId> {
        if self.source == device {
            Some(self.target)
        } else if self.target == device {
            Some(self.source)
        } else {
            None
        }
    }

    /// Endpoints in id order, so `a-b` and `b-a` compare equal
    pub fn unordered_pair(&self) -> (DeviceId, DeviceId) {
        if self.source <= self.target {
            (self.source, self.target)
        } else {
            (self.target, self.source)
        }
    }

    /// Returns true if both connections join the same pair on the same network
    pub fn duplicates(&self, other: &Connection) -> bool {
        self.unordered_pair() == other.unordered_pair() && self.network == other.network
    }
}
