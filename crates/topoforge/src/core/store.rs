//! Topology aggregate and its store
//!
//! [`Topology`] is the immutable value: devices and connections keyed by id.
//! [`TopologyStore`] owns the current value behind an `Arc` and is the only
//! way to change it. Every mutation validates against the current value
//! first and only then writes through `Arc::make_mut`, so a failed call
//! leaves nothing behind and snapshots already handed out never change.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, trace};

use super::naming::{default_network_name, is_valid_network_name};
use super::{
    kind_schema, Connection, ConnectionId, Device, DeviceConfig, DeviceId, DeviceKind,
    DeviceUpdate, EntityKind, InterfaceId, Position, Result, TopologyError,
};

/// The full graph of devices and connections at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    devices: BTreeMap<DeviceId, Device>,
    connections: BTreeMap<ConnectionId, Connection>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a topology from loose records, checking every invariant.
    ///
    /// All problems are reported together as a corrupt-project error.
    pub fn from_parts(devices: Vec<Device>, connections: Vec<Connection>) -> Result<Self> {
        let mut reasons = Vec::new();
        let mut topology = Topology::new();

        for device in devices {
            for reason in device.violations() {
                reasons.push(format!("device {}: {}", device.id, reason));
            }
            if topology.devices.insert(device.id, device).is_some() {
                reasons.push("device id used twice".to_string());
            }
        }

        for conn in connections {
            if topology.devices.keys().any(|id| id.as_uuid() == conn.id.as_uuid()) {
                reasons.push(format!("id {} is used by a device and a connection", conn.id));
            }
            if let Err(err) = topology.check_new_connection(&conn) {
                reasons.push(format!("connection {}: {}", conn.id, err));
            }
            if topology.connections.insert(conn.id, conn).is_some() {
                reasons.push("connection id used twice".to_string());
            }
        }

        let mut interface_ids = BTreeSet::new();
        for iface in topology.devices.values().flat_map(|d| &d.interfaces) {
            if !interface_ids.insert(iface.id) {
                reasons.push(format!("interface id {} is used by two devices", iface.id));
            }
        }

        if reasons.is_empty() {
            Ok(topology)
        } else {
            Err(TopologyError::corrupt(reasons.join("; ")))
        }
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Devices in id order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Connections in id order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Connections touching `device`, in id order
    pub fn connections_of(&self, device: DeviceId) -> Vec<&Connection> {
        self.connections
            .values()
            .filter(|c| c.touches(device))
            .collect()
    }

    /// Devices directly connected to `device`, sorted and deduplicated
    pub fn neighbors(&self, device: DeviceId) -> Vec<DeviceId> {
        let neighbors: BTreeSet<DeviceId> = self
            .connections
            .values()
            .filter_map(|c| c.other_end(device))
            .collect();
        neighbors.into_iter().collect()
    }

    /// Distinct logical network names, sorted
    pub fn network_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.connections.values().map(|c| c.network.as_str()).collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.connections.is_empty()
    }

    /// `<kind>_<n>` where `n` is one more than the devices of that kind
    pub fn next_default_name(&self, kind: DeviceKind) -> String {
        let count = self.devices.values().filter(|d| d.kind == kind).count();
        format!("{}_{}", kind.token(), count + 1)
    }

    fn require_device(&self, id: DeviceId) -> Result<&Device> {
        self.devices
            .get(&id)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Device, id))
    }

    fn duplicate_of(&self, conn: &Connection) -> Option<&Connection> {
        self.connections
            .values()
            .find(|existing| existing.id != conn.id && existing.duplicates(conn))
    }

    /// Validate a connection against this topology without inserting it
    fn check_new_connection(&self, conn: &Connection) -> Result<()> {
        let source = self.require_device(conn.source)?;
        let target = self.require_device(conn.target)?;

        if conn.source == conn.target {
            return Err(TopologyError::SelfConnection {
                device: source.name.clone(),
            });
        }
        if !is_valid_network_name(&conn.network) {
            return Err(TopologyError::invalid_config(format!(
                "invalid network name '{}'",
                conn.network
            )));
        }
        if let Some(existing) = self.duplicate_of(conn) {
            return Err(TopologyError::DuplicateConnection {
                first: source.name.clone(),
                second: target.name.clone(),
                network: conn.network.clone(),
                existing: existing.id.to_string(),
            });
        }
        Ok(())
    }

    /// Validate a device that is about to replace (or join) this topology
    fn check_device(&self, device: &Device) -> Result<()> {
        let mut reasons = device.violations();

        let own: BTreeSet<InterfaceId> = device.interfaces.iter().map(|i| i.id).collect();
        for other in self.devices.values().filter(|d| d.id != device.id) {
            for iface in other.interfaces.iter().filter(|i| own.contains(&i.id)) {
                reasons.push(format!(
                    "interface id {} already belongs to device '{}'",
                    iface.id, other.name
                ));
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(TopologyError::invalid_config_for(device.name.clone(), reasons))
        }
    }
}

/// Owner of the current topology
#[derive(Debug, Clone, Default)]
pub struct TopologyStore {
    current: Arc<Topology>,
    revision: u64,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing topology
    pub fn from_topology(topology: Topology) -> Self {
        Self {
            current: Arc::new(topology),
            revision: 0,
        }
    }

    /// Cheap immutable view of the current state
    pub fn snapshot(&self) -> Arc<Topology> {
        Arc::clone(&self.current)
    }

    /// Borrow the current state
    pub fn topology(&self) -> &Topology {
        &self.current
    }

    /// Monotonic counter bumped by every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn commit(&mut self) -> &mut Topology {
        self.revision += 1;
        Arc::make_mut(&mut self.current)
    }

    /// Add a device with an explicit configuration.
    ///
    /// The device gets the default interfaces of its kind.
    pub fn add_device(
        &mut self,
        kind: DeviceKind,
        name: impl Into<String>,
        position: Position,
        config: DeviceConfig,
    ) -> Result<DeviceId> {
        let mut device = Device::new(kind, name, position);
        device.interfaces = kind_schema(kind).template_interfaces();
        device.config = config;
        self.insert_device(device)
    }

    /// Add a device configured from its kind's template
    pub fn add_device_from_template(
        &mut self,
        kind: DeviceKind,
        name: impl Into<String>,
        position: Position,
    ) -> Result<DeviceId> {
        let config = kind_schema(kind).template_config();
        self.add_device(kind, name, position, config)
    }

    /// Add a fully built device, keeping its id
    pub fn insert_device(&mut self, device: Device) -> Result<DeviceId> {
        trace!(device_name = %device.name, device_kind = %device.kind, "Adding device");
        if self.current.devices.contains_key(&device.id) {
            return Err(TopologyError::invalid_config_for(
                device.name.clone(),
                vec![format!("device id {} already exists", device.id)],
            ));
        }
        self.current.check_device(&device)?;

        let id = device.id;
        self.commit().devices.insert(id, device);
        debug!(device_id = %id, device_count = self.current.device_count(), "Device added");
        Ok(id)
    }

    /// Merge a partial update into a device and re-validate the result
    pub fn update_device(&mut self, id: DeviceId, update: &DeviceUpdate) -> Result<()> {
        trace!(device_id = %id, "Updating device");
        let merged = update.merged(self.current.require_device(id)?);
        self.current.check_device(&merged)?;

        self.commit().devices.insert(id, merged);
        debug!(device_id = %id, "Device updated");
        Ok(())
    }

    /// Move a device on the canvas
    pub fn move_device(&mut self, id: DeviceId, position: Position) -> Result<()> {
        let device = self.current.require_device(id)?;
        if !position.is_finite() {
            return Err(TopologyError::invalid_config_for(
                device.name.clone(),
                vec![format!("position {} is not finite", position)],
            ));
        }
        if device.position == position {
            return Ok(());
        }

        if let Some(device) = self.commit().devices.get_mut(&id) {
            device.position = position;
        }
        trace!(device_id = %id, %position, "Device moved");
        Ok(())
    }

    /// Remove a device and every connection touching it.
    ///
    /// Returns the removed connection ids in sorted order.
    pub fn delete_device(&mut self, id: DeviceId) -> Result<Vec<ConnectionId>> {
        self.current.require_device(id)?;
        let removed: Vec<ConnectionId> = self
            .current
            .connections_of(id)
            .into_iter()
            .map(|c| c.id)
            .collect();

        let topology = self.commit();
        topology.devices.remove(&id);
        for conn_id in &removed {
            topology.connections.remove(conn_id);
        }

        debug!(
            device_id = %id,
            removed_connections = removed.len(),
            "Device deleted"
        );
        Ok(removed)
    }

    /// Connect two devices.
    ///
    /// Without a network name the connection gets `net-<a>-<b>` built from
    /// both device names.
    pub fn add_connection(
        &mut self,
        source: DeviceId,
        target: DeviceId,
        network: Option<&str>,
    ) -> Result<ConnectionId> {
        trace!(%source, %target, ?network, "Adding connection");
        let network = match network {
            Some(name) => name.to_string(),
            None => {
                let a = self.current.require_device(source)?;
                let b = self.current.require_device(target)?;
                default_network_name(&a.name, &b.name)
            }
        };

        self.insert_connection(Connection::new(source, target, network))
    }

    /// Add a fully built connection, keeping its id
    pub fn insert_connection(&mut self, conn: Connection) -> Result<ConnectionId> {
        if self.current.connections.contains_key(&conn.id) {
            return Err(TopologyError::invalid_config(format!(
                "connection id {} already exists",
                conn.id
            )));
        }
        self.current.check_new_connection(&conn)?;

        let id = conn.id;
        let network = conn.network.clone();
        self.commit().connections.insert(id, conn);
        debug!(
            connection_id = %id,
            %network,
            connection_count = self.current.connection_count(),
            "Connection added"
        );
        Ok(id)
    }

    pub fn delete_connection(&mut self, id: ConnectionId) -> Result<()> {
        if !self.current.connections.contains_key(&id) {
            return Err(TopologyError::not_found(EntityKind::Connection, id));
        }
        self.commit().connections.remove(&id);
        debug!(connection_id = %id, "Connection deleted");
        Ok(())
    }

    /// Replace the whole topology (undo, redo, load)
    pub fn restore(&mut self, topology: Arc<Topology>) {
        self.current = topology;
        self.revision += 1;
        debug!(
            device_count = self.current.device_count(),
            connection_count = self.current.connection_count(),
            "Topology restored"
        );
    }

    pub fn clear(&mut self) {
        self.restore(Arc::new(Topology::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CpuLimit, ErrorTag, PortMapping};

    fn store_with_pair() -> (TopologyStore, DeviceId, DeviceId) {
        let mut store = TopologyStore::new();
        let a = store
            .add_device_from_template(DeviceKind::Computer, "Web", Position::default())
            .unwrap();
        let b = store
            .add_device_from_template(DeviceKind::Database, "DB", Position::new(100.0, 0.0))
            .unwrap();
        (store, a, b)
    }

    #[test]
    fn test_add_device_assigns_template_interfaces() {
        let (store, a, _) = store_with_pair();
        let web = store.topology().device(a).unwrap();
        assert_eq!(web.interfaces.len(), 1);
        assert_eq!(web.config.memory.map(|m| m.to_string()).as_deref(), Some("512m"));
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_invalid_device_is_rejected_and_nothing_changes() {
        let mut store = TopologyStore::new();
        let config = DeviceConfig::default()
            .with_port(PortMapping::tcp(80, 80))
            .with_port(PortMapping::tcp(80, 81));
        let err = store
            .add_device(DeviceKind::Computer, "web", Position::default(), config)
            .unwrap_err();
        assert_eq!(err.tag(), ErrorTag::InvalidConfig);
        assert_eq!(store.topology().device_count(), 0);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_default_network_name() {
        let (mut store, a, b) = store_with_pair();
        let id = store.add_connection(b, a, None).unwrap();
        assert_eq!(store.topology().connection(id).unwrap().network, "net-db-web");
    }

    #[test]
    fn test_connection_error_order() {
        let (mut store, a, b) = store_with_pair();
        let ghost = DeviceId::new();

        let err = store.add_connection(a, ghost, Some("x")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::NotFound);

        let err = store.add_connection(a, a, Some("bad name")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::SelfConnection);

        let err = store.add_connection(a, b, Some("bad name")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::InvalidConfig);

        store.add_connection(a, b, Some("backend")).unwrap();
        let err = store.add_connection(b, a, Some("backend")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::DuplicateConnection);

        // a second network between the same pair is fine
        store.add_connection(a, b, Some("frontend")).unwrap();
        assert_eq!(store.topology().connection_count(), 2);
    }

    #[test]
    fn test_delete_device_cascades() {
        let (mut store, a, b) = store_with_pair();
        let c = store
            .add_device_from_template(DeviceKind::Switch, "sw", Position::default())
            .unwrap();
        let ab = store.add_connection(a, b, Some("backend")).unwrap();
        let ac = store.add_connection(a, c, Some("lan")).unwrap();
        let bc = store.add_connection(b, c, Some("lan")).unwrap();

        let mut expected = vec![ab, ac];
        expected.sort();
        assert_eq!(store.delete_device(a).unwrap(), expected);
        assert_eq!(store.topology().connections().map(|c| c.id).collect::<Vec<_>>(), vec![bc]);
        assert!(store.delete_device(a).is_err());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let (mut store, a, _) = store_with_pair();
        let before = store.snapshot();

        let bad = DeviceUpdate::new()
            .name("renamed")
            .ports(vec![PortMapping::tcp(0, 80)]);
        assert!(store.update_device(a, &bad).is_err());
        assert_eq!(*store.snapshot(), *before);

        let good = DeviceUpdate::new().name("renamed");
        store.update_device(a, &good).unwrap();
        assert_eq!(store.topology().device(a).unwrap().name, "renamed");
    }

    #[test]
    fn test_cpu_limit_above_maximum_is_rejected() {
        let (mut store, a, _) = store_with_pair();
        let huge = DeviceUpdate::new().cpus(CpuLimit::new(1e30));
        let err = store.update_device(a, &huge).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::InvalidConfig);
        assert!(err.to_string().contains("between 0.01 and 1024 cores"));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutations() {
        let (mut store, a, b) = store_with_pair();
        let snapshot = store.snapshot();
        store.add_connection(a, b, None).unwrap();
        store.delete_device(a).unwrap();

        assert_eq!(snapshot.device_count(), 2);
        assert_eq!(snapshot.connection_count(), 0);
        assert_eq!(store.topology().device_count(), 1);
    }

    #[test]
    fn test_move_device() {
        let (mut store, a, _) = store_with_pair();
        store.move_device(a, Position::new(5.0, 5.0)).unwrap();
        let revision = store.revision();
        store.move_device(a, Position::new(5.0, 5.0)).unwrap();
        assert_eq!(store.revision(), revision);
        assert!(store.move_device(DeviceId::new(), Position::default()).is_err());
        assert!(store.move_device(a, Position::new(f64::NAN, 0.0)).is_err());
    }

    #[test]
    fn test_queries() {
        let (mut store, a, b) = store_with_pair();
        let c = store
            .add_device_from_template(DeviceKind::Router, "gw", Position::default())
            .unwrap();
        store.add_connection(a, b, Some("backend")).unwrap();
        store.add_connection(a, b, Some("frontend")).unwrap();
        store.add_connection(c, a, Some("frontend")).unwrap();

        let topology = store.topology();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(topology.neighbors(a), expected);
        assert_eq!(topology.connections_of(b).len(), 2);
        assert_eq!(topology.network_names(), vec!["backend", "frontend"]);
        assert_eq!(topology.next_default_name(DeviceKind::Router), "router_2");
    }

    #[test]
    fn test_from_parts_reports_broken_records() {
        let a = Device::new(DeviceKind::Computer, "a", Position::default());
        let b = Device::new(DeviceKind::Computer, "b", Position::default());
        let dangling = Connection::new(a.id, DeviceId::new(), "n");
        let self_loop = Connection::new(b.id, b.id, "n");

        let err = Topology::from_parts(vec![a, b], vec![dangling, self_loop]).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::CorruptProject);
        let message = err.to_string();
        assert!(message.contains("not found"));
        assert!(message.contains("connected to itself"));
    }

    #[test]
    fn test_clear_and_restore() {
        let (mut store, _, _) = store_with_pair();
        let full = store.snapshot();
        store.clear();
        assert!(store.topology().is_empty());
        store.restore(full);
        assert_eq!(store.topology().device_count(), 2);
    }
}
