//! Editing session
//!
//! [`Session`] is the surface a front end talks to. It owns the store, the
//! gesture machine, project metadata and undo history, and tells registered
//! observers about every change and every failure.

mod history;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

pub use history::{EditHistory, DEFAULT_DEPTH};

use crate::core::{
    ConnectionId, DeviceConfig, DeviceId, DeviceKind, DeviceUpdate, ErrorTag, Position, Result,
    Topology, TopologyError, TopologyStore,
};
use crate::export::{ExportBundle, ExportConfig, ExportEngine};
use crate::interaction::{GestureOutcome, InteractionMachine, Mode, PointerEvent};
use crate::project::{self, LoadedProject, ProjectMeta};

/// Ids touched by one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Change {
    pub devices: Vec<DeviceId>,
    pub connections: Vec<ConnectionId>,
}

impl Change {
    pub fn device(id: DeviceId) -> Self {
        Self {
            devices: vec![id],
            connections: Vec::new(),
        }
    }

    pub fn connection(id: ConnectionId) -> Self {
        Self {
            devices: Vec::new(),
            connections: vec![id],
        }
    }

    /// Every id whose value differs between two topologies, sorted
    pub fn between(before: &Topology, after: &Topology) -> Self {
        let devices: BTreeSet<DeviceId> = before
            .devices()
            .chain(after.devices())
            .map(|d| d.id)
            .filter(|id| before.device(*id) != after.device(*id))
            .collect();
        let connections: BTreeSet<ConnectionId> = before
            .connections()
            .chain(after.connections())
            .map(|c| c.id)
            .filter(|id| before.connection(*id) != after.connection(*id))
            .collect();
        Self {
            devices: devices.into_iter().collect(),
            connections: connections.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.connections.is_empty()
    }
}

/// Message delivered to observers
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A mutation succeeded
    Changed { revision: u64, change: Change },
    /// An operation failed and nothing changed
    Failed { tag: ErrorTag, message: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Changed { revision, change } => write!(
                f,
                "revision {}: {} device(s), {} connection(s) changed",
                revision,
                change.devices.len(),
                change.connections.len()
            ),
            Notification::Failed { tag, message } => write!(f, "{}: {}", tag, message),
        }
    }
}

/// Receives session notifications
pub trait SessionObserver: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<F> SessionObserver for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// One open project
pub struct Session {
    store: TopologyStore,
    machine: InteractionMachine,
    meta: ProjectMeta,
    engine: ExportEngine,
    history: EditHistory,
    observers: Vec<Arc<dyn SessionObserver>>,
    dirty: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ExportConfig::default())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("meta", &self.meta)
            .field("revision", &self.store.revision())
            .field("mode", &self.machine.mode())
            .field("observers", &self.observers.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Session {
    pub fn new(export_config: ExportConfig) -> Self {
        Self {
            store: TopologyStore::new(),
            machine: InteractionMachine::new(),
            meta: ProjectMeta::default(),
            engine: ExportEngine::new(export_config),
            history: EditHistory::default(),
            observers: Vec::new(),
            dirty: false,
        }
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history = EditHistory::with_depth(depth);
        self
    }

    /// Register an observer for every later notification
    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Arc::new(observer));
    }

    pub fn topology(&self) -> &Topology {
        self.store.topology()
    }

    pub fn snapshot(&self) -> Arc<Topology> {
        self.store.snapshot()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.machine
    }

    pub fn export_config(&self) -> &ExportConfig {
        self.engine.config()
    }

    /// Returns true if there are changes since the last save or load
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn emit(&self, notification: Notification) {
        for observer in &self.observers {
            observer.notify(&notification);
        }
    }

    fn fail<T>(&self, err: TopologyError) -> Result<T> {
        debug!(tag = %err.tag(), error = %err, "Session operation failed");
        self.emit(Notification::Failed {
            tag: err.tag(),
            message: err.to_string(),
        });
        Err(err)
    }

    /// Run one store operation, recording history and notifying on success
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut TopologyStore) -> Result<T>,
        change: impl FnOnce(&T) -> Change,
    ) -> Result<T> {
        let before = self.store.snapshot();
        let revision = self.store.revision();
        match op(&mut self.store) {
            Ok(value) => {
                if self.store.revision() != revision {
                    let change = change(&value);
                    self.committed(before, change);
                }
                Ok(value)
            }
            Err(err) => self.fail(err),
        }
    }

    fn committed(&mut self, before: Arc<Topology>, change: Change) {
        self.history.record(before);
        self.dirty = true;
        self.machine.reconcile(&self.store);
        self.emit(Notification::Changed {
            revision: self.store.revision(),
            change,
        });
    }

    pub fn add_device(
        &mut self,
        kind: DeviceKind,
        name: &str,
        position: Position,
        config: DeviceConfig,
    ) -> Result<DeviceId> {
        self.mutate(
            |store| store.add_device(kind, name, position, config),
            |id| Change::device(*id),
        )
    }

    pub fn add_device_from_template(
        &mut self,
        kind: DeviceKind,
        name: &str,
        position: Position,
    ) -> Result<DeviceId> {
        self.mutate(
            |store| store.add_device_from_template(kind, name, position),
            |id| Change::device(*id),
        )
    }

    pub fn update_device(&mut self, id: DeviceId, update: &DeviceUpdate) -> Result<()> {
        self.mutate(|store| store.update_device(id, update), |_| Change::device(id))
    }

    pub fn move_device(&mut self, id: DeviceId, position: Position) -> Result<()> {
        self.mutate(|store| store.move_device(id, position), |_| Change::device(id))
    }

    /// Delete a device and every connection touching it
    pub fn delete_device(&mut self, id: DeviceId) -> Result<Vec<ConnectionId>> {
        self.mutate(
            |store| store.delete_device(id),
            |removed| Change {
                devices: vec![id],
                connections: removed.clone(),
            },
        )
    }

    pub fn add_connection(
        &mut self,
        source: DeviceId,
        target: DeviceId,
        network: Option<&str>,
    ) -> Result<ConnectionId> {
        self.mutate(
            |store| store.add_connection(source, target, network),
            |id| Change::connection(*id),
        )
    }

    pub fn delete_connection(&mut self, id: ConnectionId) -> Result<()> {
        self.mutate(|store| store.delete_connection(id), |_| Change::connection(id))
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.machine.set_mode(mode);
    }

    pub fn arm_placement(&mut self, kind: DeviceKind) {
        self.machine.arm_placement(kind);
    }

    /// Feed a pointer event to the gesture machine
    pub fn pointer(&mut self, event: PointerEvent) -> Result<GestureOutcome> {
        let before = self.store.snapshot();
        let revision = self.store.revision();
        match self.machine.handle(&mut self.store, event) {
            Ok(outcome) => {
                if self.store.revision() != revision {
                    let change = gesture_change(&outcome);
                    self.committed(before, change);
                }
                Ok(outcome)
            }
            Err(err) => self.fail(err),
        }
    }

    /// Step back one mutation. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.store.snapshot()) {
            Some(previous) => {
                self.replace(previous);
                true
            }
            None => false,
        }
    }

    /// Re-apply an undone mutation. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.store.snapshot()) {
            Some(next) => {
                self.replace(next);
                true
            }
            None => false,
        }
    }

    /// Swap in a whole topology without touching history
    fn replace(&mut self, topology: Arc<Topology>) {
        let before = self.store.snapshot();
        let change = Change::between(&before, &topology);
        self.store.restore(topology);
        self.machine.reconcile(&self.store);
        self.dirty = true;
        self.emit(Notification::Changed {
            revision: self.store.revision(),
            change,
        });
    }

    /// Discard everything and start an empty project
    pub fn new_project(&mut self, meta: ProjectMeta) {
        self.replace(Arc::new(Topology::new()));
        self.history.clear();
        self.meta = meta;
        self.dirty = false;
        info!(name = %self.meta.name, "New project");
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.meta.name = name.into();
        self.dirty = true;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.meta.description = description.into();
        self.dirty = true;
    }

    /// Serialize the project to JSON text and mark it clean
    pub fn save(&mut self) -> Result<String> {
        match project::to_json_string(self.store.topology(), &self.meta) {
            Ok(text) => {
                self.dirty = false;
                Ok(text)
            }
            Err(err) => self.fail(err),
        }
    }

    /// Replace the session contents with a project read from text.
    ///
    /// Returns warnings raised while importing an older file. History is
    /// cleared. On error the session is unchanged.
    pub fn load(&mut self, text: &str) -> Result<Vec<String>> {
        let LoadedProject {
            topology,
            meta,
            warnings,
            legacy,
        } = match project::load_project(text) {
            Ok(loaded) => loaded,
            Err(err) => return self.fail(err),
        };
        if legacy {
            warn!(warnings = warnings.len(), "Loaded a version 1 project");
        }

        self.replace(Arc::new(topology));
        self.history.clear();
        self.meta = meta;
        self.dirty = false;
        Ok(warnings)
    }

    /// Generate both artifacts from the current topology
    pub fn export_infrastructure(&self) -> Result<ExportBundle> {
        match self.engine.export(self.store.topology()) {
            Ok(bundle) => Ok(bundle),
            Err(err) => self.fail(err),
        }
    }

    /// Export the current snapshot on a worker thread.
    ///
    /// Failures are not sent to observers; the caller gets them from the
    /// join handle.
    pub fn spawn_export(&self) -> thread::JoinHandle<Result<ExportBundle>> {
        self.engine.spawn(self.store.snapshot())
    }
}

fn gesture_change(outcome: &GestureOutcome) -> Change {
    match outcome {
        GestureOutcome::Moved { device, .. } | GestureOutcome::Placed(device) => {
            Change::device(*device)
        }
        GestureOutcome::Connected(id) | GestureOutcome::ConnectionDeleted(id) => {
            Change::connection(*id)
        }
        GestureOutcome::DeviceDeleted {
            device,
            connections,
        } => Change {
            devices: vec![*device],
            connections: connections.clone(),
        },
        _ => Change::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Target;
    use std::sync::Mutex;

    fn recording(session: &mut Session) -> Arc<Mutex<Vec<Notification>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        session.subscribe(move |n: &Notification| sink.lock().unwrap().push(n.clone()));
        log
    }

    #[test]
    fn test_mutations_notify_observers() {
        let mut session = Session::default();
        let log = recording(&mut session);

        let a = session
            .add_device_from_template(DeviceKind::Computer, "a", Position::default())
            .unwrap();
        let b = session
            .add_device_from_template(DeviceKind::Computer, "b", Position::default())
            .unwrap();
        let conn = session.add_connection(a, b, None).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(
            log[2],
            Notification::Changed {
                revision: session.revision(),
                change: Change::connection(conn),
            }
        );
    }

    #[test]
    fn test_failure_notifies_with_tag() {
        let mut session = Session::default();
        let log = recording(&mut session);
        let a = session
            .add_device_from_template(DeviceKind::Router, "r", Position::default())
            .unwrap();
        let revision = session.revision();

        assert!(session.add_connection(a, a, None).is_err());
        assert_eq!(session.revision(), revision);
        assert!(!session.can_redo());

        let log = log.lock().unwrap();
        match log.last() {
            Some(Notification::Failed { tag, .. }) => assert_eq!(*tag, ErrorTag::SelfConnection),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_noop_move_is_silent() {
        let mut session = Session::default();
        let a = session
            .add_device_from_template(DeviceKind::Switch, "s", Position::new(5.0, 5.0))
            .unwrap();
        let log = recording(&mut session);
        session.move_device(a, Position::new(5.0, 5.0)).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_undo_redo_cascade() {
        let mut session = Session::default();
        let a = session
            .add_device_from_template(DeviceKind::Computer, "a", Position::default())
            .unwrap();
        let b = session
            .add_device_from_template(DeviceKind::Computer, "b", Position::default())
            .unwrap();
        session.add_connection(a, b, None).unwrap();
        session.delete_device(a).unwrap();
        assert_eq!(session.topology().connection_count(), 0);

        assert!(session.undo());
        assert_eq!(session.topology().device_count(), 2);
        assert_eq!(session.topology().connection_count(), 1);

        assert!(session.redo());
        assert_eq!(session.topology().device_count(), 1);
        assert!(!session.redo());
    }

    #[test]
    fn test_undo_reports_changed_ids() {
        let mut session = Session::default();
        let a = session
            .add_device_from_template(DeviceKind::Computer, "a", Position::default())
            .unwrap();
        let log = recording(&mut session);
        session.undo();
        let log = log.lock().unwrap();
        match &log[0] {
            Notification::Changed { change, .. } => assert_eq!(change.devices, vec![a]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_undo_clears_stale_selection() {
        let mut session = Session::default();
        session.arm_placement(DeviceKind::Firewall);
        let outcome = session
            .pointer(PointerEvent::Click(Target::Canvas(Position::new(12.0, 40.0))))
            .unwrap();
        let GestureOutcome::Placed(id) = outcome else {
            panic!("expected placement, got {:?}", outcome);
        };
        assert_eq!(
            session.topology().device(id).map(|d| d.position),
            Some(Position::new(0.0, 50.0))
        );

        session.undo();
        assert_eq!(
            session.interaction().state(),
            crate::interaction::InteractionState::Idle
        );
    }

    #[test]
    fn test_save_load_resets_history() {
        let mut session = Session::default();
        session
            .add_device_from_template(DeviceKind::Database, "db", Position::default())
            .unwrap();
        session.set_name("lab");
        assert!(session.is_dirty());

        let text = session.save().unwrap();
        assert!(!session.is_dirty());

        let mut other = Session::default();
        let warnings = other.load(&text).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(other.meta().name, "lab");
        assert_eq!(other.topology(), session.topology());
        assert!(!other.can_undo());
    }

    #[test]
    fn test_failed_load_keeps_session() {
        let mut session = Session::default();
        session
            .add_device_from_template(DeviceKind::Computer, "a", Position::default())
            .unwrap();
        let err = session.load("{").unwrap_err();
        assert_eq!(err.tag(), ErrorTag::CorruptProject);
        assert_eq!(session.topology().device_count(), 1);
    }

    #[test]
    fn test_spawned_export_sees_snapshot() {
        let mut session = Session::default();
        let handle = session.spawn_export();
        session
            .add_device_from_template(DeviceKind::Computer, "late", Position::default())
            .unwrap();
        let bundle = handle.join().unwrap().unwrap();
        assert!(!bundle.compose.contains("late"));
    }
}
