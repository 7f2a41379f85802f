//! Pointer gestures as an explicit state machine
//!
//! The canvas forwards raw clicks and drags; [`InteractionMachine`] turns
//! them into at most one store operation per completed gesture. The active
//! [`Mode`] is picked from outside (a toolbar) and switching it abandons any
//! gesture in progress.
//!
//! ```text
//! Select:  Idle --click device--> Selecting(id) --drag--> move_device
//!          Selecting --click canvas--> Idle
//! Connect: PendingFirst --click a--> PendingSecond(a) --click b--> add_connection(a, b)
//!          PendingSecond(a) --click a--> PendingSecond(a)
//!          PendingSecond(_) --click canvas--> PendingFirst
//! Delete:  Deleting --click device/connection--> delete, stay Deleting
//! ```

use std::fmt;

use tracing::debug;

use crate::core::{
    ConnectionId, DeviceId, DeviceKind, EntityKind, Position, Result, TopologyError,
    TopologyStore,
};

/// Grid that placed devices snap to
pub const PLACEMENT_GRID: f64 = 25.0;

/// Toolbar mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Select,
    Connect,
    Delete,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Select => write!(f, "select"),
            Mode::Connect => write!(f, "connect"),
            Mode::Delete => write!(f, "delete"),
        }
    }
}

/// Progress of a connect gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    PendingFirst,
    PendingSecond(DeviceId),
}

/// Current gesture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Selecting(DeviceId),
    Connecting(ConnectPhase),
    Deleting,
}

/// What the pointer hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Device(DeviceId),
    Connection(ConnectionId),
    Canvas(Position),
}

/// Raw pointer input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Click(Target),
    Drag(Position),
}

/// Result of feeding one event to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Nothing happened
    Ignored,
    Selected(DeviceId),
    Deselected,
    /// First endpoint of a connection picked
    Pending(DeviceId),
    /// Connect gesture abandoned
    Cancelled,
    Moved { device: DeviceId, position: Position },
    Placed(DeviceId),
    Connected(ConnectionId),
    DeviceDeleted {
        device: DeviceId,
        connections: Vec<ConnectionId>,
    },
    ConnectionDeleted(ConnectionId),
}

impl GestureOutcome {
    /// Returns true if the outcome changed the store
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            GestureOutcome::Moved { .. }
                | GestureOutcome::Placed(_)
                | GestureOutcome::Connected(_)
                | GestureOutcome::DeviceDeleted { .. }
                | GestureOutcome::ConnectionDeleted(_)
        )
    }
}

/// Gesture state machine for one canvas
#[derive(Debug, Clone, Default)]
pub struct InteractionMachine {
    mode: Mode,
    state: InteractionState,
    placement: Option<DeviceKind>,
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Device kind that the next canvas click will place, if armed
    pub fn armed_placement(&self) -> Option<DeviceKind> {
        self.placement
    }

    /// Switch mode, abandoning any gesture and disarming placement
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.placement = None;
        self.state = Self::rest_state(mode);
        debug!(%mode, "Interaction mode changed");
    }

    /// Make the next canvas click in select mode place a `kind` device
    pub fn arm_placement(&mut self, kind: DeviceKind) {
        self.placement = Some(kind);
        debug!(%kind, "Placement armed");
    }

    pub fn disarm_placement(&mut self) {
        self.placement = None;
    }

    /// Drop references to devices that no longer exist (after undo or load)
    pub fn reconcile(&mut self, store: &TopologyStore) {
        let stale = match self.state {
            InteractionState::Selecting(id)
            | InteractionState::Connecting(ConnectPhase::PendingSecond(id)) => {
                store.topology().device(id).is_none()
            }
            _ => false,
        };
        if stale {
            self.state = Self::rest_state(self.mode);
        }
    }

    fn rest_state(mode: Mode) -> InteractionState {
        match mode {
            Mode::Select => InteractionState::Idle,
            Mode::Connect => InteractionState::Connecting(ConnectPhase::PendingFirst),
            Mode::Delete => InteractionState::Deleting,
        }
    }

    /// Feed one pointer event.
    ///
    /// On error the machine falls back to the rest state of the current mode
    /// and the store is unchanged.
    pub fn handle(
        &mut self,
        store: &mut TopologyStore,
        event: PointerEvent,
    ) -> Result<GestureOutcome> {
        let result = match self.mode {
            Mode::Select => self.handle_select(store, event),
            Mode::Connect => self.handle_connect(store, event),
            Mode::Delete => self.handle_delete(store, event),
        };

        match &result {
            Ok(outcome) => debug!(state = ?self.state, ?outcome, "Gesture handled"),
            Err(err) => {
                self.state = Self::rest_state(self.mode);
                debug!(state = ?self.state, error = %err, "Gesture failed");
            }
        }
        result
    }

    fn handle_select(
        &mut self,
        store: &mut TopologyStore,
        event: PointerEvent,
    ) -> Result<GestureOutcome> {
        match (event, self.state) {
            (PointerEvent::Click(Target::Device(id)), _) => {
                require_device(store, id)?;
                self.state = InteractionState::Selecting(id);
                Ok(GestureOutcome::Selected(id))
            }
            (PointerEvent::Click(Target::Canvas(position)), _) => match self.placement.take() {
                Some(kind) => {
                    let name = store.topology().next_default_name(kind);
                    let id =
                        store.add_device_from_template(kind, name, position.snapped(PLACEMENT_GRID))?;
                    self.state = InteractionState::Selecting(id);
                    Ok(GestureOutcome::Placed(id))
                }
                None => {
                    let was_selecting = matches!(self.state, InteractionState::Selecting(_));
                    self.state = InteractionState::Idle;
                    Ok(if was_selecting {
                        GestureOutcome::Deselected
                    } else {
                        GestureOutcome::Ignored
                    })
                }
            },
            (PointerEvent::Click(Target::Connection(_)), _) => {
                self.state = InteractionState::Idle;
                Ok(GestureOutcome::Ignored)
            }
            (PointerEvent::Drag(position), InteractionState::Selecting(id)) => {
                store.move_device(id, position)?;
                Ok(GestureOutcome::Moved {
                    device: id,
                    position,
                })
            }
            (PointerEvent::Drag(_), _) => Ok(GestureOutcome::Ignored),
        }
    }

    fn handle_connect(
        &mut self,
        store: &mut TopologyStore,
        event: PointerEvent,
    ) -> Result<GestureOutcome> {
        let phase = match self.state {
            InteractionState::Connecting(phase) => phase,
            _ => ConnectPhase::PendingFirst,
        };

        match (event, phase) {
            (PointerEvent::Click(Target::Device(id)), ConnectPhase::PendingFirst) => {
                require_device(store, id)?;
                self.state = InteractionState::Connecting(ConnectPhase::PendingSecond(id));
                Ok(GestureOutcome::Pending(id))
            }
            (PointerEvent::Click(Target::Device(id)), ConnectPhase::PendingSecond(first)) => {
                if id == first {
                    return Ok(GestureOutcome::Ignored);
                }
                let conn = store.add_connection(first, id, None)?;
                self.state = InteractionState::Connecting(ConnectPhase::PendingFirst);
                Ok(GestureOutcome::Connected(conn))
            }
            (PointerEvent::Click(Target::Canvas(_)), ConnectPhase::PendingSecond(_)) => {
                self.state = InteractionState::Connecting(ConnectPhase::PendingFirst);
                Ok(GestureOutcome::Cancelled)
            }
            _ => Ok(GestureOutcome::Ignored),
        }
    }

    fn handle_delete(
        &mut self,
        store: &mut TopologyStore,
        event: PointerEvent,
    ) -> Result<GestureOutcome> {
        self.state = InteractionState::Deleting;
        match event {
            PointerEvent::Click(Target::Device(id)) => {
                let connections = store.delete_device(id)?;
                Ok(GestureOutcome::DeviceDeleted {
                    device: id,
                    connections,
                })
            }
            PointerEvent::Click(Target::Connection(id)) => {
                store.delete_connection(id)?;
                Ok(GestureOutcome::ConnectionDeleted(id))
            }
            _ => Ok(GestureOutcome::Ignored),
        }
    }
}

fn require_device(store: &TopologyStore, id: DeviceId) -> Result<()> {
    store
        .topology()
        .device(id)
        .map(|_| ())
        .ok_or_else(|| TopologyError::not_found(EntityKind::Device, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorTag;

    fn click_device(id: DeviceId) -> PointerEvent {
        PointerEvent::Click(Target::Device(id))
    }

    fn click_canvas() -> PointerEvent {
        PointerEvent::Click(Target::Canvas(Position::default()))
    }

    fn setup() -> (TopologyStore, DeviceId, DeviceId) {
        let mut store = TopologyStore::new();
        let a = store
            .add_device_from_template(DeviceKind::Computer, "a", Position::default())
            .unwrap();
        let b = store
            .add_device_from_template(DeviceKind::Computer, "b", Position::default())
            .unwrap();
        (store, a, b)
    }

    #[test]
    fn test_select_and_drag_moves_device() {
        let (mut store, a, _) = setup();
        let mut machine = InteractionMachine::new();

        machine.handle(&mut store, click_device(a)).unwrap();
        assert_eq!(machine.state(), InteractionState::Selecting(a));

        let target = Position::new(40.0, 60.0);
        let outcome = machine.handle(&mut store, PointerEvent::Drag(target)).unwrap();
        assert!(outcome.is_mutation());
        assert_eq!(store.topology().device(a).unwrap().position, target);

        let outcome = machine.handle(&mut store, click_canvas()).unwrap();
        assert_eq!(outcome, GestureOutcome::Deselected);
        assert_eq!(machine.state(), InteractionState::Idle);
    }

    #[test]
    fn test_drag_while_idle_does_nothing() {
        let (mut store, _, _) = setup();
        let mut machine = InteractionMachine::new();
        let revision = store.revision();
        let outcome = machine
            .handle(&mut store, PointerEvent::Drag(Position::new(1.0, 1.0)))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Ignored);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_connect_two_clicks() {
        let (mut store, a, b) = setup();
        let mut machine = InteractionMachine::new();
        machine.set_mode(Mode::Connect);

        assert_eq!(
            machine.handle(&mut store, click_device(a)).unwrap(),
            GestureOutcome::Pending(a)
        );
        // same device again is a silent no-op
        assert_eq!(
            machine.handle(&mut store, click_device(a)).unwrap(),
            GestureOutcome::Ignored
        );
        assert_eq!(
            machine.state(),
            InteractionState::Connecting(ConnectPhase::PendingSecond(a))
        );

        let outcome = machine.handle(&mut store, click_device(b)).unwrap();
        assert!(matches!(outcome, GestureOutcome::Connected(_)));
        assert_eq!(
            machine.state(),
            InteractionState::Connecting(ConnectPhase::PendingFirst)
        );
        assert_eq!(store.topology().connection_count(), 1);
    }

    #[test]
    fn test_connect_error_reverts_to_pending_first() {
        let (mut store, a, b) = setup();
        store.add_connection(a, b, None).unwrap();
        let mut machine = InteractionMachine::new();
        machine.set_mode(Mode::Connect);

        machine.handle(&mut store, click_device(b)).unwrap();
        let err = machine.handle(&mut store, click_device(a)).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::DuplicateConnection);
        assert_eq!(
            machine.state(),
            InteractionState::Connecting(ConnectPhase::PendingFirst)
        );
        assert_eq!(store.topology().connection_count(), 1);
    }

    #[test]
    fn test_canvas_click_cancels_pending_connection() {
        let (mut store, a, _) = setup();
        let mut machine = InteractionMachine::new();
        machine.set_mode(Mode::Connect);
        machine.handle(&mut store, click_device(a)).unwrap();
        assert_eq!(
            machine.handle(&mut store, click_canvas()).unwrap(),
            GestureOutcome::Cancelled
        );
    }

    #[test]
    fn test_mode_switch_resets_gesture() {
        let (mut store, a, _) = setup();
        let mut machine = InteractionMachine::new();
        machine.set_mode(Mode::Connect);
        machine.handle(&mut store, click_device(a)).unwrap();

        machine.set_mode(Mode::Select);
        assert_eq!(machine.state(), InteractionState::Idle);
        machine.set_mode(Mode::Connect);
        assert_eq!(
            machine.state(),
            InteractionState::Connecting(ConnectPhase::PendingFirst)
        );
    }

    #[test]
    fn test_delete_mode() {
        let (mut store, a, b) = setup();
        let conn = store.add_connection(a, b, None).unwrap();
        let mut machine = InteractionMachine::new();
        machine.set_mode(Mode::Delete);

        assert_eq!(
            machine
                .handle(&mut store, PointerEvent::Click(Target::Connection(conn)))
                .unwrap(),
            GestureOutcome::ConnectionDeleted(conn)
        );
        let outcome = machine.handle(&mut store, click_device(a)).unwrap();
        assert_eq!(
            outcome,
            GestureOutcome::DeviceDeleted {
                device: a,
                connections: vec![]
            }
        );
        assert!(machine.handle(&mut store, click_device(a)).is_err());
        assert_eq!(machine.state(), InteractionState::Deleting);
    }

    #[test]
    fn test_placement_snaps_and_names() {
        let mut store = TopologyStore::new();
        let mut machine = InteractionMachine::new();
        machine.arm_placement(DeviceKind::Router);

        let outcome = machine
            .handle(
                &mut store,
                PointerEvent::Click(Target::Canvas(Position::new(37.0, 12.0))),
            )
            .unwrap();
        let GestureOutcome::Placed(id) = outcome else {
            panic!("expected placement, got {:?}", outcome);
        };
        let device = store.topology().device(id).unwrap();
        assert_eq!(device.name, "router_1");
        assert_eq!(device.position, Position::new(25.0, 0.0));
        assert!(machine.armed_placement().is_none());
    }

    #[test]
    fn test_mode_switch_disarms_placement() {
        let mut machine = InteractionMachine::new();
        machine.arm_placement(DeviceKind::Switch);
        machine.set_mode(Mode::Select);
        assert!(machine.armed_placement().is_none());
    }

    #[test]
    fn test_select_unknown_device_fails_to_idle() {
        let (mut store, a, _) = setup();
        let mut machine = InteractionMachine::new();
        machine.handle(&mut store, click_device(a)).unwrap();
        let err = machine
            .handle(&mut store, click_device(DeviceId::new()))
            .unwrap_err();
        assert_eq!(err.tag(), ErrorTag::NotFound);
        assert_eq!(machine.state(), InteractionState::Idle);
    }

    #[test]
    fn test_reconcile_drops_stale_selection() {
        let (mut store, a, _) = setup();
        let mut machine = InteractionMachine::new();
        machine.handle(&mut store, click_device(a)).unwrap();
        store.delete_device(a).unwrap();
        machine.reconcile(&store);
        assert_eq!(machine.state(), InteractionState::Idle);
    }
}
