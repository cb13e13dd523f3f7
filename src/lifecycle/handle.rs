//! Unit Handles
//!
//! A launched unit is owned through a [`UnitHandle`]; the launcher keeps the
//! matching [`UnitControl`] inside the task that supervises the unit.
//!
//! The two halves share a state cell (`starting → running → stopping →
//! exited`), two one-shot stop requests (graceful, then forced) and an event
//! channel carrying output lines and the final exit.

use super::types::{HandleState, LaunchSpec, UnitEvent};

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;

pub struct UnitHandle {
    pub spec: LaunchSpec,
    state: watch::Receiver<HandleState>,
    graceful: Option<oneshot::Sender<()>>,
    kill: Option<oneshot::Sender<()>>,
    events: Option<mpsc::UnboundedReceiver<UnitEvent>>,
}

/// Supervisor side of a handle.
pub struct UnitControl {
    pub state: watch::Sender<HandleState>,
    pub graceful: oneshot::Receiver<()>,
    pub kill: oneshot::Receiver<()>,
    pub events: mpsc::UnboundedSender<UnitEvent>,
}

pub fn handle_pair(spec: LaunchSpec) -> (UnitHandle, UnitControl) {
    let (state_tx, state_rx) = watch::channel(HandleState::Starting);
    let (graceful_tx, graceful_rx) = oneshot::channel();
    let (kill_tx, kill_rx) = oneshot::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    (
        UnitHandle {
            spec,
            state: state_rx,
            graceful: Some(graceful_tx),
            kill: Some(kill_tx),
            events: Some(events_rx),
        },
        UnitControl {
            state: state_tx,
            graceful: graceful_rx,
            kill: kill_rx,
            events: events_tx,
        },
    )
}

impl UnitControl {
    pub fn set_state(&self, state: HandleState) {
        self.state.send_replace(state);
    }

    pub fn output(&self, line: impl Into<String>) {
        let _ = self.events.send(UnitEvent::Output(line.into()));
    }

    /// Final transition; consumes the control so nothing follows an exit.
    pub fn exited(self, code: Option<i32>, requested: bool) {
        self.state.send_replace(HandleState::Exited);
        let _ = self.events.send(UnitEvent::Exited { code, requested });
    }
}

impl UnitHandle {
    pub fn unit_id(&self) -> &str {
        &self.spec.unit_id
    }

    pub fn state(&self) -> HandleState {
        *self.state.borrow()
    }

    /// The event stream; available once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UnitEvent>> {
        self.events.take()
    }

    async fn wait_exited(&mut self, limit: Duration) -> bool {
        // A closed channel means the supervisor is gone, which counts as exited.
        timeout(limit, self.state.wait_for(|s| *s == HandleState::Exited))
            .await
            .is_ok()
    }

    /// Requests a graceful stop and forces termination if the unit has not
    /// exited within `grace`. Returns `true` when force was needed.
    pub async fn stop(&mut self, grace: Duration) -> bool {
        if self.state() == HandleState::Exited {
            return false;
        }

        if let Some(graceful) = self.graceful.take() {
            let _ = graceful.send(());
        }
        if self.wait_exited(grace).await {
            return false;
        }

        tracing::warn!(
            "Unit {} did not exit within {:?}, forcing termination",
            self.spec.unit_id,
            grace
        );
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        self.wait_exited(grace).await;
        true
    }
}
