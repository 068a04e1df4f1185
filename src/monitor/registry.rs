//! Listener registry and event broadcaster.
//!
//! Every admin stream registers a [`Listener`]: a control token plus a
//! single-slot data channel. [`ListenerRegistry::broadcast`] holds the
//! registry lock for the whole fan-out pass and waits for each listener's slot
//! to free up, so a listener sees events exactly in publisher order and none
//! are dropped. A slow listener therefore delays every publisher.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::event::Event;

/// Depth of a listener's data slot.
pub const LISTENER_SLOT_DEPTH: usize = 1;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Create a new random listener id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving side of a registration, owned by one subscriber task.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    control: CancellationToken,
    data: mpsc::Receiver<Event>,
}

impl Listener {
    /// The id this listener was registered under.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// The control signal; cancelled when the registry stops.
    #[must_use]
    pub const fn control(&self) -> &CancellationToken {
        &self.control
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the control signal fires or the data slot is
    /// closed. The control signal wins over pending data. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Event> {
        tokio::select! {
            biased;
            () = self.control.cancelled() => None,
            event = self.data.recv() => event,
        }
    }

    /// Take the next event if one is already waiting, without blocking.
    pub fn try_recv(&mut self) -> Option<Event> {
        if self.control.is_cancelled() {
            return None;
        }
        self.data.try_recv().ok()
    }
}

/// Sending side of a registration, owned by the registry.
#[derive(Debug)]
struct ListenerSlot {
    id: ListenerId,
    control: CancellationToken,
    data: mpsc::Sender<Event>,
}

#[derive(Debug, Default)]
struct RegistryState {
    listeners: Vec<ListenerSlot>,
    stopped: bool,
}

/// Thread-safe collection of active listeners.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    state: Mutex<RegistryState>,
    shutdown: CancellationToken,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener.
    ///
    /// After [`stop`](Self::stop) the returned listener is already terminated.
    pub async fn register(&self) -> Listener {
        let id = ListenerId::new();
        let control = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(LISTENER_SLOT_DEPTH);

        let mut state = self.state.lock().await;
        if state.stopped {
            debug!(listener = %id, "registry stopped, listener closed on arrival");
        } else {
            state.listeners.push(ListenerSlot {
                id,
                control: control.clone(),
                data: tx,
            });
            debug!(listener = %id, active = state.listeners.len(), "listener registered");
        }

        Listener {
            id,
            control,
            data: rx,
        }
    }

    /// Deliver a copy of `event` to every listener, in registration order.
    ///
    /// Waits for each listener's slot to drain. Listeners whose subscriber has
    /// gone away are removed. Returns the number of listeners that received
    /// the event; 0 after the registry has stopped.
    pub async fn broadcast(&self, event: &Event) -> usize {
        let mut state = self.state.lock().await;
        if state.stopped {
            return 0;
        }

        let mut delivered = 0;
        let mut gone = Vec::new();
        for slot in &state.listeners {
            tokio::select! {
                biased;
                () = slot.control.cancelled() => gone.push(slot.id),
                sent = slot.data.send(event.clone()) => match sent {
                    Ok(()) => delivered += 1,
                    Err(_) => gone.push(slot.id),
                },
            }
        }

        if !gone.is_empty() {
            state.listeners.retain(|slot| !gone.contains(&slot.id));
            debug!(
                pruned = gone.len(),
                active = state.listeners.len(),
                "pruned closed listeners"
            );
        }

        delivered
    }

    /// Signal and close every listener.
    ///
    /// Runs at most once; later calls return immediately.
    pub async fn stop(&self) {
        // Signal before taking the lock so a broadcast stuck on a stalled
        // listener gives up its pass.
        self.shutdown.cancel();

        let mut state = self.state.lock().await;
        if state.stopped {
            return;
        }
        state.stopped = true;

        let listeners = std::mem::take(&mut state.listeners);
        info!(listeners = listeners.len(), "stopping listeners");
        for slot in listeners {
            slot.control.cancel();
            drop(slot.data);
        }
    }

    /// Number of active listeners.
    pub async fn len(&self) -> usize {
        self.state.lock().await.listeners.len()
    }

    /// Returns true if no listener is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
