//! Update delivery
//!
//! Snapshots are queued in the order they are produced and handed to
//! listeners one at a time. A listener that triggers another update from
//! inside its callback only enqueues it; the outer drain delivers it after
//! the current snapshot has reached every listener.

use super::snapshot::VisibleNodes;
use crate::sync::lock;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

/// Callback invoked with every published snapshot
pub type UpdateCallback = Arc<dyn Fn(&Arc<VisibleNodes>) + Send + Sync>;

struct Listener {
    id: u64,
    callback: UpdateCallback,
    /// Fire once, then unregister
    once: bool,
    /// Only snapshots newer than this revision are delivered
    after: u64,
}

#[derive(Default)]
struct DispatchState {
    listeners: Vec<Listener>,
    queue: VecDeque<Arc<VisibleNodes>>,
    draining: bool,
    next_id: u64,
    last_enqueued: u64,
}

/// Ordered, re-entrancy safe delivery of snapshots to listeners
#[derive(Clone, Default)]
pub(crate) struct UpdateDispatcher {
    state: Arc<Mutex<DispatchState>>,
}

impl UpdateDispatcher {
    pub(crate) fn subscribe(&self, callback: UpdateCallback, once: bool) -> Subscription {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        let after = state.last_enqueued;
        state.listeners.push(Listener {
            id,
            callback,
            once,
            after,
        });
        Subscription {
            id,
            registry: Arc::downgrade(&self.state),
        }
    }

    /// Queue a snapshot. Callers enqueue while still holding the generator
    /// lock so queue order matches commit order.
    pub(crate) fn enqueue(&self, snapshot: Arc<VisibleNodes>) {
        let mut state = lock(&self.state);
        state.last_enqueued = snapshot.revision;
        state.queue.push_back(snapshot);
    }

    /// Deliver queued snapshots. Returns immediately if another drain is
    /// already running (including one further up the current call stack).
    pub(crate) fn drain(&self) {
        loop {
            let (snapshot, callbacks) = {
                let mut state = lock(&self.state);
                if state.draining {
                    return;
                }
                let Some(snapshot) = state.queue.pop_front() else {
                    return;
                };
                state.draining = true;

                let revision = snapshot.revision;
                let callbacks: Vec<UpdateCallback> = state
                    .listeners
                    .iter()
                    .filter(|l| revision > l.after)
                    .map(|l| Arc::clone(&l.callback))
                    .collect();
                state.listeners.retain(|l| !(l.once && revision > l.after));
                (snapshot, callbacks)
            };

            let _draining = DrainingGuard(&self.state);
            for callback in callbacks {
                callback(&snapshot);
            }
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

/// Clears the draining flag even if a callback panics
struct DrainingGuard<'a>(&'a Mutex<DispatchState>);

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).draining = false;
    }
}

/// Handle to a registered listener
///
/// Dropping the handle does not unregister; call [`unsubscribe`](Self::unsubscribe).
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<DispatchState>>,
}

impl Subscription {
    /// Stop receiving updates. Safe to call more than once, and after the
    /// generator is gone.
    pub fn unsubscribe(&self) {
        if let Some(state) = self.registry.upgrade() {
            lock(&state).listeners.retain(|l| l.id != self.id);
        }
    }

    /// Whether the listener is still registered
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|state| lock(&state).listeners.iter().any(|l| l.id == self.id))
    }
}
