//! Chunk lifecycle events and the monitor that dispatches them.
//!
//! Every chunk registers with the [`ChunkMonitor`] of its context on creation
//! and unregisters on disposal (or drop). Listeners are plain closures and are
//! invoked synchronously on the thread that raised the event, outside any
//! monitor lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use glam::IVec3;
use parking_lot::RwLock;

use crate::chunk_state::ChunkState;

/// Something that happened to a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    Created {
        pos: IVec3,
    },
    Disposed {
        pos: IVec3,
    },
    StateChanged {
        pos: IVec3,
        old: ChunkState,
        new: ChunkState,
    },
    /// Estimated memory before and after deflation, in bytes.
    Deflated {
        pos: IVec3,
        old_size: usize,
        new_size: usize,
    },
}

impl ChunkEvent {
    pub fn pos(&self) -> IVec3 {
        match self {
            ChunkEvent::Created { pos }
            | ChunkEvent::Disposed { pos }
            | ChunkEvent::StateChanged { pos, .. }
            | ChunkEvent::Deflated { pos, .. } => *pos,
        }
    }
}

/// Handle returned by [`ChunkMonitor::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ChunkEvent) + Send + Sync>;

#[derive(Default)]
pub struct ChunkMonitor {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    live: AtomicUsize,
    created: AtomicUsize,
    disposed: AtomicUsize,
    deflated: AtomicUsize,
}

impl std::fmt::Debug for ChunkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkMonitor")
            .field("listeners", &self.listeners.read().len())
            .field("live", &self.live_chunks())
            .field("created", &self.created_chunks())
            .field("disposed", &self.disposed_chunks())
            .finish()
    }
}

impl ChunkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChunkEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if the listener was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Delivers an event to every listener.
    pub fn post(&self, event: &ChunkEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub(crate) fn register_chunk(&self, pos: IVec3) {
        self.live.fetch_add(1, Ordering::Relaxed);
        self.created.fetch_add(1, Ordering::Relaxed);
        self.post(&ChunkEvent::Created { pos });
    }

    pub(crate) fn unregister_chunk(&self, pos: IVec3) {
        self.live.fetch_sub(1, Ordering::Relaxed);
        self.disposed.fetch_add(1, Ordering::Relaxed);
        self.post(&ChunkEvent::Disposed { pos });
    }

    pub(crate) fn record_deflation(&self, pos: IVec3, old_size: usize, new_size: usize) {
        self.deflated.fetch_add(1, Ordering::Relaxed);
        self.post(&ChunkEvent::Deflated {
            pos,
            old_size,
            new_size,
        });
    }

    /// Chunks created and not yet disposed.
    pub fn live_chunks(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    pub fn created_chunks(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn disposed_chunks(&self) -> usize {
        self.disposed.load(Ordering::Relaxed)
    }

    pub fn deflated_chunks(&self) -> usize {
        self.deflated.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_listener_receives_events_until_removed() {
        let monitor = ChunkMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = monitor.add_listener(move |event| sink.lock().push(event.clone()));

        monitor.register_chunk(IVec3::new(1, 2, 3));
        assert!(monitor.remove_listener(id));
        assert!(!monitor.remove_listener(id));
        monitor.unregister_chunk(IVec3::new(1, 2, 3));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ChunkEvent::Created { pos: IVec3::new(1, 2, 3) });
    }

    #[test]
    fn test_counters() {
        let monitor = ChunkMonitor::new();
        monitor.register_chunk(IVec3::ZERO);
        monitor.register_chunk(IVec3::X);
        monitor.unregister_chunk(IVec3::ZERO);
        monitor.record_deflation(IVec3::X, 100, 10);
        assert_eq!(monitor.live_chunks(), 1);
        assert_eq!(monitor.created_chunks(), 2);
        assert_eq!(monitor.disposed_chunks(), 1);
        assert_eq!(monitor.deflated_chunks(), 1);
    }

    #[test]
    fn test_listener_may_register_listeners() {
        let monitor = Arc::new(ChunkMonitor::new());
        let inner = Arc::clone(&monitor);
        monitor.add_listener(move |_| {
            inner.add_listener(|_| {});
        });
        monitor.register_chunk(IVec3::ZERO);
        assert_eq!(monitor.listeners.read().len(), 2);
    }
}
