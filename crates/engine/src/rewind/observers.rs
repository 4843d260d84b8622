use std::fmt;

use crate::snapshot::GameStateId;

/// Phase changes reported to camera, audio and effect collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindEvent {
    GameStateSaved {
        id: GameStateId,
    },
    RewindStarted {
        from: GameStateId,
        target: GameStateId,
        step_count: u32,
    },
    RewindFinished {
        current: GameStateId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Observers are always notified in registration order. Unregistering and
/// registering again moves an observer to the end.
pub struct ObserverList<E> {
    next: u64,
    observers: Vec<(ObserverId, Box<dyn FnMut(&E)>)>,
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self {
            next: 0,
            observers: Vec::new(),
        }
    }
}

impl<E> fmt::Debug for ObserverList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<ObserverId> = self.observers.iter().map(|(id, _)| *id).collect();
        f.debug_struct("ObserverList").field("observers", &ids).finish()
    }
}

impl<E> ObserverList<E> {
    pub fn register(&mut self, observer: impl FnMut(&E) + 'static) -> ObserverId {
        let id = ObserverId(self.next);
        self.next = self.next.saturating_add(1);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn notify(&mut self, event: &E) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
