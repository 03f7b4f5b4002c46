use super::SessionState;
use futures::stream::{BoxStream, StreamExt};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Every state a session view passes through, starting with the current one
pub type SessionStateStream = BoxStream<'static, SessionState>;

struct Inner {
    current: SessionState,
    subscribers: Vec<mpsc::UnboundedSender<SessionState>>,
}

/// Publishes session states so each subscriber sees every transition
///
/// Unlike a `watch` channel, a state that is replaced before a subscriber
/// gets to run is still delivered to it, in order.
pub struct StateSignal {
    inner: Mutex<Inner>,
}

impl StateSignal {
    pub fn new(initial: SessionState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> SessionState {
        self.lock().current.clone()
    }

    /// Stream that yields the current state, then each later transition
    pub fn subscribe(&self) -> SessionStateStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // The receiver is still in hand, so this send cannot fail.
        let _ = tx.send(inner.current.clone());
        inner.subscribers.push(tx);
        UnboundedReceiverStream::new(rx).boxed()
    }

    /// Move to `next`; publishes nothing when the state is unchanged
    pub fn set(&self, next: SessionState) -> bool {
        self.update(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Modify the state in place; `modify` returns whether it changed
    pub fn update(&self, modify: impl FnOnce(&mut SessionState) -> bool) -> bool {
        let mut inner = self.lock();
        if !modify(&mut inner.current) {
            return false;
        }
        let state = inner.current.clone();
        inner.subscribers.retain(|tx| tx.send(state.clone()).is_ok());
        true
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl Default for StateSignal {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

impl std::fmt::Debug for StateSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSignal")
            .field("current", &self.lock().current)
            .finish_non_exhaustive()
    }
}
