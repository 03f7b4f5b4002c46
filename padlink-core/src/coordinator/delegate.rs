//! Delegate notifications
//!
//! Every notification the coordinator emits travels through one unbounded
//! channel to a single dispatch task, so the delegate is always called from
//! one logical thread and in emission order, whichever task produced the
//! notification.

use super::CoordinatorError;
use crate::envelope::Envelope;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Sink for session lifecycle and content callbacks (typically the UI)
pub trait SessionDelegate: Send + Sync {
    fn did_connect(&self);

    fn did_disconnect(&self);

    fn participants_changed(&self, count: usize);

    /// Human-readable session state, e.g. `joined`
    fn session_status(&self, status: &str);

    fn update_message(&self, envelope: &Envelope);

    fn report_error(&self, error: &CoordinatorError);
}

/// One delegate callback, as queued for dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum DelegateEvent {
    Connected,
    Disconnected,
    ParticipantsChanged(usize),
    Status(String),
    Message(Envelope),
    Error(CoordinatorError),
}

impl DelegateEvent {
    /// Invoke the matching delegate method
    pub fn deliver(&self, delegate: &dyn SessionDelegate) {
        match self {
            DelegateEvent::Connected => delegate.did_connect(),
            DelegateEvent::Disconnected => delegate.did_disconnect(),
            DelegateEvent::ParticipantsChanged(count) => delegate.participants_changed(*count),
            DelegateEvent::Status(status) => delegate.session_status(status),
            DelegateEvent::Message(envelope) => delegate.update_message(envelope),
            DelegateEvent::Error(error) => delegate.report_error(error),
        }
    }
}

/// Sending side of the dispatch channel
#[derive(Debug, Clone)]
pub struct DelegateNotifier {
    tx: mpsc::UnboundedSender<DelegateEvent>,
}

impl DelegateNotifier {
    /// Spawn the dispatch task for `delegate`
    ///
    /// The task exits once every notifier clone is dropped and the queue has
    /// drained.
    pub fn spawn(delegate: Arc<dyn SessionDelegate>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<DelegateEvent>();

        let dispatcher = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                trace!(?event, "Dispatching delegate event");
                event.deliver(delegate.as_ref());
            }
        });

        (Self { tx }, dispatcher)
    }

    /// Queue a notification; returns false when the dispatcher is gone
    pub fn notify(&self, event: DelegateEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn connected(&self) {
        self.notify(DelegateEvent::Connected);
    }

    pub fn disconnected(&self) {
        self.notify(DelegateEvent::Disconnected);
    }

    pub fn participants_changed(&self, count: usize) {
        self.notify(DelegateEvent::ParticipantsChanged(count));
    }

    pub fn status(&self, status: impl Into<String>) {
        self.notify(DelegateEvent::Status(status.into()));
    }

    pub fn message(&self, envelope: Envelope) {
        self.notify(DelegateEvent::Message(envelope));
    }

    pub fn error(&self, error: CoordinatorError) {
        self.notify(DelegateEvent::Error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct LogDelegate {
        calls: Mutex<Vec<String>>,
    }

    impl LogDelegate {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl SessionDelegate for LogDelegate {
        fn did_connect(&self) {
            self.record("connect");
        }
        fn did_disconnect(&self) {
            self.record("disconnect");
        }
        fn participants_changed(&self, count: usize) {
            self.record(&format!("participants {count}"));
        }
        fn session_status(&self, status: &str) {
            self.record(&format!("status {status}"));
        }
        fn update_message(&self, _envelope: &Envelope) {
            self.record("message");
        }
        fn report_error(&self, error: &CoordinatorError) {
            self.record(&format!("error {error}"));
        }
    }

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let delegate = Arc::new(LogDelegate::default());
        let (notifier, dispatcher) = DelegateNotifier::spawn(delegate.clone());

        notifier.status("joined");
        notifier.connected();
        notifier.participants_changed(2);
        notifier.disconnected();
        notifier.error(CoordinatorError::NoSession);
        drop(notifier);
        dispatcher.await.unwrap();

        let calls = delegate.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "status joined",
                "connect",
                "participants 2",
                "disconnect",
                "error No group session."
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_share_one_consumer() {
        let delegate = Arc::new(LogDelegate::default());
        let (notifier, dispatcher) = DelegateNotifier::spawn(delegate.clone());

        let producers: Vec<_> = (0..8)
            .map(|i| {
                let notifier = notifier.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        notifier.participants_changed(i);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }
        drop(notifier);
        dispatcher.await.unwrap();

        let calls = delegate.calls.lock().unwrap();
        assert_eq!(calls.len(), 80);
    }

    #[tokio::test]
    async fn test_notify_after_dispatcher_stops() {
        let delegate = Arc::new(LogDelegate::default());
        let (notifier, dispatcher) = DelegateNotifier::spawn(delegate);
        dispatcher.abort();
        let _ = dispatcher.await;

        assert!(!notifier.notify(DelegateEvent::Connected));
    }
}
