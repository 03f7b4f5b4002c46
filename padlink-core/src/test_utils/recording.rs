//! Delegates that record what they are told

use super::async_helpers::{recv_timeout, try_drain, DEFAULT_TEST_TIMEOUT};
use crate::coordinator::{CoordinatorError, DelegateEvent, SessionDelegate};
use crate::eligibility::EligibilityDelegate;
use crate::envelope::Envelope;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Session delegate that forwards every callback as a [`DelegateEvent`]
#[derive(Debug)]
pub struct RecordingDelegate {
    tx: mpsc::UnboundedSender<DelegateEvent>,
}

impl RecordingDelegate {
    pub fn new() -> (Arc<Self>, DelegateEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), DelegateEvents { rx })
    }

    fn record(&self, event: DelegateEvent) {
        let _ = self.tx.send(event);
    }
}

impl SessionDelegate for RecordingDelegate {
    fn did_connect(&self) {
        self.record(DelegateEvent::Connected);
    }

    fn did_disconnect(&self) {
        self.record(DelegateEvent::Disconnected);
    }

    fn participants_changed(&self, count: usize) {
        self.record(DelegateEvent::ParticipantsChanged(count));
    }

    fn session_status(&self, status: &str) {
        self.record(DelegateEvent::Status(status.to_string()));
    }

    fn update_message(&self, envelope: &Envelope) {
        self.record(DelegateEvent::Message(envelope.clone()));
    }

    fn report_error(&self, error: &CoordinatorError) {
        self.record(DelegateEvent::Error(error.clone()));
    }
}

/// Receiving end of a [`RecordingDelegate`]
#[derive(Debug)]
pub struct DelegateEvents {
    rx: mpsc::UnboundedReceiver<DelegateEvent>,
}

impl DelegateEvents {
    /// Next event, panicking if none arrives in time
    pub async fn next(&mut self) -> DelegateEvent {
        match recv_timeout(&mut self.rx, DEFAULT_TEST_TIMEOUT).await {
            Ok(event) => event,
            Err(e) => panic!("no delegate event: {}", e),
        }
    }

    /// Skip events until one matches, returning it
    pub async fn wait_for<F>(&mut self, mut matches: F) -> DelegateEvent
    where
        F: FnMut(&DelegateEvent) -> bool,
    {
        let mut skipped = Vec::new();
        loop {
            match recv_timeout(&mut self.rx, DEFAULT_TEST_TIMEOUT).await {
                Ok(event) if matches(&event) => return event,
                Ok(event) => skipped.push(event),
                Err(e) => panic!("expected event not seen ({}); saw {:?}", e, skipped),
            }
        }
    }

    /// Wait for the next inbound message envelope
    pub async fn next_message(&mut self) -> Envelope {
        match self.wait_for(|event| matches!(event, DelegateEvent::Message(_))).await {
            DelegateEvent::Message(envelope) => envelope,
            other => unreachable!("filtered for messages, got {:?}", other),
        }
    }

    /// Wait for the next reported error
    pub async fn next_error(&mut self) -> CoordinatorError {
        match self.wait_for(|event| matches!(event, DelegateEvent::Error(_))).await {
            DelegateEvent::Error(error) => error,
            other => unreachable!("filtered for errors, got {:?}", other),
        }
    }

    /// Everything delivered within `period`
    pub async fn collect_for(&mut self, period: Duration) -> Vec<DelegateEvent> {
        tokio::time::sleep(period).await;
        try_drain(&mut self.rx)
    }

    /// Events already delivered
    pub fn drain(&mut self) -> Vec<DelegateEvent> {
        try_drain(&mut self.rx)
    }
}

/// Eligibility delegate that forwards every value
#[derive(Debug)]
pub struct RecordingEligibility {
    tx: mpsc::UnboundedSender<bool>,
}

impl RecordingEligibility {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<bool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl EligibilityDelegate for RecordingEligibility {
    fn can_connect(&self, eligible: bool) {
        let _ = self.tx.send(eligible);
    }
}
