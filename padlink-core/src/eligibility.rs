//! Call eligibility monitoring
//!
//! Forwards the provider's "a call that could host the activity is in
//! progress" signal to a delegate, starting with the current value.

use crate::coordinator::TaskHandle;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Receives eligibility changes
pub trait EligibilityDelegate: Send + Sync {
    fn can_connect(&self, eligible: bool);
}

/// Subscription to an eligibility signal; dropping it stops forwarding
#[derive(Debug)]
pub struct EligibilityMonitor {
    signal: watch::Receiver<bool>,
    _subscription: TaskHandle,
}

impl EligibilityMonitor {
    /// Must be called inside a Tokio runtime
    pub fn new(signal: watch::Receiver<bool>, delegate: Arc<dyn EligibilityDelegate>) -> Self {
        let mut updates = signal.clone();

        let subscription = TaskHandle::spawn("eligibility", move |mut cancel| async move {
            loop {
                let eligible = *updates.borrow_and_update();
                debug!(eligible, "Call eligibility");
                delegate.can_connect(eligible);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            signal,
            _subscription: subscription,
        }
    }

    /// Latest observed eligibility
    pub fn can_connect(&self) -> bool {
        *self.signal.borrow()
    }
}
