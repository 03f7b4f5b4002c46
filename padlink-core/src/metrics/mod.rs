//! Metrics for session coordination
//!
//! Counters are emitted through the `metrics` facade (no-ops until a recorder
//! is installed) and mirrored in a per-coordinator [`SessionMetrics`] so
//! callers can read them without an exporter.

use metrics::{counter, describe_counter};
use std::sync::atomic::{AtomicU64, Ordering};

pub const ENVELOPES_SENT: &str = "padlink.envelopes.sent";
pub const ENVELOPES_RECEIVED: &str = "padlink.envelopes.received";
pub const SEND_FAILURES: &str = "padlink.envelopes.send_failures";
pub const DECODE_FAILURES: &str = "padlink.envelopes.decode_failures";
pub const STALE_REJECTIONS: &str = "padlink.envelopes.stale_rejections";
pub const SESSIONS_CONFIGURED: &str = "padlink.sessions.configured";
pub const TEARDOWNS: &str = "padlink.sessions.teardowns";

/// Register metric descriptions with the installed recorder
pub fn init_metrics() {
    describe_counter!(ENVELOPES_SENT, "Envelopes handed to the session transport");
    describe_counter!(ENVELOPES_RECEIVED, "Inbound envelopes delivered to the delegate");
    describe_counter!(SEND_FAILURES, "Envelope sends rejected by the transport");
    describe_counter!(DECODE_FAILURES, "Inbound frames that failed to decode");
    describe_counter!(STALE_REJECTIONS, "Inbound envelopes rejected as stale");
    describe_counter!(SESSIONS_CONFIGURED, "Group sessions configured");
    describe_counter!(TEARDOWNS, "Session teardowns");
}

/// Point-in-time copy of a coordinator's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub envelopes_sent: u64,
    pub envelopes_received: u64,
    pub send_failures: u64,
    pub decode_failures: u64,
    pub stale_rejections: u64,
    pub sessions_configured: u64,
    pub teardowns: u64,
}

/// Counters for one coordinator
#[derive(Debug, Default)]
pub struct SessionMetrics {
    envelopes_sent: AtomicU64,
    envelopes_received: AtomicU64,
    send_failures: AtomicU64,
    decode_failures: AtomicU64,
    stale_rejections: AtomicU64,
    sessions_configured: AtomicU64,
    teardowns: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(local: &AtomicU64, name: &'static str) {
        local.fetch_add(1, Ordering::Relaxed);
        counter!(name).increment(1);
    }

    pub fn envelope_sent(&self) {
        Self::bump(&self.envelopes_sent, ENVELOPES_SENT);
    }

    pub fn envelope_received(&self) {
        Self::bump(&self.envelopes_received, ENVELOPES_RECEIVED);
    }

    pub fn send_failed(&self) {
        Self::bump(&self.send_failures, SEND_FAILURES);
    }

    pub fn decode_failed(&self) {
        Self::bump(&self.decode_failures, DECODE_FAILURES);
    }

    pub fn stale_rejected(&self) {
        Self::bump(&self.stale_rejections, STALE_REJECTIONS);
    }

    pub fn session_configured(&self) {
        Self::bump(&self.sessions_configured, SESSIONS_CONFIGURED);
    }

    pub fn teardown(&self) {
        Self::bump(&self.teardowns, TEARDOWNS);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            envelopes_sent: self.envelopes_sent.load(Ordering::Relaxed),
            envelopes_received: self.envelopes_received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            stale_rejections: self.stale_rejections.load(Ordering::Relaxed),
            sessions_configured: self.sessions_configured.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
        }
    }
}
