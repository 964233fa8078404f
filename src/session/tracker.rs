//! Bookkeeping shared between a session's reader task and its sending loop.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
struct Timestamps {
    last_sent_at: Option<Instant>,
    last_received_at: Option<Instant>,
}

/// In-flight count, timestamps and flags of one connection.
///
/// The sending loop and the inbound reader touch this concurrently; the
/// counters are atomics and the timestamps sit behind a short-lived lock.
///
/// # Examples
///
/// ```rust
/// use tokio::time::Instant;
/// use wsfuzz::session::ExchangeTracker;
///
/// let tracker = ExchangeTracker::new();
/// tracker.record_sent(Instant::now());
/// assert_eq!(tracker.in_flight(), 1);
/// tracker.record_received(Instant::now());
/// tracker.record_received(Instant::now());
/// assert_eq!(tracker.in_flight(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ExchangeTracker {
    in_flight: AtomicUsize,
    sent: AtomicUsize,
    received: AtomicUsize,
    timeouts: AtomicUsize,
    inspecting: AtomicBool,
    transport_closed: AtomicBool,
    timestamps: Mutex<Timestamps>,
}

impl ExchangeTracker {
    /// Fresh tracker: nothing sent, nothing received.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a message about to be sent. Returns the time since the
    /// last received message, or zero if nothing was received yet.
    pub fn record_sent(&self, now: Instant) -> Duration {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.sent.fetch_add(1, Ordering::SeqCst);

        let mut timestamps = self.timestamps.lock();
        timestamps.last_sent_at = Some(now);
        timestamps
            .last_received_at
            .map_or(Duration::ZERO, |at| now.saturating_duration_since(at))
    }

    /// Undo [`record_sent`](Self::record_sent) for a send that failed.
    pub fn cancel_sent(&self) {
        decrement(&self.in_flight);
        decrement(&self.sent);
    }

    /// Account for an inbound message. Returns the time since the previous
    /// inbound message, or zero for the first one.
    pub fn record_received(&self, now: Instant) -> Duration {
        decrement(&self.in_flight);
        self.received.fetch_add(1, Ordering::SeqCst);

        let mut timestamps = self.timestamps.lock();
        let previous = timestamps.last_received_at.replace(now);
        previous.map_or(Duration::ZERO, |at| now.saturating_duration_since(at))
    }

    /// Messages sent and not yet answered. Never negative: surplus
    /// responses leave it at zero.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Messages successfully handed to the transport.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Inbound messages observed.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    /// Waits that hit the ceiling.
    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    /// Time since the last send, `None` before the first one.
    pub fn since_last_sent(&self, now: Instant) -> Option<Duration> {
        self.timestamps
            .lock()
            .last_sent_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// When the last inbound message arrived.
    pub fn last_received_at(&self) -> Option<Instant> {
        self.timestamps.lock().last_received_at
    }

    /// Open or shut the classification window. Every send sets it, so it
    /// covers exactly the inbound messages that arrive while the last sent
    /// message is the newest one.
    pub fn set_inspecting(&self, inspect: bool) {
        self.inspecting.store(inspect, Ordering::SeqCst);
    }

    /// Whether an inbound message arriving now gets classified.
    pub fn is_inspecting(&self) -> bool {
        self.inspecting.load(Ordering::SeqCst)
    }

    /// Note that the inbound side has ended.
    pub fn mark_transport_closed(&self) {
        self.transport_closed.store(true, Ordering::SeqCst);
    }

    /// Whether the inbound side has ended.
    pub fn is_transport_closed(&self) -> bool {
        self.transport_closed.load(Ordering::SeqCst)
    }
}

fn decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
        Some(n.saturating_sub(1))
    });
}
