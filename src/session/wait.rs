//! Timeout-bounded waiting for responses.

use super::ExchangeTracker;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Pacing of the sending loop.
///
/// A wait ends as soon as nothing is in flight and at least `quiescence`
/// has passed since the last send, or unconditionally once `ceiling` has
/// elapsed. The in-flight count is polled every `poll_interval`, so a wait
/// never lasts longer than `ceiling + poll_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// How often the in-flight count is checked
    pub poll_interval: Duration,
    /// Hard limit on a single wait
    pub ceiling: Duration,
    /// Minimum quiet period after a send
    pub quiescence: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            ceiling: Duration::from_secs(5),
            quiescence: Duration::from_secs(2),
        }
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    /// All responses arrived and the quiet period passed
    Settled,
    /// The ceiling elapsed first
    TimedOut,
    /// The inbound side of the connection ended
    Disconnected,
}

impl WaitPolicy {
    /// Wait until `tracker` settles, the connection ends or the ceiling
    /// elapses. Sleeps between polls; never busy-waits.
    pub async fn wait(&self, tracker: &ExchangeTracker) -> WaitOutcome {
        let start = Instant::now();
        loop {
            if tracker.is_transport_closed() {
                return WaitOutcome::Disconnected;
            }

            let now = Instant::now();
            let quiet = tracker
                .since_last_sent(now)
                .map_or(true, |elapsed| elapsed >= self.quiescence);
            if tracker.in_flight() == 0 && quiet {
                return WaitOutcome::Settled;
            }
            if now.saturating_duration_since(start) >= self.ceiling {
                return WaitOutcome::TimedOut;
            }

            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> WaitPolicy {
        WaitPolicy::default()
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_send_times_out_within_bound() {
        let tracker = ExchangeTracker::new();
        tracker.record_sent(Instant::now());

        let start = Instant::now();
        let outcome = policy().wait(&tracker).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(elapsed >= policy().ceiling);
        assert!(elapsed <= policy().ceiling + policy().poll_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn answered_send_settles_after_quiescence() {
        let tracker = ExchangeTracker::new();
        let start = Instant::now();
        tracker.record_sent(start);
        tracker.record_received(start);

        let outcome = policy().wait(&tracker).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::Settled);
        assert!(elapsed >= policy().quiescence);
        assert!(elapsed < policy().ceiling);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_sent_settles_immediately() {
        let tracker = ExchangeTracker::new();
        let start = Instant::now();
        assert_eq!(policy().wait(&tracker).await, WaitOutcome::Settled);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_transport_ends_wait() {
        let tracker = ExchangeTracker::new();
        tracker.record_sent(Instant::now());
        tracker.mark_transport_closed();
        assert_eq!(policy().wait(&tracker).await, WaitOutcome::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_releases_wait_before_ceiling() {
        let tracker = std::sync::Arc::new(ExchangeTracker::new());
        let start = Instant::now();
        tracker.record_sent(start);

        let responder = tracker.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(3_000)).await;
            responder.record_received(Instant::now());
        });

        let outcome = policy().wait(&tracker).await;
        let elapsed = start.elapsed();
        assert_eq!(outcome, WaitOutcome::Settled);
        assert!(elapsed >= Duration::from_millis(3_000));
        assert!(elapsed <= Duration::from_millis(3_000) + policy().poll_interval);
    }
}
