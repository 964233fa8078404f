//! One connection's full lifecycle, from handshake to close.
//!
//! A [`ConnectionSession`] owns a single transport connection and a fixed
//! [`SessionPlan`]. The first message is sent as soon as the connection is
//! open; every following message is sent only after the previous one was
//! answered or its wait timed out, so no two candidates are ever in flight
//! together on one connection. Inbound messages are drained by a separate
//! task so a slow sending loop never stalls delivery.
//!
//! Nothing that goes wrong inside a session escapes it: connection
//! failures, sends on a closed transport and network errors end up in the
//! log and in the [`SessionReport`].

mod tracker;
mod wait;

pub use tracker::ExchangeTracker;
pub use wait::{WaitOutcome, WaitPolicy};

use crate::classifier;
use crate::shared::logging::{format_event, format_exchange, session_span, Direction};
use crate::shared::transcript::{SessionTranscript, TranscriptStore};
use crate::shared::{Connection, Connector, MessageSink, MessageStream, TransportEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Opaque random session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Transport handshake in progress
    Connecting,
    /// Handshake done, nothing sent yet
    Open,
    /// Login message sent
    AwaitingLogin,
    /// Sending the next message
    SendingCandidates,
    /// Waiting for the answer to a message
    AwaitingResponse,
    /// Best-effort close in progress
    Closing,
    /// Terminal
    Closed,
}

/// Messages one session sends, in order.
///
/// `login[0]` goes out as soon as the connection opens. Remaining login
/// messages and then the candidates follow one at a time. Only responses to
/// candidates are classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    login: Vec<String>,
    candidates: Vec<String>,
}

impl SessionPlan {
    /// Build a plan. With no login messages a single empty placeholder is
    /// used, so the first candidate is always paced like the others.
    pub fn new(login: Vec<String>, candidates: Vec<String>) -> Self {
        let login = if login.is_empty() {
            vec![String::new()]
        } else {
            login
        };
        Self { login, candidates }
    }

    /// Login messages followed by a single candidate.
    pub fn single(login: &[String], candidate: String) -> Self {
        Self::new(login.to_vec(), vec![candidate])
    }

    /// All messages in send order.
    pub fn messages(&self) -> impl Iterator<Item = &str> + '_ {
        self.login
            .iter()
            .chain(self.candidates.iter())
            .map(String::as_str)
    }

    /// Candidates only.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Total number of messages.
    pub fn len(&self) -> usize {
        self.login.len() + self.candidates.len()
    }

    /// Always false: a plan has at least its login placeholder.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages with their inspect flag, in send order.
    fn steps(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.login
            .iter()
            .map(|m| (m.as_str(), false))
            .chain(self.candidates.iter().map(|m| (m.as_str(), true)))
    }
}

/// Settings shared by every session of a campaign.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Response pacing
    pub wait: WaitPolicy,
    /// How long to wait for the peer's close after closing our side
    pub close_grace: Duration,
    /// Match classifier keywords case-sensitively
    pub case_sensitive: bool,
    /// Responses containing any of these are never reported
    pub ignored_errors: Arc<[String]>,
    /// Transcript destination
    pub transcripts: Option<TranscriptStore>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            close_grace: Duration::from_secs(1),
            case_sensitive: false,
            ignored_errors: Arc::from(Vec::new()),
            transcripts: None,
        }
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session identifier
    pub id: SessionId,
    /// Tokenization batch the session belonged to
    pub batch: String,
    /// Final state; always `Closed` for a finished session
    pub state: SessionState,
    /// Messages handed to the transport
    pub sent: usize,
    /// Messages received
    pub received: usize,
    /// Waits that hit the ceiling
    pub timeouts: usize,
    /// Responses classified as relevant
    pub relevant: Vec<String>,
    /// Why the session ended early, if it did
    pub error: Option<String>,
}

/// State reachable from both the sending loop and the reader task.
#[derive(Debug)]
struct SessionInner {
    id: SessionId,
    tracker: ExchangeTracker,
    state: Mutex<SessionState>,
    relevant: Mutex<Vec<String>>,
    transcript: Option<SessionTranscript>,
    ignored_errors: Arc<[String]>,
    case_sensitive: bool,
    io_timeout: Duration,
}

impl SessionInner {
    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    fn event(&self, message: &str) -> String {
        format_event(self.id.as_str(), message)
    }

    async fn on_message(&self, text: &str) {
        let latency = self.tracker.record_received(Instant::now());
        info!(
            "{}",
            format_exchange(latency, self.id.as_str(), Direction::Received, text)
        );
        if let Some(transcript) = &self.transcript {
            transcript.record(Direction::Received, text).await;
        }

        if self.tracker.is_inspecting()
            && classifier::is_relevant(text, &self.ignored_errors[..], self.case_sensitive)
        {
            warn!("{}", self.event(&format!("Relevant response: {}", text)));
            self.relevant.lock().push(text.to_string());
        }
    }

    /// Send one message. In-flight is counted, and the sent line and
    /// transcript number are taken, before the frame goes out so a fast
    /// response cannot be accounted ahead of its request. A send that makes
    /// no progress within `io_timeout` fails like any other.
    async fn send(
        &self,
        sink: &mut dyn MessageSink,
        text: &str,
        inspect: bool,
    ) -> std::result::Result<(), String> {
        let sequence = self.transcript.as_ref().map(SessionTranscript::reserve);
        self.tracker.set_inspecting(inspect);
        let latency = self.tracker.record_sent(Instant::now());
        info!(
            "{}",
            format_exchange(latency, self.id.as_str(), Direction::Sent, text)
        );

        let failure = match timeout(self.io_timeout, sink.send(text)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_connection_closed() => {
                Some("connection already closed".to_string())
            },
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("no progress after {}ms", self.io_timeout.as_millis())),
        };
        if let Some(cause) = failure {
            self.tracker.cancel_sent();
            self.tracker.set_inspecting(false);
            let reason = format!("Send failed: {}", cause);
            error!("{}", self.event(&reason));
            return Err(reason);
        }

        if let (Some(transcript), Some(sequence)) = (&self.transcript, sequence) {
            transcript.write(sequence, Direction::Sent, text).await;
        }
        Ok(())
    }

    fn report(&self, batch: String, error: Option<String>) -> SessionReport {
        SessionReport {
            id: self.id.clone(),
            batch,
            state: *self.state.lock(),
            sent: self.tracker.sent(),
            received: self.tracker.received(),
            timeouts: self.tracker.timeouts(),
            relevant: self.relevant.lock().clone(),
            error,
        }
    }
}

/// Drains the inbound side until the peer closes or the transport fails.
async fn read_loop(inner: Arc<SessionInner>, mut stream: Box<dyn MessageStream>) {
    while let Some(event) = stream.receive().await {
        match event {
            TransportEvent::Message(text) => inner.on_message(&text).await,
            TransportEvent::Error(e) => {
                error!("{}", inner.event(&format!("Transport error: {}", e)));
                break;
            },
            TransportEvent::Closed => {
                debug!("{}", inner.event("Closed by peer"));
                break;
            },
        }
    }
    inner.tracker.mark_transport_closed();
}

/// The per-connection message exchange state machine.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use wsfuzz::session::{ConnectionSession, SessionPlan, SessionSettings, SessionState};
/// use wsfuzz::shared::MemoryConnector;
///
/// # async fn example() {
/// let connector = Arc::new(MemoryConnector::echo());
/// let plan = SessionPlan::new(vec![], vec!["{\"q\":\"x\"}".to_string()]);
/// let session = ConnectionSession::new(connector, Arc::new(SessionSettings::default()), plan, "demo");
///
/// let report = session.run().await;
/// assert_eq!(report.state, SessionState::Closed);
/// assert_eq!(report.sent, 2);
/// # }
/// ```
#[derive(Debug)]
pub struct ConnectionSession {
    inner: Arc<SessionInner>,
    connector: Arc<dyn Connector>,
    settings: Arc<SessionSettings>,
    plan: SessionPlan,
    batch: String,
}

impl ConnectionSession {
    /// Create a session; nothing happens until [`run`](Self::run).
    pub fn new(
        connector: Arc<dyn Connector>,
        settings: Arc<SessionSettings>,
        plan: SessionPlan,
        batch: impl Into<String>,
    ) -> Self {
        let id = SessionId::new();
        let batch = batch.into();
        let transcript = settings
            .transcripts
            .as_ref()
            .map(|store| store.session(&batch, id.as_str()));

        Self {
            inner: Arc::new(SessionInner {
                id,
                tracker: ExchangeTracker::new(),
                state: Mutex::new(SessionState::Connecting),
                relevant: Mutex::new(Vec::new()),
                transcript,
                ignored_errors: settings.ignored_errors.clone(),
                case_sensitive: settings.case_sensitive,
                io_timeout: settings.wait.ceiling,
            }),
            connector,
            settings,
            plan,
            batch,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Run the session to completion. Never fails; the outcome is in the
    /// report.
    pub async fn run(self) -> SessionReport {
        let span = session_span(self.inner.id.as_str());
        self.drive().instrument(span).await
    }

    async fn drive(self) -> SessionReport {
        let inner = self.inner.clone();
        inner.set_state(SessionState::Connecting);

        let Connection { mut sink, stream } = match self.connector.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                let reason = format!("Connection failed: {}", e);
                error!("{}", inner.event(&reason));
                inner.set_state(SessionState::Closed);
                return inner.report(self.batch, Some(reason));
            },
        };
        inner.set_state(SessionState::Open);
        debug!("{}", inner.event("Connection open"));

        let mut reader = tokio::spawn(read_loop(inner.clone(), stream));

        let failure = self.exchange(sink.as_mut()).await;

        inner.set_state(SessionState::Closing);
        match timeout(inner.io_timeout, sink.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => debug!("{}", inner.event(&format!("Close failed: {}", e))),
            Err(_) => debug!("{}", inner.event("Close timed out")),
        }
        drop(sink);
        if timeout(self.settings.close_grace, &mut reader).await.is_err() {
            reader.abort();
        }

        inner.set_state(SessionState::Closed);
        info!("{}", inner.event("Connection closed"));
        inner.report(self.batch, failure)
    }

    /// Send every planned message in order, pacing on responses. Returns the
    /// reason the exchange was cut short, if it was.
    async fn exchange(&self, sink: &mut dyn MessageSink) -> Option<String> {
        let inner = &self.inner;
        let wait = self.settings.wait;
        let mut steps = self.plan.steps().enumerate();

        if let Some((_, (login, inspect))) = steps.next() {
            inner.set_state(SessionState::AwaitingLogin);
            if let Err(reason) = inner.send(sink, login, inspect).await {
                return Some(reason);
            }
        }

        for (index, (text, inspect)) in steps {
            if let Some(reason) = self.await_responses(wait, index).await {
                return Some(reason);
            }

            inner.set_state(SessionState::SendingCandidates);
            if let Err(reason) = inner.send(sink, text, inspect).await {
                return Some(reason);
            }
            inner.set_state(SessionState::AwaitingResponse);
        }

        match wait.wait(&inner.tracker).await {
            WaitOutcome::Settled => {},
            WaitOutcome::TimedOut => {
                inner.tracker.record_timeout();
                info!("{}", inner.event("Timed out waiting for the last response"));
            },
            WaitOutcome::Disconnected => {
                debug!("{}", inner.event("Connection ended after the last message"));
            },
        }
        None
    }

    /// Wait before sending message `next`. A timeout is tolerated; a
    /// vanished connection ends the exchange.
    async fn await_responses(&self, wait: WaitPolicy, next: usize) -> Option<String> {
        let inner = &self.inner;
        match wait.wait(&inner.tracker).await {
            WaitOutcome::Settled => None,
            WaitOutcome::TimedOut => {
                inner.tracker.record_timeout();
                info!(
                    "{}",
                    inner.event(&format!("Timed out waiting before message {}", next))
                );
                None
            },
            WaitOutcome::Disconnected => {
                let reason = format!("Connection closed before message {}", next);
                error!("{}", inner.event(&reason));
                Some(reason)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::shared::MemoryConnector;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    /// Inbound side that stays open and never delivers anything.
    #[derive(Debug)]
    struct OpenStream;

    #[async_trait]
    impl MessageStream for OpenStream {
        async fn receive(&mut self) -> Option<TransportEvent> {
            futures::future::pending().await
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum SinkFault {
        /// Reports the connection as gone
        Closed,
        /// Never completes, like a peer that stopped reading
        Stuck,
    }

    /// Accepts the first frame, then misbehaves on every send and close.
    #[derive(Debug)]
    struct FaultyConnector(SinkFault);

    #[derive(Debug)]
    struct FaultySink {
        fault: SinkFault,
        accepted: usize,
    }

    impl FaultySink {
        async fn fail(&self) -> crate::Result<()> {
            match self.fault {
                SinkFault::Closed => Err(TransportError::ConnectionClosed.into()),
                SinkFault::Stuck => futures::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl MessageSink for FaultySink {
        async fn send(&mut self, _text: &str) -> crate::Result<()> {
            if self.accepted == 0 {
                self.accepted += 1;
                return Ok(());
            }
            self.fail().await
        }

        async fn close(&mut self) -> crate::Result<()> {
            self.fail().await
        }
    }

    #[async_trait]
    impl Connector for FaultyConnector {
        async fn connect(&self) -> crate::Result<Connection> {
            Ok(Connection {
                sink: Box::new(FaultySink {
                    fault: self.0,
                    accepted: 0,
                }),
                stream: Box::new(OpenStream),
            })
        }
    }

    /// Answers the first frame with a stack trace after `first`, later
    /// frames with a driver error after `rest`.
    #[derive(Debug)]
    struct LaggingConnector {
        first: Duration,
        rest: Duration,
    }

    #[derive(Debug)]
    struct LaggingSink {
        first: Duration,
        rest: Duration,
        sent: usize,
        tx: Option<mpsc::UnboundedSender<TransportEvent>>,
    }

    #[derive(Debug)]
    struct ChannelStream(mpsc::UnboundedReceiver<TransportEvent>);

    #[async_trait]
    impl MessageStream for ChannelStream {
        async fn receive(&mut self) -> Option<TransportEvent> {
            self.0.recv().await
        }
    }

    #[async_trait]
    impl MessageSink for LaggingSink {
        async fn send(&mut self, _text: &str) -> crate::Result<()> {
            let tx = self.tx.clone().ok_or(TransportError::ConnectionClosed)?;
            let (delay, reply) = if self.sent == 0 {
                (self.first, "Traceback (most recent call last)")
            } else {
                (self.rest, "java.lang.NullPointerException")
            };
            self.sent += 1;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(TransportEvent::Message(reply.to_string()));
            });
            Ok(())
        }

        async fn close(&mut self) -> crate::Result<()> {
            if let Some(tx) = self.tx.take() {
                let _ = tx.send(TransportEvent::Closed);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for LaggingConnector {
        async fn connect(&self) -> crate::Result<Connection> {
            let (tx, rx) = mpsc::unbounded_channel();
            Ok(Connection {
                sink: Box::new(LaggingSink {
                    first: self.first,
                    rest: self.rest,
                    sent: 0,
                    tx: Some(tx),
                }),
                stream: Box::new(ChannelStream(rx)),
            })
        }
    }

    fn settings() -> Arc<SessionSettings> {
        Arc::new(SessionSettings::default())
    }

    fn session(connector: &Arc<MemoryConnector>, plan: SessionPlan) -> ConnectionSession {
        ConnectionSession::new(connector.clone(), settings(), plan, "test")
    }

    #[test]
    fn plan_without_login_gets_placeholder() {
        let plan = SessionPlan::new(vec![], vec!["a".into()]);
        assert_eq!(plan.messages().collect::<Vec<_>>(), vec!["", "a"]);
        assert_eq!(plan.len(), 2);
        assert!(!plan.is_empty());
    }

    #[test]
    fn plan_marks_only_candidates_for_inspection() {
        let plan = SessionPlan::new(vec!["l1".into(), "l2".into()], vec!["c".into()]);
        let steps: Vec<_> = plan.steps().collect();
        assert_eq!(steps, vec![("l1", false), ("l2", false), ("c", true)]);
    }

    #[test]
    fn new_session_starts_connecting() {
        let connector = Arc::new(MemoryConnector::echo());
        let session = session(&connector, SessionPlan::new(vec![], vec![]));
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.id().as_str().len(), 32);
    }

    #[tokio::test(start_paused = true)]
    async fn echo_target_exchanges_everything_in_order() {
        let connector = Arc::new(MemoryConnector::echo());
        let plan = SessionPlan::new(
            vec!["login".into()],
            vec!["c1".into(), "c2".into(), "c3".into()],
        );

        let report = session(&connector, plan).run().await;

        assert_eq!(report.state, SessionState::Closed);
        assert_eq!(report.sent, 4);
        assert_eq!(report.received, 4);
        assert_eq!(report.timeouts, 0);
        assert!(report.error.is_none());
        assert!(report.relevant.is_empty());
        assert_eq!(
            connector.sent_frames(),
            vec![vec![
                "login".to_string(),
                "c1".to_string(),
                "c2".to_string(),
                "c3".to_string()
            ]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn only_candidate_responses_are_classified() {
        let connector = Arc::new(MemoryConnector::new(|text| {
            if text.is_empty() {
                vec!["Traceback (most recent call last)".to_string()]
            } else {
                vec!["java.lang.NullPointerException".to_string()]
            }
        }));
        let plan = SessionPlan::new(vec![], vec!["{\"a\":\"'\"}".into()]);

        let report = session(&connector, plan).run().await;

        assert_eq!(report.relevant, vec!["java.lang.NullPointerException"]);
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_errors_suppress_findings() {
        let connector = Arc::new(MemoryConnector::new(|_| {
            vec!["Exception: request rejected".to_string()]
        }));
        let settings = Arc::new(SessionSettings {
            ignored_errors: Arc::from(vec!["REQUEST REJECTED".to_string()]),
            ..Default::default()
        });
        let plan = SessionPlan::new(vec![], vec!["x".into()]);

        let report = ConnectionSession::new(connector, settings, plan, "test")
            .run()
            .await;
        assert!(report.relevant.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_target_times_out_and_closes() {
        let connector = Arc::new(MemoryConnector::silent());
        let plan = SessionPlan::new(vec![], vec!["x".into()]);
        let policy = WaitPolicy::default();

        let start = Instant::now();
        let report = session(&connector, plan).run().await;
        let elapsed = start.elapsed();

        assert_eq!(report.state, SessionState::Closed);
        assert_eq!(report.sent, 2);
        assert_eq!(report.received, 0);
        assert_eq!(report.timeouts, 2);
        assert!(report.error.is_none());
        // Two bounded waits plus the close grace period.
        let bound = (policy.ceiling + policy.poll_interval) * 2 + Duration::from_secs(1);
        assert!(elapsed <= bound, "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn refused_connection_is_contained() {
        let connector = Arc::new(MemoryConnector::refusing());
        let plan = SessionPlan::new(vec![], vec!["x".into()]);

        let report = session(&connector, plan).run().await;

        assert_eq!(report.state, SessionState::Closed);
        assert_eq!(report.sent, 0);
        assert!(report.error.unwrap().contains("Connection failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn peer_hangup_stops_the_exchange() {
        let connector = Arc::new(MemoryConnector::echo().with_close_after(1));
        let plan = SessionPlan::new(vec![], vec!["c1".into(), "c2".into()]);

        let report = session(&connector, plan).run().await;

        assert_eq!(report.state, SessionState::Closed);
        assert_eq!(report.sent, 1);
        assert!(report.error.is_some());
        assert_eq!(connector.sent_frames(), vec![vec![String::new()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn send_on_closed_transport_ends_the_session() {
        let plan = SessionPlan::new(vec![], vec!["c1".into(), "c2".into()]);

        let report = ConnectionSession::new(
            Arc::new(FaultyConnector(SinkFault::Closed)),
            settings(),
            plan,
            "test",
        )
        .run()
        .await;

        assert_eq!(report.state, SessionState::Closed);
        // Only the placeholder got through; the failed candidate is not counted.
        assert_eq!(report.sent, 1);
        assert_eq!(report.received, 0);
        assert_eq!(report.timeouts, 1);
        assert_eq!(
            report.error.as_deref(),
            Some("Send failed: connection already closed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn peer_that_stops_reading_cannot_stall_the_session() {
        let settings = settings();
        let policy = settings.wait;
        let plan = SessionPlan::new(vec![], vec!["x".repeat(1 << 20)]);

        let start = Instant::now();
        let report = ConnectionSession::new(
            Arc::new(FaultyConnector(SinkFault::Stuck)),
            settings.clone(),
            plan,
            "test",
        )
        .run()
        .await;
        let elapsed = start.elapsed();

        assert_eq!(report.state, SessionState::Closed);
        assert_eq!(report.sent, 1);
        assert!(report.error.unwrap().starts_with("Send failed: no progress"));
        // One wait, one bounded send, one bounded close, then the grace period.
        let bound = policy.ceiling * 3 + policy.poll_interval + settings.close_grace;
        assert!(elapsed <= bound, "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_login_reply_does_not_hide_the_candidate_reply() {
        let policy = WaitPolicy::default();
        let connector = Arc::new(LaggingConnector {
            first: policy.ceiling + Duration::from_secs(1),
            rest: Duration::from_secs(2),
        });
        let plan = SessionPlan::new(vec![], vec!["{\"a\":\"'\"}".into()]);

        let report = ConnectionSession::new(connector, settings(), plan, "test")
            .run()
            .await;

        assert_eq!(report.timeouts, 1);
        assert_eq!(report.received, 2);
        assert!(report.error.is_none());
        assert!(report
            .relevant
            .contains(&"java.lang.NullPointerException".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responses_keep_one_message_in_flight() {
        let connector = Arc::new(
            MemoryConnector::echo().with_reply_delay(Duration::from_millis(3_000)),
        );
        let plan = SessionPlan::new(vec![], vec!["c1".into(), "c2".into()]);

        let report = session(&connector, plan).run().await;

        assert_eq!(report.sent, 3);
        assert_eq!(report.received, 3);
        assert_eq!(report.timeouts, 0);
    }
}
