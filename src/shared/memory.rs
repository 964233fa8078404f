//! In-process transport.
//!
//! Every connection is backed by a channel; a responder closure plays the
//! role of the target service and maps each sent frame to zero or more
//! reply frames. Used for dry runs and for exercising sessions without a
//! network.

use crate::error::{Result, TransportError};
use crate::shared::{Connection, Connector, MessageSink, MessageStream, TransportEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Maps one sent frame to the frames the simulated peer answers with.
pub type Responder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Connector for in-process simulated peers.
///
/// # Examples
///
/// ```rust
/// use wsfuzz::shared::{Connector, MemoryConnector, TransportEvent};
///
/// # async fn example() -> wsfuzz::Result<()> {
/// let connector = MemoryConnector::echo();
/// let mut connection = connector.connect().await?;
/// connection.sink.send("ping").await?;
/// assert_eq!(
///     connection.stream.receive().await,
///     Some(TransportEvent::Message("ping".to_string()))
/// );
/// assert_eq!(connector.sent_frames(), vec![vec!["ping".to_string()]]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryConnector {
    responder: Responder,
    reply_delay: Duration,
    close_after: Option<usize>,
    refuse: bool,
    connections: Arc<Mutex<Vec<Arc<Mutex<Vec<String>>>>>>,
}

impl std::fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("reply_delay", &self.reply_delay)
            .field("close_after", &self.close_after)
            .field("refuse", &self.refuse)
            .field("connections", &self.connections.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryConnector {
    /// Create a connector whose peers answer with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            reply_delay: Duration::ZERO,
            close_after: None,
            refuse: false,
            connections: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Peers that answer every frame with the same frame.
    pub fn echo() -> Self {
        Self::new(|text| vec![text.to_string()])
    }

    /// Peers that never answer.
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// Peers that refuse every connection attempt.
    pub fn refusing() -> Self {
        let mut connector = Self::silent();
        connector.refuse = true;
        connector
    }

    /// Delay every reply by `delay`.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Have the peer hang up once it has received `sends` frames.
    pub fn with_close_after(mut self, sends: usize) -> Self {
        self.close_after = Some(sends);
        self
    }

    /// Frames received by each simulated peer, in connection order.
    pub fn sent_frames(&self) -> Vec<Vec<String>> {
        self.connections
            .lock()
            .iter()
            .map(|frames| frames.lock().clone())
            .collect()
    }

    /// Number of connections opened so far.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Connection> {
        if self.refuse {
            return Err(TransportError::Handshake("connection refused".into()).into());
        }

        let frames = Arc::new(Mutex::new(Vec::new()));
        self.connections.lock().push(frames.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Connection {
            sink: Box::new(MemorySink {
                responder: self.responder.clone(),
                reply_delay: self.reply_delay,
                close_after: self.close_after,
                frames,
                tx: Some(tx),
            }),
            stream: Box::new(MemoryStream { rx }),
        })
    }

    fn transport_type(&self) -> &'static str {
        "memory"
    }
}

struct MemorySink {
    responder: Responder,
    reply_delay: Duration,
    close_after: Option<usize>,
    frames: Arc<Mutex<Vec<String>>>,
    tx: Option<mpsc::UnboundedSender<TransportEvent>>,
}

impl std::fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySink")
            .field("open", &self.tx.is_some())
            .field("sent", &self.frames.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&mut self, text: &str) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;

        let sent = {
            let mut frames = self.frames.lock();
            frames.push(text.to_string());
            frames.len()
        };

        for reply in (self.responder)(text) {
            if self.reply_delay.is_zero() {
                let _ = tx.send(TransportEvent::Message(reply));
            } else {
                let tx = tx.clone();
                let delay = self.reply_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(TransportEvent::Message(reply));
                });
            }
        }

        if self.close_after.is_some_and(|limit| sent >= limit) {
            let _ = tx.send(TransportEvent::Closed);
            self.tx = None;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(TransportEvent::Closed);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.tx.is_some()
    }
}

#[derive(Debug)]
struct MemoryStream {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl MessageStream for MemoryStream {
    async fn receive(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}
