//! Transport layer abstraction.
//!
//! A fuzz session needs a full-duplex, message-framed connection whose
//! inbound side can be drained by one task while another task sends. A
//! [`Connector`] therefore hands out the two halves separately.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Something observed on the inbound side of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text message. Binary frames are decoded lossily.
    Message(String),
    /// An asynchronous network error. The connection is unusable afterwards.
    Error(String),
    /// The peer closed the connection.
    Closed,
}

/// Outbound half of a connection.
///
/// # Examples
///
/// ```rust
/// use wsfuzz::shared::MessageSink;
/// use async_trait::async_trait;
///
/// #[derive(Debug, Default)]
/// struct Recorder(Vec<String>);
///
/// #[async_trait]
/// impl MessageSink for Recorder {
///     async fn send(&mut self, text: &str) -> wsfuzz::Result<()> {
///         self.0.push(text.to_string());
///         Ok(())
///     }
///
///     async fn close(&mut self) -> wsfuzz::Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageSink: Send + Debug {
    /// Send one text message as a single frame.
    async fn send(&mut self, text: &str) -> Result<()>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;

    /// Whether the sink still accepts messages.
    ///
    /// Default implementation always returns true.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Inbound half of a connection.
#[async_trait]
pub trait MessageStream: Send + Debug {
    /// Wait for the next inbound event. `None` once the stream is exhausted.
    async fn receive(&mut self) -> Option<TransportEvent>;
}

/// An established connection, split into halves.
#[derive(Debug)]
pub struct Connection {
    /// Outbound half
    pub sink: Box<dyn MessageSink>,
    /// Inbound half
    pub stream: Box<dyn MessageStream>,
}

/// Opens connections to the fuzz target.
///
/// One connector is shared by every session of a campaign, so
/// implementations must be cheap to call concurrently.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Perform the transport handshake.
    async fn connect(&self) -> Result<Connection>;

    /// Get the transport type name for debugging.
    fn transport_type(&self) -> &'static str {
        "unknown"
    }
}
