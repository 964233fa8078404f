//! Transport, logging and transcript plumbing shared by sessions and the
//! scheduler.

pub mod logging;
pub mod memory;
pub mod transcript;
pub mod transport;

#[cfg(feature = "websocket")]
pub mod websocket;

// Re-export commonly used types
pub use logging::{init_logging, Direction, LogConfig, LogFormat, LogLevel};
pub use memory::MemoryConnector;
pub use transcript::{SessionTranscript, TranscriptStore};
pub use transport::{Connection, Connector, MessageSink, MessageStream, TransportEvent};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketConnector};
