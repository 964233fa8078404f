//! WebSocket transport implementation.
//!
//! Targets are usually test deployments with self-signed certificates, so
//! `wss://` connections skip certificate and hostname verification. An
//! upstream HTTP proxy is reached with a `CONNECT` tunnel before the
//! WebSocket handshake.

use crate::config::ProxyConfig;
use crate::error::{Error, Result, TransportError};
use crate::shared::{Connection, Connector, MessageSink, MessageStream, TransportEvent};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{client_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Largest proxy response header we are willing to read.
const MAX_PROXY_RESPONSE: usize = 8 * 1024;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// WebSocket URL to connect to
    pub url: Url,
    /// Optional upstream HTTP proxy
    pub proxy: Option<ProxyConfig>,
    /// Bound on TCP connect, proxy tunnel and handshake together
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/".parse().expect("Valid default URL"),
            proxy: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Connector producing WebSocket connections.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    /// Create a connector with the given configuration.
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// The connector configuration.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    async fn connect_once(&self) -> Result<Connection> {
        let url = &self.config.url;
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::Handshake(format!("URL has no host: {}", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TransportError::Handshake(format!("URL has no port: {}", url)))?;

        let tcp = match &self.config.proxy {
            Some(proxy) => open_tunnel(proxy, host, port).await?,
            None => TcpStream::connect((host, port))
                .await
                .map_err(TransportError::from)?,
        };

        let tls = if url.scheme() == "wss" {
            tokio_tungstenite::Connector::NativeTls(insecure_tls()?)
        } else {
            tokio_tungstenite::Connector::Plain
        };

        let (socket, _response) = client_async_tls_with_config(url.as_str(), tcp, None, Some(tls))
            .await
            .map_err(TransportError::from)?;
        debug!("WebSocket connected to {}", url);

        let (sink, stream) = socket.split();
        Ok(Connection {
            sink: Box::new(WebSocketSink { sink, open: true }),
            stream: Box::new(WebSocketInbound { stream }),
        })
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Connection> {
        let limit = self.config.connect_timeout;
        timeout(limit, self.connect_once())
            .await
            .map_err(|_| Error::Timeout(limit.as_millis() as u64))?
    }

    fn transport_type(&self) -> &'static str {
        "websocket"
    }
}

/// TLS connector that accepts any certificate for any host name.
fn insecure_tls() -> Result<native_tls::TlsConnector> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(TransportError::from)?;
    Ok(connector)
}

/// Open an HTTP `CONNECT` tunnel to `host:port` through `proxy`.
async fn open_tunnel(proxy: &ProxyConfig, host: &str, port: u16) -> Result<TcpStream> {
    info!("Tunnelling to {}:{} through proxy {}", host, port, proxy);
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port))
        .await
        .map_err(TransportError::from)?;

    let request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\nProxy-Connection: keep-alive\r\n\r\n"
    );
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(TransportError::from)?;

    // Byte at a time so nothing past the header is consumed.
    let mut header = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !header.ends_with(b"\r\n\r\n") {
        if header.len() >= MAX_PROXY_RESPONSE {
            return Err(TransportError::Proxy("response header too large".into()).into());
        }
        let read = stream
            .read(&mut byte)
            .await
            .map_err(TransportError::from)?;
        if read == 0 {
            return Err(TransportError::Proxy("proxy closed the connection".into()).into());
        }
        header.push(byte[0]);
    }

    let header = String::from_utf8_lossy(&header);
    let status_line = header.lines().next().unwrap_or_default();
    if !tunnel_established(status_line) {
        return Err(TransportError::Proxy(format!("tunnel refused: {}", status_line)).into());
    }
    Ok(stream)
}

fn tunnel_established(status_line: &str) -> bool {
    let mut parts = status_line.split_whitespace();
    matches!(
        (parts.next(), parts.next()),
        (Some(version), Some(code)) if version.starts_with("HTTP/1.") && code.starts_with('2')
    )
}

/// Outbound half of a WebSocket connection.
struct WebSocketSink {
    sink: SplitSink<Socket, Message>,
    open: bool,
}

impl std::fmt::Debug for WebSocketSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSink")
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

fn map_ws_error(error: tungstenite::Error) -> Error {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::ConnectionClosed.into()
        },
        other => TransportError::WebSocket(other).into(),
    }
}

#[async_trait]
impl MessageSink for WebSocketSink {
    async fn send(&mut self, text: &str) -> Result<()> {
        if !self.open {
            return Err(TransportError::ConnectionClosed.into());
        }
        self.sink
            .send(Message::text(text.to_string()))
            .await
            .map_err(|e| {
                self.open = false;
                map_ws_error(e)
            })
    }

    async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.sink.close().await.map_err(map_ws_error)
    }

    fn is_connected(&self) -> bool {
        self.open
    }
}

/// Inbound half of a WebSocket connection.
struct WebSocketInbound {
    stream: SplitStream<Socket>,
}

impl std::fmt::Debug for WebSocketInbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketInbound").finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageStream for WebSocketInbound {
    async fn receive(&mut self) -> Option<TransportEvent> {
        loop {
            let event = match self.stream.next().await? {
                Ok(Message::Text(text)) => TransportEvent::Message(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => {
                    TransportEvent::Message(String::from_utf8_lossy(&data).into_owned())
                },
                Ok(Message::Close(frame)) => {
                    debug!("WebSocket closed by remote: {:?}", frame);
                    TransportEvent::Closed
                },
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(e) => TransportEvent::Error(e.to_string()),
            };
            return Some(event);
        }
    }
}
