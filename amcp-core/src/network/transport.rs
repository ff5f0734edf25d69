//! One live TCP socket framed as CRLF lines.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::LineCodec;
use crate::error::{AmcpError, Result};
use crate::network::probe::{self, Liveness};

// ── Endpoint ─────────────────────────────────────────────────────

/// Host and port of the control server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Transport ────────────────────────────────────────────────────

/// Exclusive owner of one connected socket.
///
/// Any I/O error leaves the transport in an unknown state; the owner is
/// expected to drop it and connect a fresh one.
#[derive(Debug)]
pub struct Transport {
    framed: Framed<TcpStream, LineCodec>,
    peer: SocketAddr,
    receive_timeout: Duration,
}

impl Transport {
    /// Open a new TCP connection.
    pub async fn connect(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        receive_timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(
            connect_timeout,
            TcpStream::connect((endpoint.host(), endpoint.port())),
        )
        .await
        .map_err(|_| AmcpError::Timeout(connect_timeout))??;
        stream.set_nodelay(true)?;

        let peer = stream.peer_addr()?;
        debug!(%peer, "transport connected");

        Ok(Self {
            framed: Framed::new(stream, LineCodec::new()),
            peer,
            receive_timeout,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Write one command line and flush it.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.framed.send(line).await
    }

    /// Read the next CRLF-terminated line.
    ///
    /// End of stream and an expired receive timeout are both transport
    /// failures.
    pub async fn read_line(&mut self) -> Result<String> {
        match tokio::time::timeout(self.receive_timeout, self.framed.next()).await {
            Ok(Some(line)) => line,
            Ok(None) => Err(AmcpError::ConnectionClosed),
            Err(_) => Err(AmcpError::Timeout(self.receive_timeout)),
        }
    }

    /// Run the liveness probe against the socket.
    pub fn probe(&self) -> Liveness {
        probe::probe(self.framed.get_ref())
    }

    pub fn is_open(&self) -> bool {
        self.probe().is_open()
    }

    /// Close the socket. Consumes the transport, so a closed transport
    /// can never be read from again.
    pub fn close(self) {
        debug!(peer = %self.peer, "transport closed");
        drop(self.framed);
    }
}
