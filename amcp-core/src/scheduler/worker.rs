use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Action, ActionReceiver, ReplySender};
use crate::codec::validate_command;
use crate::connectivity::ConnectivityPublisher;
use crate::error::{AmcpError, Result};
use crate::network::{Endpoint, Liveness, Transport};
use crate::protocol::{Framing, GOODBYE_COMMAND, StatusCode};

/// State owned by the worker task. Nothing else holds the transport.
#[derive(Debug)]
pub(crate) struct Worker {
    endpoint: Endpoint,
    connect_timeout: Duration,
    receive_timeout: Duration,
    transport: Option<Transport>,
    connectivity: ConnectivityPublisher,
}

impl Worker {
    pub(crate) fn new(
        endpoint: Endpoint,
        connect_timeout: Duration,
        receive_timeout: Duration,
        connectivity: ConnectivityPublisher,
    ) -> Self {
        Self {
            endpoint,
            connect_timeout,
            receive_timeout,
            transport: None,
            connectivity,
        }
    }

    pub(crate) async fn run(mut self, mut rx: ActionReceiver, connect_queued: Arc<AtomicBool>) {
        let mut done = None;
        while let Some(action) = rx.recv().await {
            match action {
                Action::Connect => {
                    connect_queued.store(false, Ordering::Release);
                    if let Err(e) = self.ensure_connected().await {
                        debug!(endpoint = %self.endpoint, "reconnect attempt failed: {e}");
                    }
                }
                Action::Execute { command, reply } => self.execute(&command, &reply).await,
                Action::Goodbye => self.goodbye().await,
                Action::Shutdown { done: tx } => {
                    done = Some(tx);
                    break;
                }
            }
        }

        // Anything still queued is dropped with the receiver; its callers
        // see their reply channel close.
        drop(rx);
        self.reset();
        debug!(endpoint = %self.endpoint, "worker stopped");
        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    // ── Connection management ────────────────────────────────────

    /// Return a live transport, reconnecting at most once.
    async fn ensure_connected(&mut self) -> Result<&mut Transport> {
        let alive = match self.transport.as_ref().map(Transport::probe) {
            Some(Liveness::Open) => true,
            Some(Liveness::Closed(e)) => {
                info!(endpoint = %self.endpoint, "connection lost: {e}");
                false
            }
            None => false,
        };

        if alive {
            self.connectivity.publish(true);
        } else {
            self.reset();
            self.connect().await?;
        }

        self.transport
            .as_mut()
            .ok_or_else(|| AmcpError::NotConnected(self.endpoint.to_string()))
    }

    async fn connect(&mut self) -> Result<()> {
        match Transport::connect(&self.endpoint, self.connect_timeout, self.receive_timeout).await {
            Ok(transport) => {
                info!(endpoint = %self.endpoint, peer = %transport.peer_addr(), "connected");
                self.transport = Some(transport);
                self.connectivity.publish(true);
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(AmcpError::NotConnected(format!("{} ({e})", self.endpoint)))
            }
        }
    }

    /// Drop the transport, if any, and publish `false`.
    fn reset(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        if self.connectivity.publish(false) {
            info!(endpoint = %self.endpoint, "disconnected");
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    async fn execute(&mut self, command: &str, reply: &ReplySender) {
        if let Err(err) = self.exchange(command, reply).await {
            if err.is_transport() {
                warn!(endpoint = %self.endpoint, command, "transport failure, resetting: {err}");
                self.reset();
            } else {
                debug!(command, "command failed: {err}");
            }
            let _ = reply.send(Err(err));
        }
    }

    /// Write `command` and forward its framed reply.
    async fn exchange(&mut self, command: &str, reply: &ReplySender) -> Result<()> {
        validate_command(command)?;

        let transport = self.ensure_connected().await?;
        transport.write_line(command).await?;

        let status = transport.read_line().await?;
        let framing = StatusCode::parse(&status)?.framing();
        debug!(command, status = %status, ?framing, "reply");

        if let Framing::Failed(failure) = framing {
            return Err(AmcpError::Protocol { failure, status });
        }
        let _ = reply.send(Ok(status));

        match framing {
            Framing::SingleLine => {
                let line = transport.read_line().await?;
                let _ = reply.send(Ok(line));
            }
            Framing::UntilEmptyLine => loop {
                let line = transport.read_line().await?;
                if line.is_empty() {
                    break;
                }
                let _ = reply.send(Ok(line));
            },
            Framing::StatusOnly | Framing::Failed(_) => {}
        }
        Ok(())
    }

    async fn goodbye(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.write_line(GOODBYE_COMMAND).await {
            debug!(endpoint = %self.endpoint, "goodbye not delivered: {e}");
        }
    }
}
