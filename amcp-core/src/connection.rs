//! The public face of the client.
//!
//! A [`Connection`] owns one worker task (all socket I/O), one reconnect
//! timer and the connectivity channel. Commands are queued to the worker
//! and their results come back through a per-command [`Reply`].

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ConnectionOptions;
use crate::connectivity::{Connectivity, ConnectivityPublisher, ConnectivityWatch};
use crate::error::{AmcpError, Result};
use crate::network::Endpoint;
use crate::protocol::{VERSION_COMMAND, Version};
use crate::reconnect::Reconnector;
use crate::reply::{BlockingLines, Reply};
use crate::scheduler::{Action, Scheduler, Worker};

/// Reconnecting client for one control server.
///
/// Construction must happen inside a tokio runtime: it spawns the worker
/// and the reconnect timer and queues the first connect attempt
/// immediately. Share it behind an `Arc` to issue commands from several
/// tasks; they run strictly in submission order.
///
/// # Example
///
/// ```ignore
/// let conn = Connection::new("127.0.0.1", 5250);
/// let lines = conn.send("CLS").await?.lines().await?;
/// let version = conn.version().await?;
/// conn.close().await;
/// ```
#[derive(Debug)]
pub struct Connection {
    endpoint: Endpoint,
    goodbye_on_close: bool,
    scheduler: Scheduler,
    connectivity: ConnectivityWatch,
    reconnector: Reconnector,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Connection {
    /// Connect to `host:port` with default options.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_options(ConnectionOptions::new(host, port))
    }

    pub fn with_options(options: ConnectionOptions) -> Self {
        let endpoint = options.endpoint();
        let publisher = ConnectivityPublisher::new();
        let connectivity = publisher.watch();
        let worker = Worker::new(
            endpoint.clone(),
            options.connect_timeout(),
            options.receive_timeout(),
            publisher,
        );
        let (scheduler, handle) = Scheduler::spawn(worker);

        // Initial attempt; the worker is brand new so this cannot fail.
        let _ = scheduler.request_connect();
        let reconnector = Reconnector::spawn(scheduler.clone(), options.reconnect_interval());

        debug!(%endpoint, "connection created");
        Self {
            endpoint,
            goodbye_on_close: options.goodbye_on_close,
            scheduler,
            connectivity,
            reconnector,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    // ── Observation ──────────────────────────────────────────────

    /// Stream of connectivity transitions, starting with the current state.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.subscribe()
    }

    /// Last published connectivity state.
    pub fn is_connected(&self) -> bool {
        self.connectivity.current()
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue `command` and return its reply stream without waiting.
    ///
    /// After [`close`](Self::close) the returned reply fails with
    /// [`AmcpError::Disposed`].
    pub fn send_async(&self, command: impl Into<String>) -> Reply {
        let (tx, rx) = mpsc::unbounded_channel();

        if self.closed.load(Ordering::Acquire) {
            let _ = tx.send(Err(AmcpError::Disposed));
        } else {
            let action = Action::Execute {
                command: command.into(),
                reply: tx.clone(),
            };
            if self.scheduler.submit(action).is_err() {
                let _ = tx.send(Err(AmcpError::Disposed));
            }
        }

        Reply::new(rx)
    }

    /// Queue `command` and wait until its status line is known.
    ///
    /// Returns once the server has accepted or rejected the command; the
    /// body can then be consumed from the returned [`Reply`].
    pub async fn send(&self, command: impl Into<String>) -> Result<Reply> {
        let mut reply = self.send_async(command);
        reply.status().await?;
        Ok(reply)
    }

    /// Synchronous [`send`](Self::send): blocks the calling thread until
    /// the status line is known, then iterates the body.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn send_blocking(&self, command: impl Into<String>) -> Result<BlockingLines> {
        let mut reply = self.send_async(command);
        reply.blocking_status()?;
        Ok(reply.blocking())
    }

    /// Ask the server for its version.
    pub async fn version(&self) -> Result<Version> {
        let lines = self.send(VERSION_COMMAND).await?.lines().await?;
        lines
            .first()
            .ok_or_else(|| AmcpError::MalformedResponse("malformed version reply: empty body".into()))?
            .parse()
    }

    // ── Shutdown ─────────────────────────────────────────────────

    /// Stop reconnecting, close the socket and stop the worker.
    ///
    /// The reconnect timer is cancelled before the final reset is queued,
    /// so no reconnect can race the shutdown. Commands queued before this
    /// call still run; anything submitted afterwards fails with
    /// [`AmcpError::Disposed`]. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.reconnector.stop().await;

        if self.goodbye_on_close {
            let _ = self.scheduler.submit(Action::Goodbye);
        }
        let (done_tx, done_rx) = oneshot::channel();
        if self.scheduler.submit(Action::Shutdown { done: done_tx }).is_ok() {
            let _ = done_rx.await;
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!(endpoint = %self.endpoint, "connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.scheduler.is_closed()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Same order as `close`, without waiting for the worker.
        self.reconnector.cancel();
        if self.goodbye_on_close {
            let _ = self.scheduler.submit(Action::Goodbye);
        }
        let (done_tx, _) = oneshot::channel();
        let _ = self.scheduler.submit(Action::Shutdown { done: done_tx });
    }
}
