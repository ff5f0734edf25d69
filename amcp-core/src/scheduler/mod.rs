//! Serialized execution of every socket operation.
//!
//! A single worker task drains a FIFO of [`Action`]s and runs each one to
//! completion before dequeuing the next. It is the only code that ever
//! touches the [`Transport`](crate::network::Transport), so reads and
//! writes of different commands can never interleave with each other or
//! with a reconnect.

mod worker;

pub(crate) use worker::Worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{AmcpError, Result};

/// Items delivered to a command's caller: the status line, then body
/// lines, or a single error. Closing the channel signals completion.
pub(crate) type ReplySender = mpsc::UnboundedSender<Result<String>>;
pub(crate) type ReplyReceiver = mpsc::UnboundedReceiver<Result<String>>;
pub(crate) type ActionReceiver = mpsc::UnboundedReceiver<Action>;

/// Unit of work for the worker.
#[derive(Debug)]
pub(crate) enum Action {
    /// Probe the socket and reconnect if it is gone.
    Connect,
    /// Send one command and stream its reply.
    Execute { command: String, reply: ReplySender },
    /// Best-effort farewell line on a live socket.
    Goodbye,
    /// Close the socket and stop the worker.
    Shutdown { done: oneshot::Sender<()> },
}

/// Submission side of the worker queue.
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    tx: mpsc::UnboundedSender<Action>,
    connect_queued: Arc<AtomicBool>,
}

impl Scheduler {
    /// Start the worker on the current tokio runtime.
    pub(crate) fn spawn(worker: Worker) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connect_queued = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(worker.run(rx, Arc::clone(&connect_queued)));
        (Self { tx, connect_queued }, handle)
    }

    /// Enqueue an action. Never blocks.
    pub(crate) fn submit(&self, action: Action) -> Result<()> {
        self.tx.send(action).map_err(AmcpError::from)
    }

    /// Enqueue a connect attempt unless one is already waiting.
    pub(crate) fn request_connect(&self) -> Result<()> {
        if self.connect_queued.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.submit(Action::Connect).inspect_err(|_| {
            self.connect_queued.store(false, Ordering::Release);
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
