//! Caller-side view of a command's result channel.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::{Stream, TryStreamExt};

use crate::error::{AmcpError, Result};
use crate::scheduler::ReplyReceiver;

/// Body lines of one command, produced by the worker as it reads them.
///
/// The first item the worker delivers is the status line; it is kept
/// aside (see [`Reply::status`]) and never yielded as a body line. The
/// stream ends after the last body line, or after yielding the error
/// that failed the command.
#[derive(Debug)]
pub struct Reply {
    rx: ReplyReceiver,
    status: Option<String>,
    terminated: bool,
}

enum Step {
    Skip,
    Yield(Option<Result<String>>),
}

impl Reply {
    pub(crate) fn new(rx: ReplyReceiver) -> Self {
        Self {
            rx,
            status: None,
            terminated: false,
        }
    }

    /// Wait for the status line.
    ///
    /// Resolves as soon as the server has classified the command, before
    /// any body line is read.
    pub async fn status(&mut self) -> Result<&str> {
        if self.status.is_none() {
            let item = self.rx.recv().await;
            self.accept_status(item)?;
        }
        Ok(self.status.as_deref().unwrap_or_default())
    }

    /// Blocking variant of [`status`](Self::status) for synchronous callers.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_status(&mut self) -> Result<&str> {
        if self.status.is_none() {
            let item = self.rx.blocking_recv();
            self.accept_status(item)?;
        }
        Ok(self.status.as_deref().unwrap_or_default())
    }

    /// Drain every body line.
    pub async fn lines(self) -> Result<Vec<String>> {
        self.try_collect().await
    }

    /// Iterate the body from a synchronous thread.
    pub fn blocking(self) -> BlockingLines {
        BlockingLines { reply: self }
    }

    fn accept_status(&mut self, item: Option<Result<String>>) -> Result<()> {
        match item {
            Some(Ok(status)) => {
                self.status = Some(status);
                Ok(())
            }
            Some(Err(e)) => {
                self.terminated = true;
                Err(e)
            }
            None => {
                self.terminated = true;
                Err(AmcpError::Disposed)
            }
        }
    }

    fn step(&mut self, item: Option<Result<String>>) -> Step {
        match item {
            Some(Ok(line)) if self.status.is_none() => {
                self.status = Some(line);
                Step::Skip
            }
            Some(Ok(line)) => Step::Yield(Some(Ok(line))),
            Some(Err(e)) => {
                self.terminated = true;
                Step::Yield(Some(Err(e)))
            }
            // Closed before a status line: the action never ran.
            None if self.status.is_none() => {
                self.terminated = true;
                Step::Yield(Some(Err(AmcpError::Disposed)))
            }
            None => {
                self.terminated = true;
                Step::Yield(None)
            }
        }
    }
}

impl Stream for Reply {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.terminated {
                return Poll::Ready(None);
            }
            let item = ready!(this.rx.poll_recv(cx));
            if let Step::Yield(out) = this.step(item) {
                return Poll::Ready(out);
            }
        }
    }
}

// ── BlockingLines ────────────────────────────────────────────────

/// Iterator over a reply's body for callers outside the runtime.
#[derive(Debug)]
pub struct BlockingLines {
    reply: Reply,
}

impl BlockingLines {
    /// The status line, once it has been received.
    pub fn status(&self) -> Option<&str> {
        self.reply.status.as_deref()
    }
}

impl Iterator for BlockingLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.reply.terminated {
                return None;
            }
            let item = self.reply.rx.blocking_recv();
            if let Step::Yield(out) = self.reply.step(item) {
                return out;
            }
        }
    }
}
