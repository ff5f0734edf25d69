//! Connection health as a distinct-until-changed stream of booleans.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Write side, owned by the worker. Dropping it ends every
/// [`Connectivity`] stream.
#[derive(Debug)]
pub(crate) struct ConnectivityPublisher {
    tx: watch::Sender<bool>,
}

impl ConnectivityPublisher {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Publish `connected`. Subscribers are only woken on a transition.
    ///
    /// Returns `true` if the value changed.
    pub(crate) fn publish(&self, connected: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        })
    }

    pub(crate) fn watch(&self) -> ConnectivityWatch {
        ConnectivityWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side, held by the facade.
#[derive(Debug, Clone)]
pub(crate) struct ConnectivityWatch {
    rx: watch::Receiver<bool>,
}

impl ConnectivityWatch {
    pub(crate) fn current(&self) -> bool {
        *self.rx.borrow()
    }

    pub(crate) fn subscribe(&self) -> Connectivity {
        Connectivity {
            inner: WatchStream::new(self.rx.clone()),
            last: None,
        }
    }
}

/// Stream of connectivity transitions.
///
/// Yields the current state first, then every change. Two consecutive
/// items are never equal, even when a subscriber falls behind and the
/// watch channel coalesces a `true -> false -> true` flap.
///
/// The stream ends once the connection's worker has stopped.
#[derive(Debug)]
pub struct Connectivity {
    inner: WatchStream<bool>,
    last: Option<bool>,
}

impl Stream for Connectivity {
    type Item = bool;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<bool>> {
        let this = self.get_mut();
        loop {
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(value) if this.last == Some(value) => continue,
                Some(value) => {
                    this.last = Some(value);
                    return Poll::Ready(Some(value));
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
