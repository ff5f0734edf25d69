//! Half-open detection without a request/response round trip.
//!
//! TCP only notices a vanished peer when I/O is attempted. The probe
//! switches the socket to non-blocking mode, issues a zero-length send
//! and then a one-byte peek:
//!
//! - the send fails with a hard error once the peer has reset the link;
//! - the peek returns `0` once the peer has sent FIN (a zero-length send
//!   still succeeds in that state on Linux).
//!
//! A "would block" result from either call is the expected outcome on a
//! healthy idle socket. The previous blocking mode is restored by a
//! drop guard, so no return path can skip it.

use std::io;
use std::mem::MaybeUninit;

use socket2::SockRef;
use tokio::net::TcpStream;

/// Error codes that mean "nothing happened yet" rather than "peer gone".
#[cfg(unix)]
const WOULD_BLOCK_CODES: &[i32] = &[libc::EAGAIN, libc::EWOULDBLOCK];

/// `WSAEWOULDBLOCK`.
#[cfg(windows)]
const WOULD_BLOCK_CODES: &[i32] = &[10035];

#[cfg(not(any(unix, windows)))]
const WOULD_BLOCK_CODES: &[i32] = &[];

/// Outcome of a single probe.
#[derive(Debug)]
pub enum Liveness {
    Open,
    Closed(io::Error),
}

impl Liveness {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Whether `err` belongs to the "operation would block" set.
pub fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err
            .raw_os_error()
            .is_some_and(|code| WOULD_BLOCK_CODES.contains(&code))
}

/// Probe an established stream.
pub fn probe(stream: &TcpStream) -> Liveness {
    let sock = SockRef::from(stream);
    let _mode = match NonBlockingGuard::enter(&sock) {
        Ok(guard) => guard,
        Err(e) => return Liveness::Closed(e),
    };

    match sock.send(&[]) {
        Ok(_) => {}
        Err(e) if is_would_block(&e) => {}
        Err(e) => return Liveness::Closed(e),
    }

    let mut buf = [MaybeUninit::<u8>::uninit(); 1];
    match sock.peek(&mut buf) {
        Ok(0) => Liveness::Closed(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed the connection",
        )),
        // Unread data means the peer is still there.
        Ok(_) => Liveness::Open,
        Err(e) if is_would_block(&e) => Liveness::Open,
        Err(e) => Liveness::Closed(e),
    }
}

// ── NonBlockingGuard ─────────────────────────────────────────────

/// Puts a socket in non-blocking mode and restores the previous mode on drop.
struct NonBlockingGuard<'a> {
    sock: &'a SockRef<'a>,
    was_nonblocking: bool,
}

impl<'a> NonBlockingGuard<'a> {
    fn enter(sock: &'a SockRef<'a>) -> io::Result<Self> {
        let was_nonblocking = current_mode(sock)?;
        if !was_nonblocking {
            sock.set_nonblocking(true)?;
        }
        Ok(Self {
            sock,
            was_nonblocking,
        })
    }
}

impl Drop for NonBlockingGuard<'_> {
    fn drop(&mut self) {
        if !self.was_nonblocking {
            if let Err(e) = self.sock.set_nonblocking(false) {
                tracing::warn!("failed to restore blocking mode after probe: {e}");
            }
        }
    }
}

#[cfg(unix)]
fn current_mode(sock: &SockRef<'_>) -> io::Result<bool> {
    sock.nonblocking()
}

// Sockets registered with the tokio reactor are always non-blocking.
#[cfg(not(unix))]
fn current_mode(_sock: &SockRef<'_>) -> io::Result<bool> {
    Ok(true)
}
