//! Reply classification for the AMCP text dialect.
//!
//! The 3-digit code that opens every reply decides how many body lines
//! follow it, or whether the command failed. [`Version`] parses the body
//! of a `VERSION` reply.

pub mod status;
pub mod version;

pub use status::{Framing, ProtocolFailure, StatusCode};
pub use version::Version;

/// Default AMCP control port.
pub const DEFAULT_PORT: u16 = 5250;

/// Command issued by [`Connection::version`](crate::Connection::version).
pub const VERSION_COMMAND: &str = "VERSION";

/// Command sent on close when `goodbye_on_close` is set.
pub const GOODBYE_COMMAND: &str = "BYE";
