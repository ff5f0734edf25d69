//! Socket ownership: the TCP transport and its liveness probe.

pub mod probe;
pub mod transport;

pub use probe::{Liveness, probe};
pub use transport::{Endpoint, Transport};
