//! Session layer of a telnet gateway: per-connection session state, the
//! inbound telnet decoder, the outbound newline/cursor encoder, buffered
//! transport I/O and the reference-counted session lifecycle.

pub mod config;
pub mod error;
pub mod session;
pub mod transport;
pub mod version;
