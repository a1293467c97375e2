//! Transport module - TCP connection and handshake.
//!
//! The server speaks first: right after accepting it sends a length-prefixed
//! protocol signature. Everything after that is framed traffic handled by the
//! reader and writer tasks.

mod tcp;

pub use tcp::{connect, read_handshake};
