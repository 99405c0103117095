//! Transport layer for terminal links
//!
//! A transport supplies the ordered byte streams the protocol engine runs
//! over (cable, socket or radio link) plus connect/disconnect lifecycle. The
//! engine reads the input stream only from its poller thread and writes the
//! output stream only from caller threads.

pub mod error;
pub mod mem;

pub use error::{Error, Result};
pub use mem::{duplex, pipe, MemoryPeer, MemoryTransport, PipeReader, PipeWriter};

use std::io::{Read, Write};

use termlink_core::LinkAddress;

/// Narrow send capability handed to [`Transport::disconnect`]
///
/// While tearing a link down, a transport may issue one last synchronous
/// command through the still-live session (a "goodbye" command, for
/// example). It receives this capability rather than the full session API to
/// keep the escape hatch explicit and auditable.
pub trait CommandSink {
    /// Send one command frame, returning its correlation id
    fn send_command(&self, link: LinkAddress, payload: &[u8]) -> Result<u32>;
}

/// Transport over which a terminal link engine runs
pub trait Transport: Send {
    /// Establish the underlying connection
    fn connect(&mut self) -> Result<()>;

    /// Tear the connection down
    ///
    /// `sink` allows one final send through the owning session before the
    /// byte streams die.
    fn disconnect(&mut self, sink: &dyn CommandSink) -> Result<()>;

    /// Whether the underlying connection is up
    fn is_connected(&self) -> bool;

    /// Claim the readable byte stream (read by the poller thread)
    fn input(&mut self) -> Result<Box<dyn Read + Send>>;

    /// Claim the writable byte stream (written by caller threads)
    fn output(&mut self) -> Result<Box<dyn Write + Send>>;

    /// Human-readable peer address, for diagnostics
    fn peer_addr(&self) -> String;
}
