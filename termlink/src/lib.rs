//! # termlink
//!
//! Rust implementation of a framed, half-duplex command/response protocol
//! for payment-terminal peripherals.
//!
//! ## Features
//!
//! - Type-safe frame codec with XOR checksum verification
//! - Chained multi-frame response reconstruction per link
//! - Background poller separating solicited and unsolicited traffic
//! - Session API with correlation ids and strict FIFO response delivery
//!
//! ## Quick Start
//!
//! ```no_run
//! use termlink::{
//!     duplex, link_queues, LinkAddress, Poller, ResponseReader, Session, Transport,
//!     DEFAULT_POST_TIMEOUT, DEFAULT_QUEUE_CAPACITY,
//! };
//!
//! fn main() -> termlink::Result<()> {
//!     let (mut transport, _peer) = duplex();
//!     transport.connect()?;
//!
//!     let reader = ResponseReader::new(transport.input()?);
//!     let output = transport.output()?;
//!
//!     let (senders, receivers) = link_queues(DEFAULT_QUEUE_CAPACITY);
//!     let session = Session::new(
//!         output,
//!         Box::new(transport),
//!         receivers,
//!         Box::new(|up| println!("session active: {up}")),
//!     );
//!
//!     let status_session = session.clone();
//!     let poller = Poller::spawn(
//!         reader,
//!         senders,
//!         Box::new(|_, message| {
//!             println!("unsolicited status: {:04X}", message.status());
//!             Ok(())
//!         }),
//!         Box::new(move |status, last_id| {
//!             status_session.update_poller_status(status, last_id);
//!             Ok(())
//!         }),
//!         DEFAULT_POST_TIMEOUT,
//!     )?;
//!
//!     session.open()?;
//!
//!     // Select an application on the primary terminal
//!     let id = session.send(LinkAddress::Primary, &[0x00, 0xA4])?;
//!     let response = session.receive_expected(LinkAddress::Primary, id)?;
//!     assert!(response.is_success());
//!
//!     session.close();
//!     poller.join();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod poller;
pub mod queue;
pub mod session;

// Re-exports
pub use error::{Error, Result};
pub use poller::{
    CallbackError, Poller, PollerStatus, StatusHandler, UnsolicitedHandler, DEFAULT_POST_TIMEOUT,
};
pub use queue::{link_queues, QueueItem, DEFAULT_QUEUE_CAPACITY};
pub use session::{ConnectionStateHandler, Session};

// Re-export types
pub use termlink_core::{ControlFlags, Frame, LinkAddress, PerLink, ResponseMessage, ResponseReader};
pub use termlink_transport::{duplex, CommandSink, MemoryPeer, MemoryTransport, Transport};
