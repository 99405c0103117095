//! # termlink-core
//!
//! Wire-level protocol implementation for framed payment-terminal links.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - XOR checksum calculation
//! - Multi-frame response reconstruction
//! - Streaming frame and response readers
//! - Protocol constants

pub mod checksum;
pub mod codec;
pub mod constants;
pub mod error;
pub mod frame;
pub mod link;
pub mod reader;
pub mod response;

pub use codec::FrameReader;
pub use error::{Error, Result};
pub use frame::{ControlFlags, Frame};
pub use link::{LinkAddress, PerLink};
pub use reader::ResponseReader;
pub use response::ResponseMessage;

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "1.0";
