//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Stream already claimed: {0}")]
    StreamClaimed(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Session error: {0}")]
    Session(String),
}
