//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] termlink_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] termlink_transport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Session is already open")]
    AlreadyOpen,

    #[error("Link poller is not running")]
    PollerNotRunning,

    #[error("No outstanding command for solicited response")]
    NoOutstandingCommand,

    #[error("Inconsistent response id: expected {expected}, got {actual}")]
    InconsistentResponseId {
        expected: u32,
        actual: u32,
    },

    #[error("Cannot skip outstanding id {next}: requested {requested}")]
    SkippedResponseId {
        next: u32,
        requested: u32,
    },

    #[error("Response queue closed")]
    QueueClosed,

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),
}
