//! Background poller
//!
//! A dedicated worker thread continuously drains the inbound byte stream,
//! separating unsolicited traffic (delivered via callback) from solicited
//! traffic (pushed into the per-link bounded queues), and reports lifecycle
//! transitions through a status callback. Exactly one transition from
//! `Running` to a terminal state occurs per poller lifetime.

use std::fmt;
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};
use tracing::{debug, trace, warn};

use termlink_core::{PerLink, ResponseMessage, ResponseReader};

use crate::error::Result;
use crate::queue::QueueItem;

/// Default bounded wait for posting into a link queue
pub const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type surfaced by caller-supplied callbacks
///
/// A callback returning `Err` is absorbed at the poller boundary and
/// converted into a [`PollerStatus::CallbackFailed`] termination reason.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked on the poller thread for unprompted responses
///
/// Receives the last matched correlation id and the message. Must not block
/// indefinitely.
pub type UnsolicitedHandler =
    Box<dyn FnMut(Option<u32>, ResponseMessage) -> std::result::Result<(), CallbackError> + Send>;

/// Callback observing poller lifecycle transitions
///
/// Invoked on the poller thread with the new status and the last matched
/// correlation id; typically wired to `Session::update_poller_status`.
pub type StatusHandler =
    Box<dyn FnMut(PollerStatus, Option<u32>) -> std::result::Result<(), CallbackError> + Send>;

/// Poller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    /// Draining the stream; the only non-terminal state
    Running,

    /// The inbound stream ended or broke
    StreamEnded,

    /// A queue post exceeded the configured wait: the consumer is too slow
    QueuePostTimedOut,

    /// A queue post found the consumer gone (cooperative shutdown)
    QueuePostInterrupted,

    /// A caller-supplied callback raised an error
    CallbackFailed,
}

impl PollerStatus {
    /// Whether this status ends the poller's lifetime
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollerStatus::Running)
    }
}

impl fmt::Display for PollerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollerStatus::Running => "running",
            PollerStatus::StreamEnded => "stream ended",
            PollerStatus::QueuePostTimedOut => "queue post timed out",
            PollerStatus::QueuePostInterrupted => "queue post interrupted",
            PollerStatus::CallbackFailed => "callback failed",
        };
        write!(f, "{name}")
    }
}

/// Handle to the background poller thread
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start the worker thread
    ///
    /// The poller runs until the stream ends, a queue post fails, or a
    /// callback raises; it then posts one terminal sentinel to every link's
    /// queue (best effort) and reports the final status exactly once.
    pub fn spawn<R>(
        reader: ResponseReader<R>,
        queues: PerLink<Sender<QueueItem>>,
        on_unsolicited: UnsolicitedHandler,
        on_status: StatusHandler,
        post_timeout: Duration,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("termlink-poller".to_string())
            .spawn(move || run(reader, queues, on_unsolicited, on_status, post_timeout))?;

        Ok(Self { handle })
    }

    /// Wait for the worker thread to stop
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("poller thread panicked");
        }
    }
}

fn run<R: Read>(
    mut reader: ResponseReader<R>,
    queues: PerLink<Sender<QueueItem>>,
    mut on_unsolicited: UnsolicitedHandler,
    mut on_status: StatusHandler,
    post_timeout: Duration,
) {
    let mut last_id: Option<u32> = None;
    let mut next_id: u32 = 0;
    let mut callback_failed = false;

    if let Err(e) = on_status(PollerStatus::Running, last_id) {
        warn!(error = %e, "status callback failed");
        callback_failed = true;
    }

    let mut reason = loop {
        let Some(message) = reader.next_message() else {
            debug!("response stream exhausted");
            break PollerStatus::StreamEnded;
        };

        if message.unsolicited() {
            trace!(link = %message.address(), "dispatching unsolicited message");
            if let Err(e) = on_unsolicited(last_id, message) {
                warn!(error = %e, "unsolicited callback failed");
                callback_failed = true;
                break PollerStatus::CallbackFailed;
            }
            continue;
        }

        // ids carry no wire representation; solicited responses complete in
        // command order across the half-duplex link, so the poller mirrors
        // the session's shared counter
        let id = next_id;
        next_id += 1;
        last_id = Some(id);

        let link = message.address();
        match queues
            .get(link)
            .send_timeout(QueueItem::Response { id, message }, post_timeout)
        {
            Ok(()) => trace!(id, link = %link, "queued solicited response"),
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(id, link = %link, "queue post timed out");
                break PollerStatus::QueuePostTimedOut;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                debug!(id, link = %link, "queue receiver dropped");
                break PollerStatus::QueuePostInterrupted;
            }
        }
    };

    // one best-effort sentinel per registered link; failures never change
    // the already-decided stop reason
    for (link, queue) in queues.iter() {
        if queue
            .send_timeout(QueueItem::Shutdown { last_id }, post_timeout)
            .is_err()
        {
            warn!(link = %link, "could not deliver shutdown sentinel");
        }
    }

    if callback_failed {
        reason = PollerStatus::CallbackFailed;
    }

    if let Err(e) = on_status(reason, last_id) {
        warn!(error = %e, "final status callback failed");
    }
    debug!(status = %reason, ?last_id, "poller stopped");
}
