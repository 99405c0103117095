//! Per-link response queues
//!
//! The bounded queues are the only structure both the poller thread and
//! caller threads touch: the poller pushes solicited responses (and, on
//! shutdown, one terminal sentinel per link), the session drains them.

use crossbeam_channel::{bounded, Receiver, Sender};

use termlink_core::{LinkAddress, PerLink, ResponseMessage};

/// Default per-link queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// One unit handed from the poller to the session
#[derive(Debug, Clone)]
pub enum QueueItem {
    /// A solicited response matched to correlation id `id`
    Response {
        id: u32,
        message: ResponseMessage,
    },

    /// Terminal sentinel: the poller has stopped; nothing further arrives
    /// on this link
    Shutdown {
        last_id: Option<u32>,
    },
}

/// Create the bounded per-link queues
///
/// Returns the poller's sending side and the session's receiving side.
pub fn link_queues(
    capacity: usize,
) -> (PerLink<Sender<QueueItem>>, PerLink<Receiver<QueueItem>>) {
    let (primary_tx, primary_rx) = bounded(capacity);
    let (secondary_tx, secondary_rx) = bounded(capacity);

    let senders = PerLink::new(|link| match link {
        LinkAddress::Primary => primary_tx.clone(),
        LinkAddress::Secondary => secondary_tx.clone(),
    });
    let receivers = PerLink::new(|link| match link {
        LinkAddress::Primary => primary_rx.clone(),
        LinkAddress::Secondary => secondary_rx.clone(),
    });

    (senders, receivers)
}
