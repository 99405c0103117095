//! Session management
//!
//! The externally visible request/response façade of a terminal link. A
//! session serializes outgoing commands onto the shared output stream,
//! assigns correlation ids from one counter shared across both links, tracks
//! per-link FIFOs of outstanding ids, and drains the per-link queues the
//! background poller fills. Cheaply cloneable; all clones share state.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use termlink_core::{Frame, LinkAddress, PerLink, ResponseMessage};
use termlink_transport::{CommandSink, Transport};

use crate::error::{Error, Result};
use crate::poller::PollerStatus;
use crate::queue::QueueItem;

/// Callback fired with `true` on open and `false` on close
pub type ConnectionStateHandler = Box<dyn FnMut(bool) + Send>;

/// A terminal link session
///
/// # Lifecycle
///
/// A session starts closed. [`open`](Session::open) succeeds once the poller
/// has reported `Running`; any terminal poller status, and every
/// session-protocol error, deactivates the session permanently. Recovery
/// means building a fresh session/poller pair over a new connection.
///
/// # Threading
///
/// `send` and `receive` may be called from multiple threads; the session
/// serializes its own state behind one internal mutex, which is never held
/// across a blocking dequeue.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner {
    state: Mutex<State>,
    queues: PerLink<Receiver<QueueItem>>,
    transport: Mutex<Box<dyn Transport>>,
    on_connection_state: Mutex<ConnectionStateHandler>,
}

struct State {
    open: bool,
    closing: bool,
    poller: Option<PollerStatus>,
    poller_id: Option<u32>,
    next_id: u32,
    pending: PerLink<VecDeque<u32>>,
    output: Box<dyn Write + Send>,
}

impl Session {
    /// Create a closed session over an output stream and per-link queues
    pub fn new(
        output: Box<dyn Write + Send>,
        transport: Box<dyn Transport>,
        queues: PerLink<Receiver<QueueItem>>,
        on_connection_state: ConnectionStateHandler,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(State {
                    open: false,
                    closing: false,
                    poller: None,
                    poller_id: None,
                    next_id: 0,
                    pending: PerLink::default(),
                    output,
                }),
                queues,
                transport: Mutex::new(transport),
                on_connection_state: Mutex::new(on_connection_state),
            }),
        }
    }

    /// Open the session
    ///
    /// Succeeds only if the session is closed and the most recently observed
    /// poller status is `Running`; fires the connection-state callback with
    /// `true`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyOpen`] if the session was already open; the
    ///   redundant open closes the session and fires the callback with
    ///   `false`.
    /// - [`Error::PollerNotRunning`] if the poller never started or already
    ///   stopped; no transition, no callback.
    pub fn open(&self) -> Result<()> {
        let mut state = self.inner.state.lock();

        if state.open {
            state.open = false;
            drop(state);
            warn!("open() on an already-open session; closing it");
            self.notify_connection_state(false);
            return Err(Error::AlreadyOpen);
        }

        if state.poller != Some(PollerStatus::Running) {
            return Err(Error::PollerNotRunning);
        }

        state.open = true;
        drop(state);
        info!("session opened");
        self.notify_connection_state(true);
        Ok(())
    }

    /// Close the session
    ///
    /// Idempotent. On an open session this invokes the transport's
    /// disconnect (which may send one final command through this same
    /// session), absorbs any disconnect error, fires the connection-state
    /// callback with `false` and transitions to closed. Only the first of
    /// concurrent close calls performs the transition.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if !state.open || state.closing {
                return;
            }
            state.closing = true;
        }

        debug!("closing session");
        {
            let mut transport = self.inner.transport.lock();
            if let Err(e) = transport.disconnect(self) {
                warn!(error = %e, "transport disconnect failed");
            }
        }

        {
            let mut state = self.inner.state.lock();
            state.open = false;
            state.closing = false;
        }

        info!("session closed");
        self.notify_connection_state(false);
    }

    /// Whether the poller's most recently observed status is `Running`
    ///
    /// Independent of the open/closed state.
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().poller == Some(PollerStatus::Running)
    }

    /// Whether the session is open
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().open
    }

    /// Record a poller status transition
    ///
    /// Invoked asynchronously from the poller thread; any terminal status
    /// deactivates the session, independently of the queue sentinels.
    pub fn update_poller_status(&self, status: PollerStatus, last_id: Option<u32>) {
        let mut state = self.inner.state.lock();
        trace!(status = %status, ?last_id, "poller status update");
        state.poller = Some(status);
        state.poller_id = last_id;

        if status.is_terminal() && state.open {
            debug!(status = %status, "poller stopped; deactivating session");
            state.open = false;
        }
    }

    /// Send a command frame on `link`
    ///
    /// Assigns the next correlation id from the counter shared across both
    /// links, writes the encoded frame to the output stream and appends the
    /// id to the link's outstanding FIFO.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SessionClosed`] if the session is not open; a
    /// write failure deactivates the session.
    pub fn send(&self, link: LinkAddress, payload: &[u8]) -> Result<u32> {
        let mut state = self.inner.state.lock();

        if !state.open {
            return Err(Error::SessionClosed);
        }

        let frame = Frame::command(link, payload.to_vec())?;
        let id = state.next_id;
        state.next_id += 1;

        let bytes = frame.encode();
        let written = state
            .output
            .write_all(&bytes)
            .and_then(|()| state.output.flush());
        if let Err(e) = written {
            warn!(id, link = %link, error = %e, "command write failed; deactivating session");
            state.open = false;
            return Err(Error::Write(e));
        }

        state.pending.get_mut(link).push_back(id);
        trace!(id, link = %link, len = payload.len(), "command sent");
        Ok(id)
    }

    /// Receive the next solicited response on `link`, blocking indefinitely
    ///
    /// Responses must be consumed in the order their ids were assigned on
    /// this link.
    ///
    /// # Errors
    ///
    /// Every error deactivates the session:
    /// - [`Error::NoOutstandingCommand`] if nothing was outstanding on the
    ///   link when an item arrived
    /// - [`Error::QueueClosed`] if the item was the poller's terminal
    ///   sentinel (or the queue is gone entirely)
    /// - [`Error::InconsistentResponseId`] if the dequeued id does not match
    ///   the next outstanding id
    pub fn receive(&self, link: LinkAddress) -> Result<ResponseMessage> {
        let item = self.inner.queues.get(link).recv().map_err(|_| {
            self.deactivate();
            Error::QueueClosed
        })?;
        self.accept(link, item, None)
    }

    /// Receive the next solicited response, requiring its id
    ///
    /// As [`receive`](Session::receive), but `expected_id` must equal the
    /// link's next outstanding id: ids cannot be skipped, and the response
    /// for a skipped id is never delivered out of order.
    pub fn receive_expected(&self, link: LinkAddress, expected_id: u32) -> Result<ResponseMessage> {
        let item = self.inner.queues.get(link).recv().map_err(|_| {
            self.deactivate();
            Error::QueueClosed
        })?;
        self.accept(link, item, Some(expected_id))
    }

    /// Receive with a bounded wait
    ///
    /// Returns `Ok(None)` if nothing was dequeued within `timeout`; nothing
    /// is consumed and no state changes. A dequeued sentinel or mismatched
    /// id fails under the normal rules.
    pub fn receive_timeout(
        &self,
        link: LinkAddress,
        timeout: Duration,
    ) -> Result<Option<ResponseMessage>> {
        let item = match self.inner.queues.get(link).recv_timeout(timeout) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.deactivate();
                return Err(Error::QueueClosed);
            }
        };
        self.accept(link, item, None).map(Some)
    }

    /// Validate a dequeued item against the link's outstanding FIFO
    fn accept(
        &self,
        link: LinkAddress,
        item: QueueItem,
        requested: Option<u32>,
    ) -> Result<ResponseMessage> {
        let mut state = self.inner.state.lock();

        let Some(&expected) = state.pending.get(link).front() else {
            warn!(link = %link, "response arrived with nothing outstanding");
            state.open = false;
            return Err(Error::NoOutstandingCommand);
        };

        if let Some(requested) = requested {
            if requested != expected {
                warn!(link = %link, expected, requested, "attempt to skip an outstanding id");
                state.open = false;
                return Err(Error::SkippedResponseId {
                    next: expected,
                    requested,
                });
            }
        }

        state.pending.get_mut(link).pop_front();

        match item {
            QueueItem::Shutdown { last_id } => {
                debug!(link = %link, ?last_id, "queue closed by poller");
                state.open = false;
                Err(Error::QueueClosed)
            }
            QueueItem::Response { id, .. } if id != expected => {
                warn!(link = %link, expected, actual = id, "response id mismatch");
                state.open = false;
                Err(Error::InconsistentResponseId {
                    expected,
                    actual: id,
                })
            }
            QueueItem::Response { id, message } => {
                trace!(id, link = %link, "response matched");
                Ok(message)
            }
        }
    }

    fn deactivate(&self) {
        self.inner.state.lock().open = false;
    }

    fn notify_connection_state(&self, connected: bool) {
        (self.inner.on_connection_state.lock())(connected);
    }
}

impl CommandSink for Session {
    fn send_command(&self, link: LinkAddress, payload: &[u8]) -> termlink_transport::Result<u32> {
        self.send(link, payload)
            .map_err(|e| termlink_transport::Error::Session(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::link_queues;
    use crossbeam_channel::Sender;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;
    use termlink_transport::{self as transport};

    /// Transport stub; records whether disconnect ran and optionally sends
    /// a goodbye command through the sink.
    struct StubTransport {
        disconnects: Arc<StdMutex<u32>>,
        goodbye: Option<(LinkAddress, Vec<u8>)>,
    }

    impl StubTransport {
        fn new() -> (Self, Arc<StdMutex<u32>>) {
            let disconnects = Arc::new(StdMutex::new(0));
            (
                Self {
                    disconnects: Arc::clone(&disconnects),
                    goodbye: None,
                },
                disconnects,
            )
        }
    }

    impl Transport for StubTransport {
        fn connect(&mut self) -> transport::Result<()> {
            Ok(())
        }

        fn disconnect(&mut self, sink: &dyn CommandSink) -> transport::Result<()> {
            *self.disconnects.lock().unwrap() += 1;
            if let Some((link, payload)) = self.goodbye.take() {
                sink.send_command(link, &payload)?;
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn input(&mut self) -> transport::Result<Box<dyn std::io::Read + Send>> {
            Err(transport::Error::StreamClaimed("input"))
        }

        fn output(&mut self) -> transport::Result<Box<dyn std::io::Write + Send>> {
            Err(transport::Error::StreamClaimed("output"))
        }

        fn peer_addr(&self) -> String {
            "stub://".to_string()
        }
    }

    struct Harness {
        session: Session,
        senders: PerLink<Sender<QueueItem>>,
        written: Arc<StdMutex<Vec<u8>>>,
        states: Arc<StdMutex<Vec<bool>>>,
        disconnects: Arc<StdMutex<u32>>,
    }

    struct SharedWriter(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn harness() -> Harness {
        harness_with(None)
    }

    fn harness_with(goodbye: Option<(LinkAddress, Vec<u8>)>) -> Harness {
        let (senders, receivers) = link_queues(8);
        let written = Arc::new(StdMutex::new(Vec::new()));
        let states: Arc<StdMutex<Vec<bool>>> = Arc::new(StdMutex::new(Vec::new()));
        let (mut stub, disconnects) = StubTransport::new();
        stub.goodbye = goodbye;

        let state_sink = Arc::clone(&states);
        let session = Session::new(
            Box::new(SharedWriter(Arc::clone(&written))),
            Box::new(stub),
            receivers,
            Box::new(move |connected| state_sink.lock().unwrap().push(connected)),
        );

        Harness {
            session,
            senders,
            written,
            states,
            disconnects,
        }
    }

    fn opened() -> Harness {
        let h = harness();
        h.session.update_poller_status(PollerStatus::Running, None);
        h.session.open().unwrap();
        h
    }

    fn response(link: LinkAddress, payload: &[u8]) -> ResponseMessage {
        ResponseMessage::new(link, false, payload.to_vec()).unwrap()
    }

    fn push(h: &Harness, link: LinkAddress, id: u32, payload: &[u8]) {
        h.senders
            .get(link)
            .send(QueueItem::Response {
                id,
                message: response(link, payload),
            })
            .unwrap();
    }

    #[test]
    fn test_open_requires_running_poller() {
        let h = harness();

        // never reported: failure, no callback
        assert!(matches!(h.session.open(), Err(Error::PollerNotRunning)));
        assert!(h.states.lock().unwrap().is_empty());
        assert!(!h.session.is_active());

        // after Running was reported: success, callback fired exactly once
        h.session.update_poller_status(PollerStatus::Running, None);
        h.session.open().unwrap();
        assert!(h.session.is_active());
        assert_eq!(*h.states.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_redundant_open_closes_session() {
        let h = opened();

        assert!(matches!(h.session.open(), Err(Error::AlreadyOpen)));
        assert!(!h.session.is_active());
        assert_eq!(*h.states.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_open_fails_after_poller_stopped() {
        let h = harness();
        h.session
            .update_poller_status(PollerStatus::StreamEnded, None);

        assert!(matches!(h.session.open(), Err(Error::PollerNotRunning)));
        assert!(!h.session.is_connected());
    }

    #[test]
    fn test_is_connected_tracks_poller_not_open_state() {
        let h = harness();
        assert!(!h.session.is_connected());

        h.session.update_poller_status(PollerStatus::Running, None);
        assert!(h.session.is_connected());
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_send_assigns_shared_counter_across_links() {
        let h = opened();

        assert_eq!(
            h.session.send(LinkAddress::Primary, &[0x00, 0xA4]).unwrap(),
            0
        );
        assert_eq!(
            h.session
                .send(LinkAddress::Secondary, &[0x00, 0xB0])
                .unwrap(),
            1
        );
        assert_eq!(
            h.session.send(LinkAddress::Primary, &[0x00, 0xC0]).unwrap(),
            2
        );
        assert_eq!(
            h.session
                .send(LinkAddress::Secondary, &[0x00, 0xD0])
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_send_writes_encoded_frame() {
        let h = opened();
        h.session.send(LinkAddress::Primary, &[0x90, 0x00]).unwrap();

        assert_eq!(
            *h.written.lock().unwrap(),
            vec![1, 0, 2, 0x90, 0x00, 0x93]
        );
    }

    #[test]
    fn test_send_fails_when_closed() {
        let h = harness();
        assert!(matches!(
            h.session.send(LinkAddress::Primary, &[0x90, 0x00]),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_send_write_failure_deactivates() {
        struct FailingWriter;
        impl Write for FailingWriter {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let (_senders, receivers) = link_queues(2);
        let (stub, _) = StubTransport::new();
        let session = Session::new(
            Box::new(FailingWriter),
            Box::new(stub),
            receivers,
            Box::new(|_| {}),
        );
        session.update_poller_status(PollerStatus::Running, None);
        session.open().unwrap();

        assert!(matches!(
            session.send(LinkAddress::Primary, &[0x90, 0x00]),
            Err(Error::Write(_))
        ));
        assert!(!session.is_active());
    }

    #[test]
    fn test_three_commands_received_in_order() {
        let h = opened();

        for payload in [[0x01u8, 0x02], [0x03, 0x04], [0x05, 0x06]] {
            h.session.send(LinkAddress::Primary, &payload).unwrap();
        }

        push(&h, LinkAddress::Primary, 0, &[0xAA, 0x90, 0x00]);
        push(&h, LinkAddress::Primary, 1, &[0xBB, 0x90, 0x00]);
        push(&h, LinkAddress::Primary, 2, &[0xCC, 0x90, 0x00]);

        assert_eq!(
            h.session.receive(LinkAddress::Primary).unwrap().body(),
            &[0xAA]
        );
        assert_eq!(
            h.session.receive(LinkAddress::Primary).unwrap().body(),
            &[0xBB]
        );
        assert_eq!(
            h.session.receive(LinkAddress::Primary).unwrap().body(),
            &[0xCC]
        );
        assert!(h.session.is_active());
    }

    #[test]
    fn test_receive_mismatched_id_deactivates() {
        let h = opened();
        h.session.send(LinkAddress::Primary, &[0x01, 0x02]).unwrap();

        // the poller skipped a response: id 1 arrives where 0 is expected
        push(&h, LinkAddress::Primary, 1, &[0x90, 0x00]);

        assert!(matches!(
            h.session.receive(LinkAddress::Primary),
            Err(Error::InconsistentResponseId {
                expected: 0,
                actual: 1
            })
        ));
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_receive_with_nothing_outstanding_deactivates() {
        let h = opened();
        push(&h, LinkAddress::Primary, 0, &[0x90, 0x00]);

        assert!(matches!(
            h.session.receive(LinkAddress::Primary),
            Err(Error::NoOutstandingCommand)
        ));
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_receive_sentinel_deactivates() {
        let h = opened();
        h.session.send(LinkAddress::Primary, &[0x01, 0x02]).unwrap();
        h.senders
            .get(LinkAddress::Primary)
            .send(QueueItem::Shutdown { last_id: None })
            .unwrap();

        assert!(matches!(
            h.session.receive(LinkAddress::Primary),
            Err(Error::QueueClosed)
        ));
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_receive_expected_rejects_skipping() {
        let h = opened();
        h.session.send(LinkAddress::Primary, &[0x01, 0x02]).unwrap();
        h.session.send(LinkAddress::Primary, &[0x03, 0x04]).unwrap();
        push(&h, LinkAddress::Primary, 0, &[0x90, 0x00]);

        assert!(matches!(
            h.session.receive_expected(LinkAddress::Primary, 1),
            Err(Error::SkippedResponseId {
                next: 0,
                requested: 1
            })
        ));
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_receive_expected_matches_front() {
        let h = opened();
        let id = h.session.send(LinkAddress::Primary, &[0x01, 0x02]).unwrap();
        push(&h, LinkAddress::Primary, id, &[0x90, 0x00]);

        let message = h.session.receive_expected(LinkAddress::Primary, id).unwrap();
        assert!(message.is_success());
        assert!(h.session.is_active());
    }

    #[test]
    fn test_receive_timeout_returns_none_without_state_change() {
        let h = opened();
        h.session.send(LinkAddress::Primary, &[0x01, 0x02]).unwrap();

        let got = h
            .session
            .receive_timeout(LinkAddress::Primary, Duration::from_millis(10))
            .unwrap();
        assert!(got.is_none());
        assert!(h.session.is_active());

        // the outstanding id is still deliverable afterwards
        push(&h, LinkAddress::Primary, 0, &[0x90, 0x00]);
        assert!(h
            .session
            .receive_timeout(LinkAddress::Primary, Duration::from_millis(100))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_close_is_idempotent_and_runs_disconnect_once() {
        let h = opened();

        h.session.close();
        h.session.close();

        assert_eq!(*h.disconnects.lock().unwrap(), 1);
        assert_eq!(*h.states.lock().unwrap(), vec![true, false]);
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_close_on_closed_session_is_noop() {
        let h = harness();
        h.session.close();

        assert_eq!(*h.disconnects.lock().unwrap(), 0);
        assert!(h.states.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disconnect_can_send_goodbye_through_session() {
        let h = harness_with(Some((LinkAddress::Primary, vec![0xDE, 0xAD])));
        h.session.update_poller_status(PollerStatus::Running, None);
        h.session.open().unwrap();

        h.session.close();

        // the goodbye frame went out through the still-open session
        let written = h.written.lock().unwrap();
        assert_eq!(&written[3..5], &[0xDE, 0xAD]);
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_terminal_poller_status_deactivates() {
        let h = opened();
        h.session
            .update_poller_status(PollerStatus::QueuePostTimedOut, Some(3));

        assert!(!h.session.is_active());
        assert!(!h.session.is_connected());
    }
}
