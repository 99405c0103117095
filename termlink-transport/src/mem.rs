//! In-memory transport
//!
//! A blocking byte pipe over channels, usable wherever a real cable or
//! socket would be: tests, examples, and protocol simulations. Reads block
//! like a socket read and observe EOF once the writing end is dropped.

use std::io::{self, Read, Write};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::debug;

use termlink_core::LinkAddress;

use crate::{CommandSink, Error, Result, Transport};

/// Writing end of an in-memory byte pipe
pub struct PipeWriter {
    tx: Sender<u8>,
}

/// Reading end of an in-memory byte pipe
pub struct PipeReader {
    rx: Receiver<u8>,
}

/// Create a unidirectional in-memory byte pipe
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = unbounded();
    (PipeWriter { tx }, PipeReader { rx })
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.tx
                .send(byte)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // block for the first byte, then drain whatever else is ready
        let first = match self.rx.recv() {
            Ok(byte) => byte,
            Err(_) => return Ok(0), // writer dropped: EOF
        };
        buf[0] = first;

        let mut n = 1;
        while n < buf.len() {
            match self.rx.try_recv() {
                Ok(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(n)
    }
}

/// The far end of an in-memory link: what the simulated terminal sees
///
/// Reads observe bytes the engine wrote; writes feed the engine's input.
pub struct MemoryPeer {
    /// Bytes written by the engine
    pub input: PipeReader,
    /// Feeds the engine's inbound stream
    pub output: PipeWriter,
}

impl Read for MemoryPeer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MemoryPeer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

/// Create a connected in-memory duplex link
///
/// Returns the engine-side transport and the peer end a test (or simulated
/// terminal) drives.
pub fn duplex() -> (MemoryTransport, MemoryPeer) {
    let (engine_tx, peer_rx) = pipe();
    let (peer_tx, engine_rx) = pipe();

    let transport = MemoryTransport {
        input: Some(engine_rx),
        output: Some(engine_tx),
        connected: false,
        goodbye: None,
    };
    let peer = MemoryPeer {
        input: peer_rx,
        output: peer_tx,
    };

    (transport, peer)
}

/// In-memory [`Transport`] implementation
pub struct MemoryTransport {
    input: Option<PipeReader>,
    output: Option<PipeWriter>,
    connected: bool,
    goodbye: Option<(LinkAddress, Vec<u8>)>,
}

impl MemoryTransport {
    /// Send one last command through the session while disconnecting
    pub fn with_goodbye(mut self, link: LinkAddress, payload: Vec<u8>) -> Self {
        self.goodbye = Some((link, payload));
        self
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        self.connected = true;
        debug!("memory transport connected");
        Ok(())
    }

    fn disconnect(&mut self, sink: &dyn CommandSink) -> Result<()> {
        if let Some((link, payload)) = self.goodbye.take() {
            debug!(link = %link, "sending goodbye command");
            sink.send_command(link, &payload)?;
        }
        self.connected = false;
        debug!("memory transport disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn input(&mut self) -> Result<Box<dyn Read + Send>> {
        let reader = self.input.take().ok_or(Error::StreamClaimed("input"))?;
        Ok(Box::new(reader))
    }

    fn output(&mut self) -> Result<Box<dyn Write + Send>> {
        let writer = self.output.take().ok_or(Error::StreamClaimed("output"))?;
        Ok(Box::new(writer))
    }

    fn peer_addr(&self) -> String {
        "mem://".to_string()
    }
}
