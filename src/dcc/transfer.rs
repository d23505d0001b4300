//! One DCC transfer and its state machine.
//!
//! `Idle -> Connecting -> Transferring -> {Complete, Error} -> Idle`
//!
//! Every step is a single non-blocking probe: a pending connect or accept is
//! polled once, sockets are read and written with `try_read`/`try_write`.
//! Entering a terminal state drops the socket and the file, once.

use futures::FutureExt;
use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Bytes moved per socket call.
pub const CHUNK_SIZE: usize = 8192;

/// Socket calls per transfer per tick, so one busy peer cannot hog a tick.
const MAX_CALLS_PER_TICK: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Connecting,
    Transferring,
    Complete,
    Error,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Complete | TransferState::Error)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Idle => "idle",
            TransferState::Connecting => "connecting",
            TransferState::Transferring => "transferring",
            TransferState::Complete => "complete",
            TransferState::Error => "error",
        };
        f.write_str(s)
    }
}

pub(crate) type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

pub(crate) enum Endpoint {
    /// Outbound connect to the offering peer, still in progress.
    Dialing(ConnectFuture),
    /// Our own offer, waiting for the peer to connect.
    Listening(TcpListener),
    Stream(TcpStream),
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Dialing(_) => f.write_str("Dialing"),
            Endpoint::Listening(l) => write!(f, "Listening({:?})", l.local_addr().ok()),
            Endpoint::Stream(s) => write!(f, "Stream({:?})", s.peer_addr().ok()),
        }
    }
}

/// What a step changed, for the pool to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Connected,
    Completed,
    Failed(String),
}

#[derive(Debug)]
pub struct TransferRecord {
    direction: Direction,
    state: TransferState,
    filename: String,
    peer: String,
    size: u64,
    moved: u64,
    path: PathBuf,
    file: Option<File>,
    socket: Option<Endpoint>,
    deadline: Option<Instant>,
    /// Send side: read from the file but not yet accepted by the socket.
    pending: Vec<u8>,
    failure: Option<String>,
}

impl TransferRecord {
    pub(crate) fn idle() -> Self {
        Self {
            direction: Direction::Receive,
            state: TransferState::Idle,
            filename: String::new(),
            peer: String::new(),
            size: 0,
            moved: 0,
            path: PathBuf::new(),
            file: None,
            socket: None,
            deadline: None,
            pending: Vec::new(),
            failure: None,
        }
    }

    /// A transfer that has its file open and its socket on the way.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn connecting(
        direction: Direction,
        peer: &str,
        filename: &str,
        size: u64,
        path: PathBuf,
        file: File,
        socket: Endpoint,
        deadline: Instant,
    ) -> Self {
        Self {
            direction,
            state: TransferState::Connecting,
            filename: filename.to_string(),
            peer: peer.to_string(),
            size,
            moved: 0,
            path,
            file: Some(file),
            socket: Some(socket),
            deadline: Some(deadline),
            pending: Vec::new(),
            failure: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Nick on the other end.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Declared size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes_moved(&self) -> u64 {
        self.moved
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[cfg(test)]
    pub fn has_socket(&self) -> bool {
        self.socket.is_some()
    }

    #[cfg(test)]
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    /// Advance by one non-blocking step.
    pub(crate) fn step(&mut self, now: Instant) -> Option<Outcome> {
        match (self.state, self.direction) {
            (TransferState::Connecting, Direction::Receive) => self.poll_dial(now),
            (TransferState::Connecting, Direction::Send) => self.poll_accept(now),
            (TransferState::Transferring, Direction::Receive) => self.pump_receive(),
            (TransferState::Transferring, Direction::Send) => self.pump_send(),
            _ => None,
        }
    }

    fn poll_dial(&mut self, now: Instant) -> Option<Outcome> {
        let Some(Endpoint::Dialing(connect)) = self.socket.as_mut() else {
            return Some(self.fail("no pending connect".into()));
        };
        match connect.as_mut().now_or_never() {
            None if self.deadline.is_some_and(|d| now >= d) => {
                Some(self.fail("connect timed out".into()))
            }
            None => None,
            Some(Ok(stream)) => match stream.take_error() {
                Ok(None) => {
                    self.socket = Some(Endpoint::Stream(stream));
                    self.enter_transferring()
                }
                Ok(Some(e)) | Err(e) => Some(self.fail(format!("connect failed: {}", e))),
            },
            Some(Err(e)) => Some(self.fail(format!("connect failed: {}", e))),
        }
    }

    fn poll_accept(&mut self, now: Instant) -> Option<Outcome> {
        let Some(Endpoint::Listening(listener)) = self.socket.as_ref() else {
            return Some(self.fail("no listening socket".into()));
        };
        match listener.accept().now_or_never() {
            None if self.deadline.is_some_and(|d| now >= d) => {
                Some(self.fail("peer never connected".into()))
            }
            None => None,
            Some(Ok((stream, addr))) => {
                debug!(%addr, file = %self.filename, "DCC peer connected");
                self.socket = Some(Endpoint::Stream(stream));
                self.enter_transferring()
            }
            Some(Err(e)) => Some(self.fail(format!("accept failed: {}", e))),
        }
    }

    fn enter_transferring(&mut self) -> Option<Outcome> {
        self.state = TransferState::Transferring;
        self.deadline = None;
        info!(file = %self.filename, peer = %self.peer, "DCC transfer started");
        Some(Outcome::Connected)
    }

    fn pump_receive(&mut self) -> Option<Outcome> {
        let mut buf = [0u8; CHUNK_SIZE];
        for _ in 0..MAX_CALLS_PER_TICK {
            let Some(Endpoint::Stream(stream)) = self.socket.as_ref() else {
                return Some(self.fail("socket missing".into()));
            };
            match stream.try_read(&mut buf) {
                Ok(0) => return Some(self.peer_closed()),
                Ok(n) => {
                    // bytes past the declared size are not part of the file
                    let n = if self.size > 0 {
                        n.min((self.size - self.moved) as usize)
                    } else {
                        n
                    };
                    let Some(file) = self.file.as_mut() else {
                        return Some(self.fail("file missing".into()));
                    };
                    if let Err(e) = file.write_all(&buf[..n]) {
                        return Some(self.fail(format!("write failed: {}", e)));
                    }
                    self.moved += n as u64;
                    // DCC acknowledgement: running total, 32-bit big-endian
                    let ack = (self.moved as u32).to_be_bytes();
                    let _ = stream.try_write(&ack);
                    if self.size > 0 && self.moved >= self.size {
                        return Some(self.complete());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    return Some(self.peer_closed())
                }
                Err(e) => return Some(self.fail(format!("read failed: {}", e))),
            }
        }
        None
    }

    fn pump_send(&mut self) -> Option<Outcome> {
        let mut buf = [0u8; CHUNK_SIZE];

        // Drain acknowledgements so the peer's writes never stall.
        for _ in 0..MAX_CALLS_PER_TICK {
            let Some(Endpoint::Stream(stream)) = self.socket.as_ref() else {
                return Some(self.fail("socket missing".into()));
            };
            match stream.try_read(&mut buf) {
                Ok(0) => return Some(self.peer_closed()),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    return Some(self.peer_closed())
                }
                Err(e) => return Some(self.fail(format!("read failed: {}", e))),
            }
        }

        for _ in 0..MAX_CALLS_PER_TICK {
            if self.pending.is_empty() {
                let Some(file) = self.file.as_mut() else {
                    return Some(self.fail("file missing".into()));
                };
                match file.read(&mut buf) {
                    Ok(0) => return Some(self.complete()),
                    Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                    Err(e) => return Some(self.fail(format!("read failed: {}", e))),
                }
            }
            let Some(Endpoint::Stream(stream)) = self.socket.as_ref() else {
                return Some(self.fail("socket missing".into()));
            };
            match stream.try_write(&self.pending) {
                Ok(n) => {
                    self.pending.drain(..n);
                    self.moved += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                Err(e) => return Some(self.fail(format!("write failed: {}", e))),
            }
        }
        None
    }

    /// A reset after the peer's FIN counts as a close, since our acks may
    /// land on an already closed socket.
    fn peer_closed(&mut self) -> Outcome {
        if self.size == 0 || self.moved >= self.size {
            self.complete()
        } else {
            self.fail(format!(
                "truncated: peer closed after {} of {} bytes",
                self.moved, self.size
            ))
        }
    }

    fn complete(&mut self) -> Outcome {
        self.release();
        self.state = TransferState::Complete;
        info!(file = %self.filename, bytes = self.moved, "DCC transfer complete");
        Outcome::Completed
    }

    fn fail(&mut self, reason: String) -> Outcome {
        self.release();
        self.discard_empty_download();
        self.state = TransferState::Error;
        warn!(file = %self.filename, %reason, "DCC transfer failed");
        self.failure = Some(reason.clone());
        Outcome::Failed(reason)
    }

    /// Drop both handles. Safe to call more than once.
    fn release(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                debug!(error = %e, "flush on close failed");
            }
        }
        self.socket = None;
        self.pending.clear();
    }

    fn discard_empty_download(&self) {
        if self.direction == Direction::Receive && self.moved == 0 {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    /// User cancellation from any non-idle state.
    pub(crate) fn abort(&mut self) {
        self.release();
        self.discard_empty_download();
    }
}
