//! Server transport: one TCP connection with non-blocking send/receive.

use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::Interest;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info, warn};

/// Upper bound for establishing a connection, both to the server and to a
/// DCC peer.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Outcome of a single non-blocking read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    Ready(usize),
    WouldBlock,
}

/// Readiness reported by [`Transport::ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

/// Owns the connection to the IRC server.
pub struct Transport {
    state: ConnectionState,
    stream: Option<TcpStream>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            stream: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Resolve `server` and try each candidate address in order.
    ///
    /// Every attempt is bounded by [`CONNECT_TIMEOUT`]. The first candidate
    /// whose connect completes without a pending socket error wins.
    pub async fn connect(&mut self, server: &str, port: u16) -> Result<()> {
        self.close();
        self.state = ConnectionState::Connecting;

        let fail = |reason: String| Error::Connection {
            server: server.to_string(),
            port,
            reason,
        };

        let candidates: Vec<SocketAddr> = match lookup_host((server, port)).await {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(fail(format!("resolution failed: {}", e)));
            }
        };

        let mut last_error = String::from("no addresses resolved");
        for addr in candidates {
            debug!(%addr, "trying server address");
            match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => match stream.take_error() {
                    Ok(None) => {
                        let _ = stream.set_nodelay(true);
                        info!(%addr, "connected");
                        self.stream = Some(stream);
                        self.state = ConnectionState::Connected;
                        return Ok(());
                    }
                    Ok(Some(e)) | Err(e) => last_error = e.to_string(),
                },
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("timed out after {}s", CONNECT_TIMEOUT.as_secs()),
            }
            warn!(%addr, error = %last_error, "connect attempt failed");
        }

        self.state = ConnectionState::Disconnected;
        Err(fail(last_error))
    }

    /// Adopt an already connected stream.
    #[cfg(test)]
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            state: ConnectionState::Connected,
            stream: Some(stream),
        }
    }

    /// One non-blocking write. Partial writes are returned, never retried.
    pub fn send(&mut self, bytes: &[u8]) -> Result<IoStatus> {
        let stream = self.stream.as_ref().ok_or(Error::TransportClosed)?;
        match stream.try_write(bytes) {
            Ok(n) => Ok(IoStatus::Ready(n)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(IoStatus::WouldBlock),
            Err(e) => {
                self.close();
                Err(Error::Io(e))
            }
        }
    }

    /// One non-blocking read. A zero-byte read means the server hung up.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<IoStatus> {
        if buf.is_empty() {
            return Ok(IoStatus::WouldBlock);
        }
        let stream = self.stream.as_ref().ok_or(Error::TransportClosed)?;
        match stream.try_read(buf) {
            Ok(0) => {
                self.close();
                Err(Error::TransportClosed)
            }
            Ok(n) => Ok(IoStatus::Ready(n)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(IoStatus::WouldBlock),
            Err(e) => {
                self.close();
                Err(Error::Io(e))
            }
        }
    }

    /// Wait until the socket is readable, or writable when `want_write`.
    ///
    /// Pends forever while disconnected so it can sit in a `select!`.
    pub async fn ready(&self, want_write: bool) -> Result<Readiness> {
        let Some(stream) = self.stream.as_ref() else {
            return std::future::pending().await;
        };
        let interest = if want_write {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        let ready = stream.ready(interest).await?;
        Ok(Readiness {
            readable: ready.is_readable() || ready.is_read_closed(),
            writable: ready.is_writable(),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("transport closed");
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn wait_readable(transport: &Transport) {
        let ready = transport.ready(false).await.unwrap();
        assert!(ready.readable);
    }

    #[tokio::test]
    async fn connects_and_exchanges_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut transport = Transport::new();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        let (connected, accepted) = tokio::join!(transport.connect("127.0.0.1", port), listener.accept());
        connected.unwrap();
        let (mut peer, _) = accepted.unwrap();
        assert_eq!(transport.state(), ConnectionState::Connected);

        assert_eq!(transport.send(b"NICK crab\r\n").unwrap(), IoStatus::Ready(11));
        let mut line = [0u8; 11];
        peer.read_exact(&mut line).await.unwrap();
        assert_eq!(&line, b"NICK crab\r\n");

        let mut buf = [0u8; 64];
        assert_eq!(transport.receive(&mut buf).unwrap(), IoStatus::WouldBlock);

        peer.write_all(b"PING :x\r\n").await.unwrap();
        wait_readable(&transport).await;
        assert_eq!(transport.receive(&mut buf).unwrap(), IoStatus::Ready(9));
        assert_eq!(&buf[..9], b"PING :x\r\n");
    }

    #[tokio::test]
    async fn peer_close_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = Transport::new();
        let (connected, accepted) = tokio::join!(transport.connect("127.0.0.1", port), listener.accept());
        connected.unwrap();
        drop(accepted.unwrap());

        wait_readable(&transport).await;
        let mut buf = [0u8; 16];
        assert!(matches!(transport.receive(&mut buf), Err(Error::TransportClosed)));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(matches!(transport.send(b"x"), Err(Error::TransportClosed)));
    }

    #[tokio::test]
    async fn refused_connect_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = Transport::new();
        let err = transport.connect("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }
}
