//! DCC transfer pool.
//!
//! Offers are vetted, given the first free slot, and then advanced one
//! non-blocking step at a time by [`TransferPool::tick`]. A slot that reached
//! a terminal state is reported once and reclaimed on the following tick.

use crate::config::DccConfig;
use crate::dcc::parser::{format_offer, parse_offer};
use crate::dcc::security::{check_filename, is_private_ip};
use crate::dcc::transfer::{Direction, Endpoint, Outcome, TransferRecord, TransferState};
use crate::dcc::{TransferError, TransferId};
use crate::irc::connection::CONNECT_TIMEOUT;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Number of transfers that can be in flight at once.
pub const POOL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub download_dir: PathBuf,
    /// Largest accepted offer in bytes, 0 for no limit.
    pub max_file_size: u64,
    pub reject_private_ips: bool,
    /// How long an outbound offer waits for the peer to connect.
    pub offer_timeout: Duration,
    pub connect_timeout: Duration,
}

impl TransferSettings {
    pub fn from_config(config: &DccConfig) -> Self {
        Self {
            download_dir: config.download_dir.clone(),
            max_file_size: config.max_file_size,
            reject_private_ips: config.reject_private_ips,
            offer_timeout: Duration::from_secs(config.offer_timeout_secs),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            max_file_size: 0,
            reject_private_ips: false,
            offer_timeout: Duration::from_secs(120),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Something that happened to a transfer during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferReport {
    Connected {
        id: TransferId,
        peer: String,
        filename: String,
    },
    Completed {
        id: TransferId,
        filename: String,
        bytes: u64,
    },
    Failed {
        id: TransferId,
        filename: String,
        reason: String,
    },
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferReport::Connected { id, peer, filename } => {
                write!(f, "DCC #{}: connected to {} for \"{}\"", id, peer, filename)
            }
            TransferReport::Completed { id, filename, bytes } => {
                write!(f, "DCC #{}: \"{}\" complete ({} bytes)", id, filename, bytes)
            }
            TransferReport::Failed { id, filename, reason } => {
                write!(f, "DCC #{}: \"{}\" failed: {}", id, filename, reason)
            }
        }
    }
}

#[derive(Debug)]
pub struct TransferPool {
    slots: Vec<TransferRecord>,
    active: usize,
    settings: TransferSettings,
}

impl TransferPool {
    pub fn new(settings: TransferSettings) -> Self {
        Self {
            slots: (0..POOL_CAPACITY).map(|_| TransferRecord::idle()).collect(),
            active: 0,
            settings,
        }
    }

    /// Number of non-idle slots.
    pub fn active(&self) -> usize {
        self.active
    }

    /// The transfer in slot `id`, unless that slot is idle.
    pub fn get(&self, id: TransferId) -> Option<&TransferRecord> {
        self.slots
            .get(id)
            .filter(|record| record.state() != TransferState::Idle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TransferId, &TransferRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, record)| record.state() != TransferState::Idle)
    }

    /// Accept an inbound `DCC SEND` offer from `sender`.
    ///
    /// On success the destination file exists and the connect is under way;
    /// on failure nothing was allocated.
    pub fn request(&mut self, sender: &str, payload: &str) -> Result<TransferId, TransferError> {
        let offer = parse_offer(payload)?;
        check_filename(&offer.filename)?;
        if self.settings.max_file_size > 0 && offer.size > self.settings.max_file_size {
            return Err(TransferError::TooLarge {
                size: offer.size,
                limit: self.settings.max_file_size,
            });
        }
        if self.settings.reject_private_ips && is_private_ip(&offer.address) {
            return Err(TransferError::PrivateAddress(offer.address));
        }

        let id = self.free_slot()?;
        let path = self.settings.download_dir.join(&offer.filename);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| TransferError::File {
                path: path.clone(),
                source,
            })?;

        let addr = SocketAddr::new(offer.address, offer.port);
        debug!(id, %addr, file = %offer.filename, "DCC connecting");
        let dial = Endpoint::Dialing(Box::pin(TcpStream::connect(addr)));

        self.slots[id] = TransferRecord::connecting(
            Direction::Receive,
            sender,
            &offer.filename,
            offer.size,
            path,
            file,
            dial,
            Instant::now() + self.settings.connect_timeout,
        );
        self.active += 1;
        info!(id, sender, file = %offer.filename, size = offer.size, "DCC offer accepted");
        Ok(id)
    }

    /// Offer a local file to `nick`.
    ///
    /// Returns the slot and the `DCC SEND` argument to deliver to the peer,
    /// advertising `advertise` as our address.
    pub fn offer(
        &mut self,
        nick: &str,
        path: &Path,
        advertise: IpAddr,
    ) -> Result<(TransferId, String), TransferError> {
        let meta = std::fs::metadata(path)
            .ok()
            .filter(|meta| meta.is_file())
            .ok_or_else(|| TransferError::NotFound(path.to_path_buf()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::NotFound(path.to_path_buf()))?;
        check_filename(&filename)?;

        let id = self.free_slot()?;
        let file = File::open(path).map_err(|source| TransferError::File {
            path: path.to_path_buf(),
            source,
        })?;

        let bind_ip: IpAddr = match advertise {
            IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        let std_listener = std::net::TcpListener::bind(SocketAddr::new(bind_ip, 0))
            .map_err(TransferError::Socket)?;
        std_listener
            .set_nonblocking(true)
            .map_err(TransferError::Socket)?;
        let listener = TcpListener::from_std(std_listener).map_err(TransferError::Socket)?;
        let port = listener
            .local_addr()
            .map_err(TransferError::Socket)?
            .port();

        let size = meta.len();
        self.slots[id] = TransferRecord::connecting(
            Direction::Send,
            nick,
            &filename,
            size,
            path.to_path_buf(),
            file,
            Endpoint::Listening(listener),
            Instant::now() + self.settings.offer_timeout,
        );
        self.active += 1;
        info!(id, nick, file = %filename, port, size, "DCC offer sent");
        Ok((id, format_offer(&filename, advertise, port, size)))
    }

    /// Advance every transfer by one non-blocking step.
    pub fn tick(&mut self) -> Vec<TransferReport> {
        let now = Instant::now();
        let mut reports = Vec::new();
        for (id, record) in self.slots.iter_mut().enumerate() {
            if record.state() == TransferState::Idle {
                continue;
            }
            if record.state().is_terminal() {
                *record = TransferRecord::idle();
                self.active -= 1;
                continue;
            }
            let report = match record.step(now) {
                None => continue,
                Some(Outcome::Connected) => TransferReport::Connected {
                    id,
                    peer: record.peer().to_string(),
                    filename: record.filename().to_string(),
                },
                Some(Outcome::Completed) => TransferReport::Completed {
                    id,
                    filename: record.filename().to_string(),
                    bytes: record.bytes_moved(),
                },
                Some(Outcome::Failed(reason)) => TransferReport::Failed {
                    id,
                    filename: record.filename().to_string(),
                    reason,
                },
            };
            reports.push(report);
        }
        debug_assert_eq!(self.active, self.iter().count());
        reports
    }

    /// Drop transfer `id` from any non-idle state. Returns false if the slot
    /// was already idle or does not exist.
    pub fn cancel(&mut self, id: TransferId) -> bool {
        let Some(record) = self.slots.get_mut(id) else {
            return false;
        };
        if record.state() == TransferState::Idle {
            return false;
        }
        record.abort();
        info!(id, file = %record.filename(), "DCC transfer cancelled");
        *record = TransferRecord::idle();
        self.active -= 1;
        true
    }

    fn free_slot(&self) -> Result<TransferId, TransferError> {
        self.slots
            .iter()
            .position(|record| record.state() == TransferState::Idle)
            .ok_or_else(|| {
                warn!(capacity = POOL_CAPACITY, "DCC pool full");
                TransferError::PoolFull(POOL_CAPACITY)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn pool_in(dir: &Path) -> TransferPool {
        TransferPool::new(TransferSettings {
            download_dir: dir.to_path_buf(),
            ..TransferSettings::default()
        })
    }

    async fn run_until_terminal(pool: &mut TransferPool, id: TransferId) -> Vec<TransferReport> {
        let mut reports = Vec::new();
        for _ in 0..1000 {
            reports.extend(pool.tick());
            if pool.get(id).is_some_and(|r| r.state().is_terminal()) {
                return reports;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transfer {} never finished", id);
    }

    #[tokio::test]
    async fn accepted_offer_starts_connecting() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());

        let id = pool.request("alice", "SEND report.txt 1.2.3.4 4000 1024").unwrap();
        let record = pool.get(id).unwrap();
        assert_eq!(record.state(), TransferState::Connecting);
        assert_eq!(record.direction(), Direction::Receive);
        assert_eq!(record.filename(), "report.txt");
        assert_eq!(record.peer(), "alice");
        assert_eq!(record.size(), 1024);
        assert_eq!(record.bytes_moved(), 0);
        assert!(record.has_socket());
        assert!(record.has_file());
        assert!(dir.path().join("report.txt").exists());
        assert_eq!(pool.active(), 1);
    }

    #[tokio::test]
    async fn rejected_offers_allocate_nothing() {
        let dir = TempDir::new().unwrap();
        let mut pool = TransferPool::new(TransferSettings {
            download_dir: dir.path().to_path_buf(),
            max_file_size: 100,
            reject_private_ips: true,
            ..TransferSettings::default()
        });

        assert!(matches!(
            pool.request("mallory", "SEND ../../etc/passwd 1.2.3.4 4000 10"),
            Err(TransferError::UnsafeFilename(_))
        ));
        assert!(matches!(
            pool.request("mallory", "SEND big.iso 1.2.3.4 4000 101"),
            Err(TransferError::TooLarge { size: 101, limit: 100 })
        ));
        assert!(matches!(
            pool.request("mallory", "SEND a.txt 192.168.1.5 4000 10"),
            Err(TransferError::PrivateAddress(_))
        ));
        assert!(matches!(
            pool.request("mallory", "SEND a.txt"),
            Err(TransferError::Malformed(_))
        ));

        assert_eq!(pool.active(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn existing_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();
        let mut pool = pool_in(dir.path());

        assert!(matches!(
            pool.request("alice", "SEND notes.txt 1.2.3.4 4000 10"),
            Err(TransferError::File { .. })
        ));
        assert_eq!(pool.active(), 0);
        assert_eq!(std::fs::read(dir.path().join("notes.txt")).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn full_pool_rejects_next_offer() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());

        for i in 0..POOL_CAPACITY {
            let id = pool
                .request("alice", &format!("SEND f{}.txt 1.2.3.4 4000 10", i))
                .unwrap();
            assert_eq!(id, i);
        }
        assert_eq!(pool.active(), POOL_CAPACITY);

        let overflow = format!("SEND f{}.txt 1.2.3.4 4000 10", POOL_CAPACITY);
        assert!(matches!(
            pool.request("alice", &overflow),
            Err(TransferError::PoolFull(POOL_CAPACITY))
        ));
        assert_eq!(pool.active(), POOL_CAPACITY);
        assert!(!dir.path().join(format!("f{}.txt", POOL_CAPACITY)).exists());
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());

        assert!(!pool.cancel(3));
        assert!(!pool.cancel(POOL_CAPACITY + 5));
        assert_eq!(pool.active(), 0);

        let id = pool.request("alice", "SEND a.txt 1.2.3.4 4000 10").unwrap();
        assert!(pool.cancel(id));
        assert!(!pool.cancel(id));
        assert_eq!(pool.active(), 0);
        assert!(pool.get(id).is_none());
        // nothing was received, so the placeholder file is gone
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn tick_never_waits_on_silent_peers() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // accept every connection and then say nothing
        let peer = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        for i in 0..POOL_CAPACITY {
            pool.request("alice", &format!("SEND s{}.bin 127.0.0.1 {} 1000", i, port))
                .unwrap();
        }

        let mut connected = 0;
        for _ in 0..200 {
            let started = Instant::now();
            let reports = pool.tick();
            assert!(started.elapsed() < Duration::from_millis(100));
            connected += reports
                .iter()
                .filter(|r| matches!(r, TransferReport::Connected { .. }))
                .count();
            if connected == POOL_CAPACITY {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(connected, POOL_CAPACITY);

        for _ in 0..10 {
            let started = Instant::now();
            assert!(pool.tick().is_empty());
            assert!(started.elapsed() < Duration::from_millis(100));
        }
        assert!(pool
            .iter()
            .all(|(_, r)| r.state() == TransferState::Transferring));
        peer.abort();
    }

    #[tokio::test]
    async fn surplus_bytes_are_not_written() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data = vec![7u8; 3000];

        let mut sent = data.clone();
        sent.extend_from_slice(&[9u8; 500]);
        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&sent).await.unwrap();
            let mut acks = Vec::new();
            let _ = sock.read_to_end(&mut acks).await;
        });

        let offer = format!("SEND exact.bin 127.0.0.1 {} {}", port, data.len());
        let id = pool.request("alice", &offer).unwrap();
        run_until_terminal(&mut pool, id).await;

        let record = pool.get(id).unwrap();
        assert_eq!(record.state(), TransferState::Complete);
        assert_eq!(record.bytes_moved(), data.len() as u64);
        assert_eq!(std::fs::read(dir.path().join("exact.bin")).unwrap(), data);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn receive_completes_at_declared_size() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();

        let sent = data.clone();
        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&sent).await.unwrap();
            // keep the connection open; the receiver must stop on its own
            let mut acks = Vec::new();
            sock.read_to_end(&mut acks).await.unwrap();
            acks
        });

        let offer = format!("SEND data.bin 127.0.0.1 {} {}", port, data.len());
        let id = pool.request("alice", &offer).unwrap();
        let reports = run_until_terminal(&mut pool, id).await;

        let record = pool.get(id).unwrap();
        assert_eq!(record.state(), TransferState::Complete);
        assert_eq!(record.bytes_moved(), data.len() as u64);
        assert!(!record.has_socket());
        assert!(!record.has_file());
        assert!(matches!(reports.first(), Some(TransferReport::Connected { .. })));
        assert_eq!(
            reports.last(),
            Some(&TransferReport::Completed {
                id,
                filename: "data.bin".into(),
                bytes: data.len() as u64,
            })
        );
        assert_eq!(std::fs::read(dir.path().join("data.bin")).unwrap(), data);

        let acks = peer.await.unwrap();
        assert_eq!(acks.len() % 4, 0);
        assert_eq!(acks[acks.len() - 4..], (data.len() as u32).to_be_bytes());

        assert!(pool.tick().is_empty());
        assert!(pool.get(id).is_none());
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test]
    async fn short_close_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&[1u8; 100]).await.unwrap();
        });

        let id = pool
            .request("alice", &format!("SEND part.bin 127.0.0.1 {} 1000", port))
            .unwrap();
        run_until_terminal(&mut pool, id).await;

        let record = pool.get(id).unwrap();
        assert_eq!(record.state(), TransferState::Error);
        assert_eq!(record.bytes_moved(), 100);
        assert!(record.failure().unwrap().contains("truncated"));
        assert!(!record.has_socket());
        assert_eq!(std::fs::read(dir.path().join("part.bin")).unwrap().len(), 100);
    }

    #[tokio::test]
    async fn unknown_size_completes_on_close() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"hello").await.unwrap();
        });

        let id = pool
            .request("alice", &format!("SEND hi.txt 127.0.0.1 {} 0", port))
            .unwrap();
        run_until_terminal(&mut pool, id).await;

        assert_eq!(pool.get(id).unwrap().state(), TransferState::Complete);
        assert_eq!(std::fs::read(dir.path().join("hi.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn refused_connect_fails_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let id = pool
            .request("alice", &format!("SEND gone.bin 127.0.0.1 {} 10", port))
            .unwrap();
        let reports = run_until_terminal(&mut pool, id).await;

        assert_eq!(pool.get(id).unwrap().state(), TransferState::Error);
        assert!(matches!(reports.last(), Some(TransferReport::Failed { .. })));
        assert!(!dir.path().join("gone.bin").exists());
    }

    #[tokio::test]
    async fn outbound_offer_streams_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("my notes.txt");
        let data: Vec<u8> = (0..30_000u32).map(|i| (i % 13) as u8).collect();
        std::fs::write(&source, &data).unwrap();
        let mut pool = pool_in(dir.path());

        let (id, payload) = pool
            .offer("bob", &source, "127.0.0.1".parse().unwrap())
            .unwrap();
        assert_eq!(pool.get(id).unwrap().direction(), Direction::Send);
        assert_eq!(pool.get(id).unwrap().state(), TransferState::Connecting);

        let offer = parse_offer(&payload).unwrap();
        assert_eq!(offer.filename, "my notes.txt");
        assert_eq!(offer.size, data.len() as u64);

        let peer = tokio::spawn(async move {
            let mut sock = TcpStream::connect(("127.0.0.1", offer.port)).await.unwrap();
            let mut received = Vec::new();
            sock.read_to_end(&mut received).await.unwrap();
            received
        });

        run_until_terminal(&mut pool, id).await;
        let record = pool.get(id).unwrap();
        assert_eq!(record.state(), TransferState::Complete);
        assert_eq!(record.bytes_moved(), data.len() as u64);
        assert_eq!(peer.await.unwrap(), data);
        // the source file is never touched
        assert_eq!(std::fs::read(&source).unwrap(), data);
    }

    #[tokio::test]
    async fn offer_of_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let mut pool = pool_in(dir.path());
        assert!(matches!(
            pool.offer("bob", &dir.path().join("nope.txt"), "127.0.0.1".parse().unwrap()),
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(
            pool.offer("bob", dir.path(), "127.0.0.1".parse().unwrap()),
            Err(TransferError::NotFound(_))
        ));
        assert_eq!(pool.active(), 0);
    }
}
