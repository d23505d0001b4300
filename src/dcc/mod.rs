//! DCC (Direct Client-to-Client) file transfer subsystem.
//!
//! Offers arrive as CTCP `DCC SEND` payloads. Each accepted transfer lives
//! in one slot of a fixed-size [`TransferPool`] and is advanced by
//! [`TransferPool::tick`], which never waits on a socket.

pub mod manager;
pub mod parser;
pub mod security;
pub mod transfer;

pub use manager::{TransferPool, TransferReport, TransferSettings};
pub use transfer::{Direction, TransferState};

use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Stable handle of a transfer: its slot index in the pool.
pub type TransferId = usize;

/// Why an offer (inbound or outbound) did not become a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("malformed offer: {0}")]
    Malformed(&'static str),

    #[error("unsafe filename {0:?}")]
    UnsafeFilename(String),

    #[error("all {0} transfer slots are busy")]
    PoolFull(usize),

    #[error("file size {size} exceeds limit {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("private/loopback address {0} rejected")]
    PrivateAddress(IpAddr),

    #[error("cannot open {}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not a regular file", .0.display())]
    NotFound(PathBuf),

    #[error("socket error: {0}")]
    Socket(std::io::Error),
}
