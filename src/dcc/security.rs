//! DCC security checks.
//!
//! Filenames offered by peers are vetted before anything is opened:
//! - **Path traversal**: names with separators or parent segments are
//!   rejected outright, never rewritten, so a download always lands directly
//!   in the download directory.
//! - **Hidden files**: leading dots are rejected.
//! - **Private IP rejection**: optional, for offers pointing into private,
//!   loopback, or link-local networks.

use crate::dcc::TransferError;
use std::net::IpAddr;

/// Longest filename accepted from a peer, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Reject any filename that could escape the download directory.
pub fn check_filename(name: &str) -> Result<(), TransferError> {
    let has_separator = name.contains(['/', '\\']);
    let has_parent = name.split(['/', '\\']).any(|segment| segment == "..");
    if name.is_empty()
        || name.starts_with('.')
        || has_separator
        || has_parent
        || name.len() > MAX_FILENAME_LEN
        || name.chars().any(char::is_control)
    {
        return Err(TransferError::UnsafeFilename(name.to_string()));
    }
    Ok(())
}

/// Check if an IP address is private/loopback
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
