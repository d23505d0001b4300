//! DCC offer parser.
//!
//! Parses `SEND <filename> <address> <port> <size>` (the argument of a CTCP
//! `DCC` request). The filename may be double-quoted to carry spaces; the
//! address is either the classic unsigned 32-bit decimal IPv4 form or a
//! textual IPv4/IPv6 literal.

use crate::dcc::TransferError;
use crate::irc::token::words;
use std::net::{IpAddr, Ipv4Addr};

/// A parsed DCC SEND offer. The filename has not been vetted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub filename: String,
    pub address: IpAddr,
    pub port: u16,
    pub size: u64,
}

pub fn parse_offer(payload: &str) -> Result<Offer, TransferError> {
    let mut tokens = words(payload);
    match tokens.next() {
        Some(kind) if kind.eq_ignore_ascii_case("SEND") => {}
        _ => return Err(TransferError::Malformed("not a SEND offer")),
    }

    let first = tokens.next().ok_or(TransferError::Malformed("missing filename"))?;
    let filename = match first.strip_prefix('"') {
        Some(opened) => {
            let mut name = String::from(opened);
            // rejoin tokens until one closes the quote
            while !name.ends_with('"') {
                let next = tokens
                    .next()
                    .ok_or(TransferError::Malformed("unterminated quoted filename"))?;
                name.push(' ');
                name.push_str(next);
            }
            name.pop();
            name
        }
        None => first.to_string(),
    };

    let address = tokens
        .next()
        .and_then(parse_address)
        .ok_or(TransferError::Malformed("bad address"))?;
    let port = tokens
        .next()
        .and_then(|p| p.parse::<u16>().ok())
        .filter(|&p| p != 0)
        .ok_or(TransferError::Malformed("bad port"))?;
    let size = tokens
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(TransferError::Malformed("bad size"))?;

    Ok(Offer {
        filename,
        address,
        port,
        size,
    })
}

fn parse_address(token: &str) -> Option<IpAddr> {
    if token.bytes().all(|b| b.is_ascii_digit()) {
        let decimal: u32 = token.parse().ok()?;
        return Some(IpAddr::V4(Ipv4Addr::from(decimal)));
    }
    token.parse().ok()
}

/// Encode an address the way DCC peers expect it.
pub fn encode_address(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => u32::from(v4).to_string(),
        IpAddr::V6(v6) => v6.to_string(),
    }
}

/// Build the argument of an outbound `DCC SEND` request.
pub fn format_offer(filename: &str, address: IpAddr, port: u16, size: u64) -> String {
    let name = if filename.contains(' ') {
        format!("\"{}\"", filename)
    } else {
        filename.to_string()
    };
    format!("SEND {} {} {} {}", name, encode_address(address), port, size)
}
