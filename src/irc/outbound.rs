//! Outbound line formatting and the write queue.
//!
//! [`Transport::send`] never retries a partial write, so the queue keeps
//! whatever was not accepted and re-issues it on the next flush.

use crate::error::Result;
use crate::irc::connection::{IoStatus, Transport};
use crate::irc::ctcp;
use crate::irc::framing::MAX_LINE;
use crate::irc::token::clamp;
use std::fmt;

/// A line the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing<'a> {
    Pass(&'a str),
    Nick(&'a str),
    User { username: &'a str, realname: &'a str },
    CapReq(&'a str),
    CapEnd,
    Authenticate(&'a str),
    Join(&'a str),
    Pong(&'a str),
    Privmsg { target: &'a str, text: &'a str },
    Notice { target: &'a str, text: &'a str },
    /// CTCP request inside a PRIVMSG (ACTION, DCC offers, ...).
    Ctcp { target: &'a str, command: &'a str, argument: &'a str },
    /// CTCP reply inside a NOTICE.
    CtcpReply { target: &'a str, command: &'a str, argument: &'a str },
    Quit(&'a str),
    Raw(&'a str),
}

impl fmt::Display for Outgoing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outgoing::Pass(password) => write!(f, "PASS {}", password),
            Outgoing::Nick(nick) => write!(f, "NICK {}", nick),
            Outgoing::User { username, realname } => write!(f, "USER {} 0 * :{}", username, realname),
            Outgoing::CapReq(caps) => write!(f, "CAP REQ :{}", caps),
            Outgoing::CapEnd => write!(f, "CAP END"),
            Outgoing::Authenticate(payload) => write!(f, "AUTHENTICATE {}", payload),
            Outgoing::Join(channel) => write!(f, "JOIN {}", channel),
            Outgoing::Pong(payload) => write!(f, "PONG :{}", payload),
            Outgoing::Privmsg { target, text } => {
                write!(f, "PRIVMSG {} :{}", target, ctcp::strip_markers(text))
            }
            Outgoing::Notice { target, text } => {
                write!(f, "NOTICE {} :{}", target, ctcp::strip_markers(text))
            }
            Outgoing::Ctcp { target, command, argument } => {
                let head = format!("PRIVMSG {} :", target);
                write!(f, "{}{}", head, fitted_ctcp(head.len(), command, argument))
            }
            Outgoing::CtcpReply { target, command, argument } => {
                let head = format!("NOTICE {} :", target);
                write!(f, "{}{}", head, fitted_ctcp(head.len(), command, argument))
            }
            Outgoing::Quit(message) => write!(f, "QUIT :{}", message),
            Outgoing::Raw(line) => f.write_str(line),
        }
    }
}

/// Wrap a CTCP payload, shortening the argument so the closing marker
/// survives the line clamp in [`Outbound::push_line`].
fn fitted_ctcp(head_len: usize, command: &str, argument: &str) -> String {
    let argument = ctcp::strip_markers(argument);
    // two markers and the separating space
    let overhead = head_len + command.len() + 3;
    let budget = (MAX_LINE - 2).saturating_sub(overhead);
    ctcp::wrap(command, clamp(&argument, budget))
}

/// Bytes waiting to be written to the server.
#[derive(Debug, Default)]
pub struct Outbound {
    pending: Vec<u8>,
}

impl Outbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: Outgoing<'_>) {
        self.push_line(&line.to_string());
    }

    /// Queue one line. CR, LF and NUL are stripped so a line can never
    /// smuggle a second command, and the line is clamped to fit
    /// [`MAX_LINE`] with its terminator.
    pub fn push_line(&mut self, line: &str) {
        let clean: String = line.chars().filter(|c| !matches!(c, '\r' | '\n' | '\0')).collect();
        let clean = clamp(&clean, MAX_LINE - 2);
        if clean.is_empty() {
            return;
        }
        self.pending.extend_from_slice(clean.as_bytes());
        self.pending.extend_from_slice(b"\r\n");
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Drop the first `n` bytes after they were written.
    pub fn consume(&mut self, n: usize) {
        self.pending.drain(..n.min(self.pending.len()));
    }

    /// Write as much as the socket accepts right now.
    pub fn flush(&mut self, transport: &mut Transport) -> Result<()> {
        while !self.pending.is_empty() {
            match transport.send(&self.pending)? {
                IoStatus::Ready(0) | IoStatus::WouldBlock => break,
                IoStatus::Ready(n) => self.consume(n),
            }
        }
        Ok(())
    }

    /// Take every queued line, for inspection in tests.
    #[cfg(test)]
    pub fn take_lines(&mut self) -> Vec<String> {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text.split_terminator("\r\n").map(str::to_string).collect()
    }
}
