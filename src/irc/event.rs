//! Canonical events parsed from protocol lines.
//!
//! One [`Event`] is built per framed line, dispatched once, then dropped.
//! Every string field is copied through [`bounded`] with the field's own
//! capacity, so an oversized line is clamped rather than rejected.

use crate::irc::ctcp;
use crate::irc::framing::MAX_LINE;
use crate::irc::token::{bounded, split_at_first, words};
use tracing::trace;

pub const NICK_CAPACITY: usize = 64;
pub const USER_CAPACITY: usize = 64;
pub const HOST_CAPACITY: usize = 256;
pub const COMMAND_CAPACITY: usize = 32;
pub const CHANNEL_CAPACITY: usize = 200;
pub const PARAMS_CAPACITY: usize = MAX_LINE;
pub const MESSAGE_CAPACITY: usize = MAX_LINE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ping,
    Privmsg,
    Notice,
    Join,
    Part,
    Quit,
    Nick,
    Numeric,
    CtcpAction,
    CtcpVersion,
    CtcpPing,
    CtcpTime,
    CtcpClientinfo,
    CtcpDcc,
    ExtAuthenticate,
    Error,
    Raw,
}

/// Who sent a line: `nick[!user][@host]`, or a server name in `nick`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Origin {
    pub fn parse(prefix: &str) -> Self {
        let (nick, rest) = match prefix.split_once('!') {
            Some((nick, rest)) => (nick, Some(rest)),
            None => (prefix, None),
        };
        let (nick, user, host) = match rest {
            Some(rest) => match rest.split_once('@') {
                Some((user, host)) => (nick, Some(user), Some(host)),
                None => (nick, Some(rest), None),
            },
            None => match nick.split_once('@') {
                Some((nick, host)) => (nick, None, Some(host)),
                None => (nick, None, None),
            },
        };
        Self {
            nick: bounded(nick, NICK_CAPACITY),
            user: user.map(|u| bounded(u, USER_CAPACITY)),
            host: host.map(|h| bounded(h, HOST_CAPACITY)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub origin: Origin,
    /// Command token as received (`PRIVMSG`, `001`, ...).
    pub command: String,
    /// First channel-looking middle parameter.
    pub channel: Option<String>,
    /// Everything between the command and the trailing parameter.
    pub params: Option<String>,
    /// Trailing parameter, or the CTCP argument for CTCP kinds.
    pub message: Option<String>,
    pub numeric: Option<u16>,
}

pub fn is_channel_prefix(c: char) -> bool {
    c == '#' || c == '&'
}

impl Event {
    fn new(kind: EventKind, command: &str) -> Self {
        Self {
            kind,
            origin: Origin::default(),
            command: bounded(command, COMMAND_CAPACITY),
            channel: None,
            params: None,
            message: None,
            numeric: None,
        }
    }

    /// Lines that do not fit the grammar still become an event, carrying the
    /// whole line as its message.
    fn malformed(line: &str) -> Self {
        trace!(line, "unparseable line");
        let mut event = Self::new(EventKind::Raw, "");
        event.message = Some(bounded(line, MESSAGE_CAPACITY));
        event
    }

    pub fn from_bytes(line: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(line))
    }

    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(payload) = line.strip_prefix("PING ") {
            let mut event = Self::new(EventKind::Ping, "PING");
            let payload = payload.strip_prefix(':').unwrap_or(payload);
            event.message = Some(bounded(payload, MESSAGE_CAPACITY));
            return event;
        }
        if line.trim_end() == "AUTHENTICATE +" {
            return Self::new(EventKind::ExtAuthenticate, "AUTHENTICATE");
        }
        if let Some(payload) = line.strip_prefix("ERROR ") {
            let mut event = Self::new(EventKind::Error, "ERROR");
            let payload = payload.strip_prefix(':').unwrap_or(payload);
            event.message = Some(bounded(payload, MESSAGE_CAPACITY));
            return event;
        }

        let Some(rest) = line.strip_prefix(':') else {
            return Self::malformed(line);
        };
        let (prefix, rest) = split_at_first(rest, |c| c == ' ');
        let rest = rest.trim_start_matches(' ');
        if prefix.is_empty() || rest.is_empty() {
            return Self::malformed(line);
        }

        let (command, after) = split_at_first(rest, |c| c == ' ' || is_channel_prefix(c));
        if command.is_empty() {
            return Self::malformed(line);
        }
        let (middle, trailing) = match after.find(" :") {
            Some(i) => (&after[..i], Some(&after[i + 2..])),
            None => (after, None),
        };

        let kind = classify(command);
        let mut event = Self::new(kind, command);
        event.origin = Origin::parse(prefix);

        let middle = middle.trim();
        if !middle.is_empty() {
            event.params = Some(bounded(middle, PARAMS_CAPACITY));
        }
        event.channel = words(middle)
            .find(|w| w.starts_with(is_channel_prefix))
            .map(|c| bounded(c, CHANNEL_CAPACITY));
        event.message = trailing.map(|t| bounded(t, MESSAGE_CAPACITY));

        match kind {
            EventKind::Numeric => event.numeric = command.parse().ok(),
            // Some servers send `JOIN :#channel`
            EventKind::Join if event.channel.is_none() => {
                event.channel = trailing
                    .and_then(|t| words(t).next())
                    .filter(|w| w.starts_with(is_channel_prefix))
                    .map(|c| bounded(c, CHANNEL_CAPACITY));
            }
            EventKind::Privmsg | EventKind::Notice => event.apply_ctcp(),
            _ => {}
        }
        event
    }

    /// Reclassify a PRIVMSG/NOTICE whose trailing text is an escaped payload.
    fn apply_ctcp(&mut self) {
        let Some((kind, argument)) = self.message.as_deref().and_then(|text| {
            let (command, argument) = ctcp::unwrap(text)?;
            Some((ctcp_kind(command), bounded(argument, MESSAGE_CAPACITY)))
        }) else {
            return;
        };
        match kind {
            Some(kind) => {
                self.kind = kind;
                self.message = Some(argument);
            }
            None => self.message = Some(String::new()),
        }
    }

    /// Sent to us rather than to a channel.
    pub fn is_direct(&self) -> bool {
        self.channel.is_none()
    }

    /// CTCP payloads carried in a NOTICE are replies, never requests.
    pub fn is_reply(&self) -> bool {
        self.command.eq_ignore_ascii_case("NOTICE")
    }

    /// First middle parameter (the message target for PRIVMSG/NOTICE).
    pub fn target(&self) -> Option<&str> {
        self.params.as_deref().and_then(|p| words(p).next())
    }

    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

fn classify(command: &str) -> EventKind {
    if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
        return EventKind::Numeric;
    }
    match command.to_ascii_uppercase().as_str() {
        "PRIVMSG" => EventKind::Privmsg,
        "NOTICE" => EventKind::Notice,
        "JOIN" => EventKind::Join,
        "PART" => EventKind::Part,
        "QUIT" => EventKind::Quit,
        "NICK" => EventKind::Nick,
        "PING" => EventKind::Ping,
        "ERROR" => EventKind::Error,
        _ => EventKind::Raw,
    }
}

fn ctcp_kind(command: &str) -> Option<EventKind> {
    Some(match command.to_ascii_uppercase().as_str() {
        "ACTION" => EventKind::CtcpAction,
        "VERSION" => EventKind::CtcpVersion,
        "PING" => EventKind::CtcpPing,
        "TIME" => EventKind::CtcpTime,
        "CLIENTINFO" => EventKind::CtcpClientinfo,
        "DCC" => EventKind::CtcpDcc,
        _ => return None,
    })
}
