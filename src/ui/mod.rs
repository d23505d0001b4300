//! Terminal rendering.
//!
//! The session hands every parsed event and every local notice to a
//! [`Frontend`]. [`TerminalUi`] prints one timestamped, coloured line each.

pub mod mirc_colors;
mod theme;

use crate::app::state::{Notice, NoticeKind};
use crate::irc::event::{Event, EventKind};
use crossterm::style::{ContentStyle, StyledContent};
use mirc_colors::parse_mirc_formatted;
use std::io::{self, Write};
use theme::Theme;
use tracing::debug;

pub trait Frontend {
    fn render(&mut self, event: &Event);
    fn notify(&mut self, notice: &Notice);
}

type Line = Vec<StyledContent<String>>;

pub struct TerminalUi<W: Write> {
    out: W,
    timestamp_format: String,
}

impl TerminalUi<io::Stdout> {
    pub fn stdout(timestamp_format: &str) -> Self {
        Self::new(io::stdout(), timestamp_format)
    }
}

impl<W: Write> TerminalUi<W> {
    pub fn new(out: W, timestamp_format: &str) -> Self {
        Self {
            out,
            timestamp_format: timestamp_format.to_string(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, line: Line) {
        let timestamp = chrono::Local::now().format(&self.timestamp_format).to_string();
        let result = write!(self.out, "{} ", Theme::timestamp().apply(timestamp))
            .and_then(|_| line.iter().try_for_each(|part| write!(self.out, "{}", part)))
            .and_then(|_| writeln!(self.out))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            debug!(error = %e, "terminal write failed");
        }
    }
}

impl<W: Write> Frontend for TerminalUi<W> {
    fn render(&mut self, event: &Event) {
        if let Some(line) = describe(event) {
            self.print(line);
        }
    }

    fn notify(&mut self, notice: &Notice) {
        let line = match notice.kind {
            NoticeKind::Info => vec![styled(Theme::system_message(), format!("*** {}", notice.text))],
            NoticeKind::Error => vec![styled(Theme::error_message(), format!("!!! {}", notice.text))],
            NoticeKind::Sent => vec![styled(Theme::nick_self(), notice.text.clone())],
        };
        self.print(line);
    }
}

fn styled(style: ContentStyle, text: impl Into<String>) -> StyledContent<String> {
    StyledContent::new(style, text.into())
}

fn ctcp_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::CtcpVersion => "VERSION",
        EventKind::CtcpPing => "PING",
        EventKind::CtcpTime => "TIME",
        EventKind::CtcpClientinfo => "CLIENTINFO",
        _ => "CTCP",
    }
}

/// The line shown for `event`, or `None` for protocol chatter.
fn describe(event: &Event) -> Option<Line> {
    let nick = event.origin.nick.as_str();
    let text = event.text();
    let channel = event.channel.as_deref().unwrap_or("");
    let mut line = Line::new();

    match event.kind {
        EventKind::Ping | EventKind::ExtAuthenticate => return None,
        EventKind::Privmsg => {
            if event.is_direct() {
                line.push(styled(Theme::nick_other(), format!("*{}* ", nick)));
            } else {
                line.push(styled(Theme::channel(), format!("[{}] ", channel)));
                line.push(styled(Theme::nick_other(), format!("<{}> ", nick)));
            }
            line.extend(parse_mirc_formatted(text, Theme::message_text()));
        }
        EventKind::Notice => {
            line.push(styled(Theme::notice(), format!("-{}- ", nick)));
            line.extend(parse_mirc_formatted(text, Theme::notice()));
        }
        EventKind::CtcpAction => {
            if !event.is_direct() {
                line.push(styled(Theme::channel(), format!("[{}] ", channel)));
            }
            line.push(styled(Theme::action_message(), format!("* {} ", nick)));
            line.extend(parse_mirc_formatted(text, Theme::action_message()));
        }
        EventKind::Join => line.push(styled(
            Theme::join_message(),
            format!("--> {} has joined {}", nick, channel),
        )),
        EventKind::Part => line.push(styled(
            Theme::part_message(),
            format!("<-- {} has left {} ({})", nick, channel, text),
        )),
        EventKind::Quit => line.push(styled(
            Theme::part_message(),
            format!("<-- {} has quit ({})", nick, text),
        )),
        EventKind::Nick => line.push(styled(
            Theme::system_message(),
            format!("{} is now known as {}", nick, text),
        )),
        EventKind::Numeric => {
            let body = if text.is_empty() {
                event.params.as_deref().unwrap_or("")
            } else {
                text
            };
            line.push(styled(Theme::server_message(), format!("-{}- ", nick)));
            line.extend(parse_mirc_formatted(body, Theme::server_message()));
        }
        EventKind::CtcpVersion
        | EventKind::CtcpPing
        | EventKind::CtcpTime
        | EventKind::CtcpClientinfo => {
            let name = ctcp_name(event.kind);
            let description = if event.is_reply() {
                format!("CTCP {} reply from {}: {}", name, nick, text)
            } else {
                format!("CTCP {} request from {}", name, nick)
            };
            line.push(styled(Theme::system_message(), description));
        }
        EventKind::CtcpDcc => line.push(styled(
            Theme::system_message(),
            format!("DCC {} from {}", text, nick),
        )),
        EventKind::Error => line.push(styled(
            Theme::error_message(),
            format!("!!! server error: {}", text),
        )),
        EventKind::Raw if event.command.is_empty() => {
            line.push(styled(Theme::server_message(), text));
        }
        EventKind::Raw => {
            let params = event.params.as_deref().unwrap_or("");
            line.push(styled(
                Theme::server_message(),
                format!("{} {} {}", event.command, params, text),
            ));
        }
    }
    Some(line)
}
