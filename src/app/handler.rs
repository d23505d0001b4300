//! Protocol responders.
//!
//! Each handler reacts to one kind of [`Event`] by updating the session and
//! queueing outbound lines. None of them touch a socket directly.

use crate::app::dispatch::Dispatcher;
use crate::app::state::SessionState;
use crate::config::SaslMechanism;
use crate::irc::event::{Event, EventKind};
use crate::irc::outbound::Outgoing;
use crate::irc::token::words;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Local;
use tracing::{debug, trace, warn};

/// Sub-commands we answer, as advertised in a CLIENTINFO reply.
pub const CLIENTINFO: &str = "ACTION CLIENTINFO DCC PING TIME VERSION";

const RPL_WELCOME: u16 = 1;
const ERR_NICKNAMEINUSE: u16 = 433;
const RPL_LOGGEDIN: u16 = 900;
const RPL_SASLSUCCESS: u16 = 903;

/// The responder table every session starts with.
pub fn dispatcher() -> Dispatcher {
    Dispatcher::new(on_unhandled)
        .register(EventKind::Ping, on_ping)
        .register(EventKind::ExtAuthenticate, on_authenticate)
        .register(EventKind::Numeric, on_numeric)
        .register(EventKind::Raw, on_raw)
        .register(EventKind::Join, on_join)
        .register(EventKind::Nick, on_nick)
        .register(EventKind::CtcpVersion, on_ctcp_version)
        .register(EventKind::CtcpPing, on_ctcp_ping)
        .register(EventKind::CtcpTime, on_ctcp_time)
        .register(EventKind::CtcpClientinfo, on_ctcp_clientinfo)
        .register(EventKind::CtcpDcc, on_ctcp_dcc)
}

fn on_ping(state: &mut SessionState, event: &Event) {
    state.send(Outgoing::Pong(event.text()));
}

/// The server is ready for our SASL credentials.
fn on_authenticate(state: &mut SessionState, _: &Event) {
    let Some(sasl) = state.config.server.sasl.clone() else {
        warn!("AUTHENTICATE + without SASL configured");
        state.send(Outgoing::Authenticate("*"));
        state.send(Outgoing::CapEnd);
        return;
    };
    match sasl.mechanism {
        SaslMechanism::External => state.send(Outgoing::Authenticate("+")),
        SaslMechanism::Plain => match plain_token(&sasl) {
            Some(token) => state.send(Outgoing::Authenticate(&token)),
            None => {
                state.error("SASL PLAIN needs a token or an account and password");
                state.send(Outgoing::Authenticate("*"));
            }
        },
    }
    state.send(Outgoing::CapEnd);
}

/// Base64 of `authzid \0 authcid \0 password`, unless a token was given.
fn plain_token(sasl: &crate::config::SaslConfig) -> Option<String> {
    if let Some(token) = &sasl.token {
        return Some(token.clone());
    }
    let account = sasl.account.as_deref()?;
    let password = sasl.password.as_deref()?;
    let raw = format!("{}\0{}\0{}", account, account, password);
    Some(BASE64.encode(raw))
}

fn on_numeric(state: &mut SessionState, event: &Event) {
    match event.numeric {
        Some(RPL_WELCOME) => {
            if let Some(nick) = event.target() {
                state.nickname = nick.to_string();
            }
            state.registered = true;
            let channels = state.config.server.channels.clone();
            for channel in &channels {
                state.send(Outgoing::Join(channel));
            }
        }
        Some(ERR_NICKNAMEINUSE) if !state.registered => {
            state.nickname.push('_');
            let nick = state.nickname.clone();
            debug!(%nick, "nickname in use, retrying");
            state.send(Outgoing::Nick(&nick));
        }
        Some(RPL_LOGGEDIN) | Some(RPL_SASLSUCCESS) => {
            state.info(event.text());
        }
        Some(code @ (902 | 904 | 905 | 906)) => {
            state.send(Outgoing::CapEnd);
            state.error(format!("SASL authentication failed ({}): {}", code, event.text()));
        }
        _ => {}
    }
}

/// Commands without an event kind of their own. Only `CAP` needs an answer.
fn on_raw(state: &mut SessionState, event: &Event) {
    if !event.command.eq_ignore_ascii_case("CAP") {
        trace!(command = %event.command, "unclassified command");
        return;
    }
    let params = event.params.as_deref().unwrap_or("");
    let acked = words(params).any(|w| w.eq_ignore_ascii_case("ACK"));
    let nacked = words(params).any(|w| w.eq_ignore_ascii_case("NAK"));
    let sasl = words(event.text()).any(|cap| cap.eq_ignore_ascii_case("sasl"));

    let mechanism = state.config.server.sasl.as_ref().map(|s| s.mechanism.as_str());
    match (mechanism, acked, nacked) {
        (Some(mechanism), true, _) if sasl => state.send(Outgoing::Authenticate(mechanism)),
        (_, _, true) => {
            state.error(format!("server refused capabilities: {}", event.text()));
            state.send(Outgoing::CapEnd);
        }
        _ => {}
    }
}

fn on_join(state: &mut SessionState, event: &Event) {
    if let Some(channel) = &event.channel {
        if state.is_me(&event.origin.nick) {
            state.current_channel = Some(channel.clone());
        }
    }
}

fn on_nick(state: &mut SessionState, event: &Event) {
    if !state.is_me(&event.origin.nick) {
        return;
    }
    let new_nick = event
        .message
        .as_deref()
        .or_else(|| event.target())
        .map(str::trim)
        .filter(|nick| !nick.is_empty());
    if let Some(nick) = new_nick {
        state.nickname = nick.to_string();
    }
}

/// CTCP requests get a reply; CTCP replies (in a NOTICE) never do.
fn ctcp_request(event: &Event) -> Option<&str> {
    if event.is_reply() || event.origin.nick.is_empty() {
        return None;
    }
    Some(&event.origin.nick)
}

fn on_ctcp_version(state: &mut SessionState, event: &Event) {
    let Some(from) = ctcp_request(event) else { return };
    if state.config.ctcp.reply_version {
        let version = state.config.ctcp.version_string.clone();
        state.send(Outgoing::CtcpReply {
            target: from,
            command: "VERSION",
            argument: &version,
        });
    }
}

fn on_ctcp_ping(state: &mut SessionState, event: &Event) {
    let Some(from) = ctcp_request(event) else { return };
    if state.config.ctcp.reply_ping {
        state.send(Outgoing::CtcpReply {
            target: from,
            command: "PING",
            argument: event.text(),
        });
    }
}

fn on_ctcp_time(state: &mut SessionState, event: &Event) {
    let Some(from) = ctcp_request(event) else { return };
    if state.config.ctcp.reply_time {
        let now = Local::now().format("%a %b %d %H:%M:%S %Y").to_string();
        state.send(Outgoing::CtcpReply {
            target: from,
            command: "TIME",
            argument: &now,
        });
    }
}

fn on_ctcp_clientinfo(state: &mut SessionState, event: &Event) {
    let Some(from) = ctcp_request(event) else { return };
    if state.config.ctcp.reply_clientinfo {
        state.send(Outgoing::CtcpReply {
            target: from,
            command: "CLIENTINFO",
            argument: CLIENTINFO,
        });
    }
}

/// File offers are only taken from a private PRIVMSG.
fn on_ctcp_dcc(state: &mut SessionState, event: &Event) {
    let Some(from) = ctcp_request(event) else { return };
    if !event.command.eq_ignore_ascii_case("PRIVMSG") || !event.is_direct() {
        debug!(from, "ignoring DCC offer not sent to us directly");
        return;
    }
    match state.transfers.request(from, event.text()) {
        Ok(id) => {
            let (name, size) = state
                .transfers
                .get(id)
                .map(|t| (t.filename().to_string(), t.size()))
                .unwrap_or_default();
            state.info(format!(
                "DCC #{}: receiving \"{}\" ({} bytes) from {}",
                id, name, size, from
            ));
        }
        Err(e) => {
            warn!(from, error = %e, "DCC offer rejected");
            state.error(format!("DCC offer from {} rejected: {}", from, e));
        }
    }
}

fn on_unhandled(_: &mut SessionState, event: &Event) {
    trace!(kind = ?event.kind, command = %event.command, "no responder");
}
