//! One connection's lifetime.
//!
//! [`Session::run`] waits on three sources at once: typed input, the server
//! socket, and a short timer. Every wake-up ends with a transfer tick, so
//! DCC streams advance whether or not the server is chatty.

use crate::app::dispatch::Dispatcher;
use crate::app::handler;
use crate::app::state::SessionState;
use crate::config::AppConfig;
use crate::dcc::{Direction, TransferReport};
use crate::error::{Error, Result};
use crate::irc::commands::{parse_input, UserCommand};
use crate::irc::connection::{ConnectionState, IoStatus, Transport};
use crate::irc::event::Event;
use crate::irc::framing::FrameReader;
use crate::irc::outbound::Outgoing;
use crate::logging::ChatLogger;
use crate::ui::Frontend;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Upper bound on how long a transfer waits for its next step.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Reads per wake-up, so a flooding server cannot starve typed input.
const MAX_READS_PER_WAKE: usize = 16;

const QUIT_MESSAGE: &str = "ircling";

pub struct Session {
    transport: Transport,
    reader: FrameReader,
    dispatcher: Dispatcher,
    state: SessionState,
    chat_log: ChatLogger,
}

impl Session {
    pub fn new(transport: Transport, config: AppConfig) -> Self {
        let chat_log = ChatLogger::new(&config.logging);
        Self {
            transport,
            reader: FrameReader::new(),
            dispatcher: handler::dispatcher(),
            state: SessionState::new(config),
            chat_log,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Queue the registration burst. SASL, when configured, holds
    /// registration open with `CAP REQ` until the exchange finishes.
    pub fn register(&mut self) {
        let server = &self.state.config.server;
        let password = server.password.clone();
        let wants_sasl = server.sasl.is_some();
        let username = server.username().to_string();
        let realname = server.realname().to_string();
        let nickname = self.state.nickname.clone();

        if let Some(password) = password.as_deref() {
            self.state.send(Outgoing::Pass(password));
        }
        if wants_sasl {
            self.state.send(Outgoing::CapReq("sasl"));
        }
        self.state.send(Outgoing::Nick(&nickname));
        self.state.send(Outgoing::User {
            username: &username,
            realname: &realname,
        });
        info!(nick = %nickname, sasl = wants_sasl, "registering");
    }

    /// Parse one framed line, run its responder and append it to the chat log.
    pub fn handle_line(&mut self, line: &[u8]) -> Event {
        let event = Event::from_bytes(line);
        self.dispatcher.dispatch(&mut self.state, &event);
        self.chat_log.log_event(&event);
        event
    }

    fn pump_inbound(&mut self, ui: &mut impl Frontend) -> Result<()> {
        for _ in 0..MAX_READS_PER_WAKE {
            match self.transport.receive(self.reader.spare_mut())? {
                IoStatus::WouldBlock => break,
                IoStatus::Ready(n) => {
                    self.reader.commit(n);
                    while let Some(frame) = self.reader.next_frame() {
                        let event = self.handle_line(&frame);
                        ui.render(&event);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.state.outbound.flush(&mut self.transport)
    }

    /// Act on one line of user input.
    pub fn submit(&mut self, line: &str) {
        let Some(command) = parse_input(line) else {
            return;
        };
        match command {
            UserCommand::Raw(raw) => self.state.send(Outgoing::Raw(&raw)),
            UserCommand::Direct { nick, text } => {
                self.state.send(Outgoing::Privmsg {
                    target: &nick,
                    text: &text,
                });
                self.state.sent(&nick, &text);
            }
            UserCommand::Channel(text) => {
                let Some(channel) = self.current_channel() else {
                    return;
                };
                self.state.send(Outgoing::Privmsg {
                    target: &channel,
                    text: &text,
                });
                self.state.sent(&channel, &text);
            }
            UserCommand::Action(text) => {
                let Some(channel) = self.current_channel() else {
                    return;
                };
                self.state.send(Outgoing::Ctcp {
                    target: &channel,
                    command: "ACTION",
                    argument: &text,
                });
                self.state.sent(&channel, &format!("* {}", text));
            }
            UserCommand::DccList => self.list_transfers(),
            UserCommand::DccCancel(id) => {
                if self.state.transfers.cancel(id) {
                    self.state.info(format!("DCC #{}: cancelled", id));
                } else {
                    self.state.error(format!("no active transfer #{}", id));
                }
            }
            UserCommand::DccSend { nick, path } => self.offer_file(&nick, &path),
            UserCommand::Invalid(usage) => self.state.error(usage),
        }
    }

    fn current_channel(&mut self) -> Option<String> {
        let channel = self.state.current_channel.clone();
        if channel.is_none() {
            self.state
                .error("not in a channel; use /join <channel> or @<nick> <text>");
        }
        channel
    }

    fn list_transfers(&mut self) {
        if self.state.transfers.active() == 0 {
            self.state.info("no active transfers");
            return;
        }
        let lines: Vec<String> = self
            .state
            .transfers
            .iter()
            .map(|(id, record)| {
                let direction = match record.direction() {
                    Direction::Send => "to",
                    Direction::Receive => "from",
                };
                format!(
                    "DCC #{} {} {} \"{}\": {}/{} bytes, {}",
                    id,
                    direction,
                    record.peer(),
                    record.filename(),
                    record.bytes_moved(),
                    record.size(),
                    record.state()
                )
            })
            .collect();
        for line in lines {
            self.state.info(line);
        }
    }

    fn offer_file(&mut self, nick: &str, path: &Path) {
        let local = match (self.transport.state(), self.transport.local_addr()) {
            (ConnectionState::Connected, Some(local)) => local,
            _ => {
                self.state.error("cannot offer a file while disconnected");
                return;
            }
        };
        match self.state.transfers.offer(nick, path, local.ip()) {
            Ok((id, payload)) => {
                self.state.send(Outgoing::Ctcp {
                    target: nick,
                    command: "DCC",
                    argument: &payload,
                });
                self.state
                    .info(format!("DCC #{}: offering {} to {}", id, path.display(), nick));
            }
            Err(e) => self
                .state
                .error(format!("cannot offer {}: {}", path.display(), e)),
        }
    }

    fn tick_transfers(&mut self) {
        for report in self.state.transfers.tick() {
            match report {
                TransferReport::Failed { .. } => self.state.error(report.to_string()),
                _ => self.state.info(report.to_string()),
            }
        }
    }

    fn show_notices(&mut self, ui: &mut impl Frontend) {
        for notice in self.state.take_notices() {
            ui.notify(&notice);
        }
    }

    /// Drive the session until the server connection ends.
    ///
    /// Closing `input` sends `QUIT` and keeps running until the server hangs
    /// up, which surfaces as [`Error::TransportClosed`](crate::error::Error).
    pub async fn run<F: Frontend>(
        &mut self,
        input: &mut mpsc::UnboundedReceiver<String>,
        ui: &mut F,
    ) -> Result<()> {
        let result = self.run_loop(input, ui).await;
        match &result {
            Err(Error::TransportClosed) => self.state.error("connection closed by server"),
            Err(e) => self.state.error(format!("session ended: {}", e)),
            Ok(()) => {}
        }
        self.show_notices(ui);
        result
    }

    async fn run_loop<F: Frontend>(
        &mut self,
        input: &mut mpsc::UnboundedReceiver<String>,
        ui: &mut F,
    ) -> Result<()> {
        let mut ticker = time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut input_open = true;

        loop {
            self.flush()?;
            self.show_notices(ui);
            let want_write = !self.state.outbound.is_empty();

            tokio::select! {
                line = input.recv(), if input_open => match line {
                    Some(line) => self.submit(&line),
                    None => {
                        input_open = false;
                        debug!("input closed, quitting");
                        self.state.send(Outgoing::Quit(QUIT_MESSAGE));
                    }
                },
                ready = self.transport.ready(want_write) => {
                    if ready?.readable {
                        self.pump_inbound(ui)?;
                    }
                }
                _ = ticker.tick() => {}
            }

            self.tick_transfers();
        }
    }
}
