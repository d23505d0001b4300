//! Diagnostics and chat logging.
//!
//! [`init_tracing`] sets up the `tracing` subscriber for the client's own
//! diagnostics. [`ChatLogger`] writes the conversation itself to daily log
//! files organized by channel or query, named `<target>_<date>.log` and
//! stored in the configured log directory
//! (default: `~/.local/share/ircling/logs/`).

use crate::config::LoggingConfig;
use crate::irc::event::{Event, EventKind};
use crate::ui::mirc_colors::strip_formatting;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize diagnostics.
///
/// `verbosity` maps 0=warn, 1=info, 2=debug, 3+=trace. `RUST_LOG` overrides
/// it. With `log_file` set, output goes there without ANSI colours so it
/// never interleaves with the chat on the terminal.
pub fn init_tracing(verbosity: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ircling={}", level)));

    match log_file {
        None => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init()?,
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(verbosity >= 2)
                        .with_line_number(verbosity >= 2),
                )
                .try_init()?
        }
    }
    Ok(())
}

/// Writes chat events to per-channel/query daily log files.
///
/// File handles are cached to avoid repeated opens; handles for earlier days
/// are dropped once the date rolls over. A file that cannot be opened is
/// skipped with a warning.
pub struct ChatLogger {
    enabled: bool,
    log_dir: PathBuf,
    log_channels: bool,
    log_queries: bool,
    file_handles: HashMap<String, fs::File>,
}

impl ChatLogger {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.enabled,
            log_dir: expand_home(&config.log_dir),
            log_channels: config.log_channels,
            log_queries: config.log_queries,
            file_handles: HashMap::new(),
        }
    }

    /// Append one event to the matching log file. No-op if logging is
    /// disabled or the event is not chat.
    pub fn log_event(&mut self, event: &Event) {
        if !self.enabled {
            return;
        }

        let target = match &event.channel {
            Some(channel) if self.log_channels => channel.clone(),
            None if self.log_queries && is_query(event) => event.origin.nick.clone(),
            _ => return,
        };

        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let nick = &event.origin.nick;
        let text = strip_formatting(event.text());
        let line = match event.kind {
            EventKind::Privmsg => format!("[{}] <{}> {}", timestamp, nick, text),
            EventKind::Notice => format!("[{}] -{}- {}", timestamp, nick, text),
            EventKind::CtcpAction => format!("[{}] * {} {}", timestamp, nick, text),
            EventKind::Join => format!("[{}] *** {} joined {}", timestamp, nick, target),
            EventKind::Part => format!("[{}] *** {} left {}", timestamp, nick, target),
            _ => return,
        };

        self.append(&target, &line);
    }

    fn append(&mut self, target: &str, line: &str) {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        self.append_dated(target, &date, line);
    }

    fn append_dated(&mut self, target: &str, date: &str, line: &str) {
        // Sanitize target for filename
        let safe_target: String = target
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        let suffix = format!("_{}.log", date);
        let filename = format!("{}{}", safe_target, suffix);
        self.file_handles.retain(|name, _| name.ends_with(&suffix));

        if !self.file_handles.contains_key(&filename) {
            let path = self.log_dir.join(&filename);
            let opened = fs::create_dir_all(&self.log_dir)
                .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
            match opened {
                Ok(file) => {
                    self.file_handles.insert(filename.clone(), file);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot open chat log");
                    return;
                }
            }
        }
        if let Some(handle) = self.file_handles.get_mut(&filename) {
            let _ = writeln!(handle, "{}", line);
        }
    }
}

fn is_query(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Privmsg | EventKind::Notice | EventKind::CtcpAction
    ) && !event.origin.nick.is_empty()
        && event.origin.user.is_some()
}

/// Expand a leading `~/` to the home directory.
fn expand_home(dir: &str) -> PathBuf {
    match (dir.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(dir),
    }
}
