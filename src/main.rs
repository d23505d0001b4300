mod app;
mod config;
mod dcc;
mod error;
mod irc;
mod logging;
mod ui;

use crate::app::session::Session;
use crate::config::{load_config, Cli};
use crate::error::Error;
use crate::irc::connection::Transport;
use crate::ui::TerminalUi;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut cfg);
    logging::init_tracing(cli.verbose, cli.log_file.as_deref())?;

    // Ensure download directory exists
    std::fs::create_dir_all(&cfg.dcc.download_dir).with_context(|| {
        format!(
            "failed to create download directory {}",
            cfg.dcc.download_dir.display()
        )
    })?;

    let mut transport = Transport::new();
    transport
        .connect(&cfg.server.host, cfg.server.port)
        .await
        .context("failed to reach the IRC server")?;
    info!(host = %cfg.server.host, port = cfg.server.port, "connected");

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    spawn_input_reader(std::io::BufReader::new(std::io::stdin()), input_tx);

    let mut ui = TerminalUi::stdout(&cfg.ui.timestamp_format);
    let mut session = Session::new(transport, cfg);
    session.register();

    match session.run(&mut input_rx, &mut ui).await {
        Ok(()) | Err(Error::TransportClosed) => {
            info!("session ended");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Forward typed lines into `tx` from a plain thread.
///
/// A blocked read on this thread never delays process exit, unlike tokio's
/// stdin, whose pending read holds the runtime open on shutdown.
fn spawn_input_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn input_lines_are_forwarded_until_eof() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_input_reader(Cursor::new(b"hello\n/join #rust\n".to_vec()), tx);

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx.recv().await.as_deref(), Some("/join #rust"));
        assert_eq!(rx.recv().await, None);
    }
}
