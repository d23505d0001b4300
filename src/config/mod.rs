pub mod model;
pub mod nickname;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

pub use model::{AppConfig, CtcpConfig, DccConfig, LoggingConfig, SaslConfig, SaslMechanism};

/// Terminal IRC client with DCC file transfers.
#[derive(Debug, Parser)]
#[command(name = "ircling", version, about)]
pub struct Cli {
    /// Configuration file (default: <config dir>/ircling/config.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server host name, overrides the config file
    #[arg(short = 's', long = "server", value_name = "HOST")]
    pub server: Option<String>,

    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    #[arg(short = 'n', long = "nick")]
    pub nick: Option<String>,

    /// Channel to join after registration (repeatable)
    #[arg(long = "channel", action = ArgAction::Append, value_name = "CHANNEL")]
    pub channels: Vec<String>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Write diagnostics to this file instead of stderr
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold command-line overrides into a loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.server {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(nick) = &self.nick {
            config.server.nickname = nick.clone();
        }
        if !self.channels.is_empty() {
            config.server.channels = self.channels.clone();
        }
    }
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ircling")
        .join("config.toml")
}

/// Load the configuration from `path`, or from the default location.
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                return Ok(AppConfig::default());
            }
            path
        }
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"irc.example.net\"\nnickname = \"filenick\"\nchannels = [\"#a\"]\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "ircling", "--config", path.to_str().unwrap(), "-p", "7000", "--nick", "clinick",
            "--channel", "#b", "--channel", "#c", "-vv",
        ])
        .unwrap();
        let mut config = load_config(cli.config.as_deref()).unwrap();
        cli.apply_overrides(&mut config);

        assert_eq!(config.server.host, "irc.example.net");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.nickname, "clinick");
        assert_eq!(config.server.channels, vec!["#b", "#c"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
