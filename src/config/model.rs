//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a sensible default so the client works out of the box.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::nickname::default_nickname;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dcc: DccConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ctcp: CtcpConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// The one server this session talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    /// Connection password, sent as `PASS`.
    #[serde(default)]
    pub password: Option<String>,
    /// Joined after the welcome numeric.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub sasl: Option<SaslConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nickname: default_nickname(),
            username: None,
            realname: None,
            password: None,
            channels: Vec::new(),
            sasl: None,
        }
    }
}

impl ServerConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nickname)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nickname)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaslMechanism {
    #[default]
    Plain,
    External,
}

impl SaslMechanism {
    pub fn as_str(self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::External => "EXTERNAL",
        }
    }
}

/// SASL credentials. `token` wins over `account`/`password` when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaslConfig {
    #[serde(default)]
    pub mechanism: SaslMechanism,
    /// Pre-encoded base64 PLAIN payload.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// DCC file transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DccConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub reject_private_ips: bool,
    #[serde(default = "default_offer_timeout")]
    pub offer_timeout_secs: u64,
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_file_size: default_max_file_size(),
            reject_private_ips: false,
            offer_timeout_secs: default_offer_timeout(),
        }
    }
}

/// Chat message logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_true")]
    pub log_channels: bool,
    #[serde(default)]
    pub log_queries: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            log_channels: true,
            log_queries: false,
        }
    }
}

/// CTCP (Client-To-Client Protocol) auto-reply settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtcpConfig {
    #[serde(default = "default_true")]
    pub reply_version: bool,
    #[serde(default = "default_true")]
    pub reply_ping: bool,
    #[serde(default = "default_true")]
    pub reply_time: bool,
    #[serde(default = "default_true")]
    pub reply_clientinfo: bool,
    #[serde(default = "default_version_string")]
    pub version_string: String,
}

impl Default for CtcpConfig {
    fn default() -> Self {
        Self {
            reply_version: true,
            reply_ping: true,
            reply_time: true,
            reply_clientinfo: true,
            version_string: default_version_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".to_string()
}
fn default_port() -> u16 {
    6667
}
fn default_true() -> bool {
    true
}
fn default_timestamp_format() -> String {
    "%H:%M".to_string()
}
fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}
fn default_max_file_size() -> u64 {
    500 * 1024 * 1024 // 500 MB
}
fn default_offer_timeout() -> u64 {
    120
}
fn default_log_dir() -> String {
    "~/.local/share/ircling/logs".to_string()
}
fn default_version_string() -> String {
    concat!("ircling ", env!("CARGO_PKG_VERSION")).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 6667);
        assert!(!config.server.nickname.is_empty());
        assert!(config.server.sasl.is_none());
        assert_eq!(config.dcc.download_dir, PathBuf::from("./downloads"));
        assert_eq!(config.dcc.offer_timeout_secs, 120);
        assert!(config.ctcp.reply_version);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn full_server_section() {
        let config: AppConfig = toml::from_str(
            r##"
            [server]
            host = "irc.example.net"
            port = 6668
            nickname = "ferris"
            realname = "Ferris the Crab"
            channels = ["#rust", "#crabs"]

            [server.sasl]
            mechanism = "external"

            [dcc]
            reject_private_ips = true
            max_file_size = 1024

            [ctcp]
            reply_time = false
            "##,
        )
        .unwrap();

        assert_eq!(config.server.host, "irc.example.net");
        assert_eq!(config.server.port, 6668);
        assert_eq!(config.server.username(), "ferris");
        assert_eq!(config.server.realname(), "Ferris the Crab");
        assert_eq!(config.server.channels, vec!["#rust", "#crabs"]);
        let sasl = config.server.sasl.unwrap();
        assert_eq!(sasl.mechanism, SaslMechanism::External);
        assert!(config.dcc.reject_private_ips);
        assert_eq!(config.dcc.max_file_size, 1024);
        assert!(!config.ctcp.reply_time);
        assert!(config.ctcp.reply_ping);
    }
}
