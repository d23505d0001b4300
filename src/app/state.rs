use crate::config::AppConfig;
use crate::dcc::{TransferPool, TransferSettings};
use crate::irc::outbound::{Outbound, Outgoing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Local status line.
    Info,
    Error,
    /// Echo of something we sent.
    Sent,
}

/// A line produced by the client itself rather than parsed from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// Everything the protocol responders may read or change.
#[derive(Debug)]
pub struct SessionState {
    pub config: AppConfig,
    /// Our nickname as the server knows it.
    pub nickname: String,
    /// Target of plain input; the last channel we joined.
    pub current_channel: Option<String>,
    pub registered: bool,
    pub outbound: Outbound,
    pub transfers: TransferPool,
    notices: Vec<Notice>,
}

impl SessionState {
    pub fn new(config: AppConfig) -> Self {
        let transfers = TransferPool::new(TransferSettings::from_config(&config.dcc));
        Self {
            nickname: config.server.nickname.clone(),
            current_channel: None,
            registered: false,
            outbound: Outbound::new(),
            transfers,
            notices: Vec::new(),
            config,
        }
    }

    pub fn send(&mut self, line: Outgoing<'_>) {
        self.outbound.push(line);
    }

    pub fn is_me(&self, nick: &str) -> bool {
        nick.eq_ignore_ascii_case(&self.nickname)
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.notify(NoticeKind::Info, text.into());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.notify(NoticeKind::Error, text.into());
    }

    pub fn sent(&mut self, target: &str, text: &str) {
        let line = format!("[{}] <{}> {}", target, self.nickname, text);
        self.notify(NoticeKind::Sent, line);
    }

    fn notify(&mut self, kind: NoticeKind, text: String) {
        self.notices.push(Notice { kind, text });
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_drain_in_order() {
        let mut config = AppConfig::default();
        config.server.nickname = "crab".into();
        let mut state = SessionState::new(config);

        state.info("connected");
        state.error("oops");
        state.sent("#rust", "hi");

        let notices = state.take_notices();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0].kind, NoticeKind::Info);
        assert_eq!(notices[1].kind, NoticeKind::Error);
        assert_eq!(notices[2].text, "[#rust] <crab> hi");
        assert!(state.take_notices().is_empty());
    }

    #[test]
    fn nick_comparison_ignores_case() {
        let mut config = AppConfig::default();
        config.server.nickname = "Crab".into();
        let state = SessionState::new(config);
        assert!(state.is_me("crab"));
        assert!(!state.is_me("crab_"));
    }
}
