//! User input parser.
//!
//! Turns one typed line into a [`UserCommand`]:
//!
//! - `/dcc list`, `/dcc cancel <id>`, `/dcc send <nick> <path>`
//! - `/me <text>` for an action in the current channel
//! - `/<anything else>` is sent to the server verbatim
//! - `@<nick> <text>` sends a private message
//! - everything else goes to the current channel

use crate::dcc::TransferId;
use std::path::PathBuf;

pub const RAW_MARKER: char = '/';
pub const DIRECT_MARKER: char = '@';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Raw(String),
    Direct { nick: String, text: String },
    Channel(String),
    Action(String),
    DccList,
    DccCancel(TransferId),
    DccSend { nick: String, path: PathBuf },
    /// Recognised but unusable input; the string is a usage hint.
    Invalid(String),
}

/// Parse a typed line. Blank input yields `None`.
pub fn parse_input(line: &str) -> Option<UserCommand> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix(RAW_MARKER) {
        let (word, args) = rest.split_once(' ').unwrap_or((rest, ""));
        return Some(match word.to_lowercase().as_str() {
            "dcc" => parse_dcc(args.trim()),
            "me" => UserCommand::Action(args.to_string()),
            _ if rest.trim().is_empty() => UserCommand::Invalid("usage: /<raw command>".into()),
            _ => UserCommand::Raw(rest.to_string()),
        });
    }

    if let Some(rest) = line.strip_prefix(DIRECT_MARKER) {
        return Some(match rest.split_once(' ') {
            Some((nick, text)) if !nick.is_empty() && !text.trim().is_empty() => UserCommand::Direct {
                nick: nick.to_string(),
                text: text.to_string(),
            },
            _ => UserCommand::Invalid("usage: @<nick> <text>".into()),
        });
    }

    Some(UserCommand::Channel(line.to_string()))
}

fn parse_dcc(args: &str) -> UserCommand {
    let parts: Vec<&str> = args.splitn(3, ' ').collect();
    let subcmd = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();
    match subcmd.as_str() {
        "list" | "ls" | "" => UserCommand::DccList,
        "cancel" | "close" => match parts.get(1).and_then(|id| id.trim().parse().ok()) {
            Some(id) => UserCommand::DccCancel(id),
            None => UserCommand::Invalid("usage: /dcc cancel <id>".into()),
        },
        "send" => match (parts.get(1), parts.get(2)) {
            (Some(nick), Some(path)) if !path.trim().is_empty() => UserCommand::DccSend {
                nick: nick.to_string(),
                path: PathBuf::from(path.trim()),
            },
            _ => UserCommand::Invalid("usage: /dcc send <nick> <path>".into()),
        },
        other => UserCommand::Invalid(format!("unknown dcc command '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_commands_pass_through() {
        assert_eq!(parse_input("/JOIN #rust"), Some(UserCommand::Raw("JOIN #rust".into())));
        assert_eq!(
            parse_input("/privmsg nickserv :identify hunter2"),
            Some(UserCommand::Raw("privmsg nickserv :identify hunter2".into()))
        );
        assert!(matches!(parse_input("/"), Some(UserCommand::Invalid(_))));
    }

    #[test]
    fn direct_messages() {
        assert_eq!(
            parse_input("@alice hi there"),
            Some(UserCommand::Direct { nick: "alice".into(), text: "hi there".into() })
        );
        assert!(matches!(parse_input("@alice"), Some(UserCommand::Invalid(_))));
        assert!(matches!(parse_input("@ hi"), Some(UserCommand::Invalid(_))));
    }

    #[test]
    fn plain_text_goes_to_channel() {
        assert_eq!(parse_input("hello world"), Some(UserCommand::Channel("hello world".into())));
        assert_eq!(parse_input("   "), None);
        assert_eq!(parse_input(""), None);
    }

    #[test]
    fn action_and_dcc() {
        assert_eq!(parse_input("/me waves"), Some(UserCommand::Action("waves".into())));
        assert_eq!(parse_input("/dcc list"), Some(UserCommand::DccList));
        assert_eq!(parse_input("/DCC cancel 3"), Some(UserCommand::DccCancel(3)));
        assert!(matches!(parse_input("/dcc cancel x"), Some(UserCommand::Invalid(_))));
        assert_eq!(
            parse_input("/dcc send bob ./notes/my file.txt"),
            Some(UserCommand::DccSend {
                nick: "bob".into(),
                path: PathBuf::from("./notes/my file.txt"),
            })
        );
        assert!(matches!(parse_input("/dcc send bob"), Some(UserCommand::Invalid(_))));
        assert!(matches!(parse_input("/dcc frob"), Some(UserCommand::Invalid(_))));
    }
}
