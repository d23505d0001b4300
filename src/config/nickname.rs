//! Default nickname.
//!
//! Taken from the login name when it makes a usable nickname, otherwise a
//! random `crabNNNN`. Either way it fits IRC's classic 9-character limit.

use rand::RngExt;

pub const MAX_NICK_LEN: usize = 9;

pub fn default_nickname() -> String {
    std::env::var("USER")
        .ok()
        .and_then(|user| sanitize(&user))
        .unwrap_or_else(random_nickname)
}

/// Keep the characters IRC allows in a nickname. Returns `None` if nothing
/// usable is left.
pub fn sanitize(name: &str) -> Option<String> {
    let nick: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "-_[]\\`^{}|".contains(*c))
        .take(MAX_NICK_LEN)
        .collect();
    // nicknames cannot start with a digit or '-'
    match nick.chars().next() {
        Some(first) if !first.is_ascii_digit() && first != '-' => Some(nick),
        _ => None,
    }
}

/// Generate a random nickname like `crab0427`.
pub fn random_nickname() -> String {
    let mut rng = rand::rng();
    let num: u16 = rng.random_range(0..10000);
    format!("crab{:04}", num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_login_names() {
        assert_eq!(sanitize("alice").as_deref(), Some("alice"));
        assert_eq!(sanitize("j.doe@corp").as_deref(), Some("jdoecorp"));
        assert_eq!(sanitize("averyverylongname").as_deref(), Some("averyvery"));
        assert_eq!(sanitize("1234"), None);
        assert_eq!(sanitize("..."), None);
        assert_eq!(sanitize(""), None);
    }

    #[test]
    fn random_nickname_shape() {
        let nick = random_nickname();
        assert_eq!(nick.len(), 8);
        assert!(nick.starts_with("crab"));
        assert!(nick[4..].bytes().all(|b| b.is_ascii_digit()));
        assert!(!default_nickname().is_empty());
    }
}
