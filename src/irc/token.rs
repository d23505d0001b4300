//! Bounded tokenizing helpers.
//!
//! Tokens are borrowed views into the line. Only [`bounded`] copies, and it
//! always takes the destination capacity explicitly.

/// Copy at most `capacity` bytes of `s`, cut back to a char boundary.
pub fn bounded(s: &str, capacity: usize) -> String {
    clamp(s, capacity).to_string()
}

/// View of at most `capacity` bytes of `s`, cut back to a char boundary.
pub fn clamp(s: &str, capacity: usize) -> &str {
    if s.len() <= capacity {
        return s;
    }
    let mut end = capacity;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Split `s` at the first byte matching `pred`.
///
/// Returns the token before the delimiter and the remainder starting at the
/// delimiter. Without a delimiter the whole input is the token.
pub fn split_at_first(s: &str, pred: impl Fn(char) -> bool) -> (&str, &str) {
    match s.find(pred) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// Whitespace-separated tokens, skipping runs of spaces.
pub fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split(' ').filter(|w| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_char_boundaries() {
        assert_eq!(clamp("hello", 10), "hello");
        assert_eq!(clamp("hello", 3), "hel");
        // 'é' is two bytes; cutting inside it backs off
        assert_eq!(clamp("aé", 2), "a");
        assert_eq!(bounded("aéb", 3), "aé");
        assert_eq!(bounded("", 0), "");
    }

    #[test]
    fn split_keeps_delimiter_in_rest() {
        assert_eq!(split_at_first("PRIVMSG #c :x", |c| c == ' '), ("PRIVMSG", " #c :x"));
        assert_eq!(split_at_first("QUIT", |c| c == ' '), ("QUIT", ""));
    }

    #[test]
    fn words_skip_runs() {
        let w: Vec<_> = words("  a  b c ").collect();
        assert_eq!(w, vec!["a", "b", "c"]);
    }
}
