//! CTCP (Client-To-Client Protocol) quoting.
//!
//! CTCP payloads travel inside a PRIVMSG or NOTICE trailing parameter,
//! bracketed by `\x01` markers: `\x01COMMAND argument\x01`.

pub const MARKER: char = '\x01';

/// Wrap a CTCP command and optional argument in escape markers.
pub fn wrap(command: &str, argument: &str) -> String {
    let argument = strip_markers(argument);
    if argument.is_empty() {
        format!("{MARKER}{command}{MARKER}")
    } else {
        format!("{MARKER}{command} {argument}{MARKER}")
    }
}

/// Split an escaped payload into `(command, argument)`.
///
/// The command runs up to the first space, closing marker, or end of text;
/// a missing closing marker is tolerated.
pub fn unwrap(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_prefix(MARKER)?;
    let body = match inner.find(MARKER) {
        Some(end) => &inner[..end],
        None => inner,
    };
    Some(match body.split_once(' ') {
        Some((command, argument)) => (command, argument),
        None => (body, ""),
    })
}

/// Remove escape markers from user-supplied text so it cannot open a CTCP
/// payload of its own.
pub fn strip_markers(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains(MARKER) {
        text.replace(MARKER, "").into()
    } else {
        text.into()
    }
}
