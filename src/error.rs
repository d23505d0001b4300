//! Error types for the session core.

use thiserror::Error;

/// Errors that end a session (or prevent one from starting).
///
/// Would-block conditions are not errors; see
/// [`IoStatus`](crate::irc::connection::IoStatus).
#[derive(Debug, Error)]
pub enum Error {
    /// Address resolution or connect failed for every candidate.
    #[error("could not connect to {server}:{port}: {reason}")]
    Connection {
        server: String,
        port: u16,
        reason: String,
    },

    /// The server closed the connection or the socket failed.
    #[error("connection closed by peer")]
    TransportClosed,

    /// I/O error from the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_the_server() {
        let err = Error::Connection {
            server: "irc.example.net".into(),
            port: 6667,
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not connect to irc.example.net:6667: connection refused"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::other("boom").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
