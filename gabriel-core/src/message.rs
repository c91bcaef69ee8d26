//! Commands sent to pipeline units and replies they send back.
//!
//! Both are closed enums. Each unit matches on [`Command`] explicitly and
//! answers anything it does not handle with a [`Reply::Error`], so the set
//! of behaviours per unit is visible in one `match`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::ClientError;
use crate::network::ConnectionInfo;
use crate::protocol::Response;
use crate::token::TokenManager;

// ── Command ──────────────────────────────────────────────────────

/// Work item for a network unit's inbound queue.
#[derive(Debug, Clone)]
pub enum Command {
    /// Open the unit's TCP connection.
    Connect(ConnectionInfo),
    /// Write raw bytes on the connection (stream unit only).
    Send(Bytes),
    /// Stream captured frames until the source ends (stream unit only).
    Stream(Arc<TokenManager>),
    /// Read responses until stopped (receive unit only).
    Listen(Arc<TokenManager>),
    /// Drop the connection.
    Close,
}

impl Command {
    /// Short name used in logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Connect(_) => "connect",
            Command::Send(_) => "send",
            Command::Stream(_) => "stream",
            Command::Listen(_) => "listen",
            Command::Close => "close",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect(info) => write!(f, "connect({info})"),
            Command::Send(data) => write!(f, "send({} bytes)", data.len()),
            other => f.write_str(other.name()),
        }
    }
}

// ── Reply ────────────────────────────────────────────────────────

/// Outcome reported by a network unit on the shared reply queue.
#[derive(Debug)]
pub enum Reply {
    /// A command completed. Carries a response for `Listen`, nothing for
    /// connect/send/close acknowledgements.
    Success(Option<Response>),
    /// The frame source ran dry and the stream unit stopped sending.
    EndOfStream { frames_sent: u64 },
    /// The unit hit a fatal error and has stopped.
    Error(ClientError),
}

impl Reply {
    /// Acknowledgement with no data.
    pub fn ack() -> Self {
        Reply::Success(None)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_display() {
        let info = ConnectionInfo::new("10.0.0.2".into(), 9098);
        assert_eq!(Command::Connect(info).to_string(), "connect(10.0.0.2:9098)");
        assert_eq!(
            Command::Send(Bytes::from_static(b"abc")).to_string(),
            "send(3 bytes)"
        );
        let tokens = Arc::new(TokenManager::new(1));
        assert_eq!(Command::Listen(tokens).to_string(), "listen");
        assert_eq!(Command::Close.name(), "close");
    }
}
