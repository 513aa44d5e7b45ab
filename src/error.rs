//! Error types for the RFB client.

use std::io;
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, VncError>;

/// Errors that can occur while driving an RFB session.
///
/// Only [`VncError::ConnectionLost`] is recoverable (the session
/// reconnects automatically); every other variant propagates to the
/// caller and ends the attempted operation.
#[derive(Debug, Error)]
pub enum VncError {
    /// Low-level I/O failure that isn't a clean disconnect.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server announced a protocol version other than RFB 3.8.
    #[error("unsupported protocol version: {0:?}")]
    UnsupportedProtocol(String),

    /// Neither security type 1 (None) nor 2 (VNC authentication) was offered.
    #[error("server does not offer a supported security type")]
    UnsupportedSecurityTypes,

    /// The server requires VNC authentication but no password was configured.
    #[error("server requires a password but none was supplied")]
    PasswordRequired,

    /// The server refused the connection and gave a reason.
    #[error("server refused connection: {0}")]
    ServerRefused(String),

    /// A rectangle used an encoding other than Raw or DesktopSize.
    #[error("unsupported rectangle encoding: {0}")]
    UnsupportedEncoding(i32),

    /// A rectangle's pixel payload did not match `width * height * bytes_per_pixel`.
    #[error("rectangle pixel data has the wrong length")]
    InvalidRectangle,

    /// An unknown server-to-client message type was received.
    #[error("unknown server message type: {0}")]
    ProtocolViolation(u8),

    /// The connection was lost; the session will attempt to reconnect.
    #[error("connection lost")]
    ConnectionLost,

    /// A command was issued while the session was not in the `Running` state.
    #[error("session is not running")]
    NotRunning,
}
