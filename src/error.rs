//! Connection error types
//!
//! Only upstream establishment gets a structured error type: those failures
//! drive the retry loop and need to distinguish TCP, DNS-ish, and TLS
//! causes. Mid-relay I/O errors stay plain `std::io::Error` because they
//! all mean the same thing — that leg is done.

/// Errors from establishing the upstream connection.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConnectError {
    /// TCP connect (or name resolution) failed.
    #[error("failed to connect to {host}:{port}: {source}")]
    Tcp {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The configured hostname is not a valid TLS server name.
    #[error("invalid TLS server name '{host}'")]
    ServerName { host: String },

    /// TLS handshake with the upstream failed.
    #[error("TLS handshake with {host} failed: {source}")]
    TlsHandshake {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Every retry attempt failed; the session is abandoned.
    #[error("giving up on {host}:{port} after {attempts} attempts: {source}")]
    RetriesExhausted {
        host: String,
        port: u16,
        attempts: u32,
        #[source]
        source: Box<ConnectError>,
    },
}

impl ConnectError {
    /// Whether this error already represents an exhausted retry loop.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
