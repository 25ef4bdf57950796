//! NNTP wire-protocol tables
//!
//! The relay never parses the full NNTP grammar. It recognizes a fixed
//! vocabulary of command tokens on the client leg and a fixed set of 3-digit
//! status codes on the server leg; everything else is opaque payload relayed
//! byte-for-byte.

pub mod commands;
pub mod responses;

pub use commands::recognize;
pub use responses::normalize_status_line;

/// Line ending: "\r\n"
pub const CRLF: &[u8] = b"\r\n";

/// Written to the client when the upstream connection cannot be established
/// after all retry attempts (RFC 3977 §3.2.1).
pub const SERVICE_UNAVAILABLE: &[u8] = b"400 Service temporarily unavailable\r\n";
