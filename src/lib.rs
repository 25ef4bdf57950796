//! Transparent NNTP relay with upstream credential substitution
//!
//! The relay sits between news clients and a real news server. Clients log
//! in with their own credentials; when those validate against a local
//! htpasswd-style file, the relay rewrites the `AUTHINFO USER`/`AUTHINFO
//! PASS` lines in flight and authenticates upstream with a fixed,
//! operator-supplied identity instead. Everything else is relayed
//! byte-for-byte, except that known 3-digit status lines from the upstream
//! are normalized to canonical RFC wording.
//!
//! Both legs can independently be plain TCP or TLS, and upstream connects
//! are retried with exponential backoff before a client is turned away.

pub mod args;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod tls;
pub mod upstream;

pub use args::Args;
pub use auth::{AuthRewriter, CredentialStore, SubstituteCredentials};
pub use config::{RelayConfig, UpstreamConfig};
pub use error::ConnectError;
pub use server::RelayServer;
pub use upstream::{RetryPolicy, UpstreamConnector, UpstreamStream};
