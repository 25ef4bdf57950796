//! Runtime configuration
//!
//! Everything comes from command-line flags with environment-variable
//! fallbacks (see [`crate::args`]); this module holds the validated shape
//! the rest of the relay works with. Validation happens once, before the
//! listener binds, so misconfiguration fails fast instead of surfacing in
//! the middle of a session.

use std::path::PathBuf;

use tracing::warn;

use crate::args::Args;
use crate::auth::SubstituteCredentials;

/// Listener endpoint configuration.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    /// TLS termination, enabled by supplying both a certificate and a key.
    pub tls: Option<TlsIdentity>,
}

/// Certificate/key pair for the TLS listener.
#[derive(Debug, Clone)]
pub struct TlsIdentity {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub tls_insecure: bool,
}

/// Fully validated relay configuration.
#[derive(Debug)]
pub struct RelayConfig {
    pub listen: ListenConfig,
    pub upstream: UpstreamConfig,
    /// Operator identity presented upstream when substitution is active.
    pub substitute: Option<SubstituteCredentials>,
    /// Credential file gating substitution; `None` means pass-through mode.
    pub passwd_file: Option<PathBuf>,
}

impl RelayConfig {
    /// Validate parsed arguments into a runnable configuration.
    ///
    /// # Errors
    /// Rejects a TLS certificate without a key (and vice versa), and a
    /// credential file without the upstream identity to substitute.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let tls = match (args.tls_cert, args.tls_key) {
            (Some(cert), Some(key)) => Some(TlsIdentity { cert, key }),
            (None, None) => None,
            (Some(_), None) => anyhow::bail!("--tls-cert requires --tls-key"),
            (None, Some(_)) => anyhow::bail!("--tls-key requires --tls-cert"),
        };

        let substitute = match (args.upstream_user, args.upstream_pass) {
            (Some(username), Some(password)) => Some(SubstituteCredentials { username, password }),
            (None, None) => None,
            _ => anyhow::bail!("--upstream-user and --upstream-pass must be given together"),
        };

        if args.passwd_file.is_some() && substitute.is_none() {
            anyhow::bail!(
                "--passwd-file enables credential substitution and requires \
                 --upstream-user and --upstream-pass"
            );
        }
        if args.passwd_file.is_none() && substitute.is_some() {
            warn!(
                "Upstream credentials configured without --passwd-file; \
                 running in pass-through mode and ignoring them"
            );
        }
        if args.upstream_tls_insecure && !args.upstream_tls {
            warn!("--upstream-tls-insecure has no effect without --upstream-tls");
        }

        Ok(Self {
            listen: ListenConfig {
                host: args.listen_host,
                port: args.listen_port,
                tls,
            },
            upstream: UpstreamConfig {
                host: args.upstream_host,
                port: args.upstream_port,
                tls: args.upstream_tls,
                tls_insecure: args.upstream_tls_insecure,
            },
            substitute,
            passwd_file: args.passwd_file,
        })
    }

    /// Formatted listen address, e.g. `0.0.0.0:119`.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen.host, self.listen.port)
    }
}
