//! Command-line argument parsing
//!
//! Every flag has an `NNTP_RELAY_*` environment-variable fallback so the
//! relay can be configured entirely from the environment (containers,
//! service units) without a config file. Flags beat environment values.

use std::path::PathBuf;

use clap::Parser;

/// Transparent NNTP relay with upstream credential substitution.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind the listener to
    #[arg(long, default_value = "0.0.0.0", env = "NNTP_RELAY_LISTEN_HOST")]
    pub listen_host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "119", env = "NNTP_RELAY_LISTEN_PORT")]
    pub listen_port: u16,

    /// PEM certificate chain enabling TLS on the listener (requires --tls-key)
    #[arg(long, env = "NNTP_RELAY_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for the listener certificate
    #[arg(long, env = "NNTP_RELAY_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Hostname of the upstream news server
    #[arg(short = 's', long, env = "NNTP_RELAY_UPSTREAM_HOST")]
    pub upstream_host: String,

    /// Port of the upstream news server
    #[arg(long, default_value = "119", env = "NNTP_RELAY_UPSTREAM_PORT")]
    pub upstream_port: u16,

    /// Connect to the upstream over TLS (independent of listener TLS)
    #[arg(long, env = "NNTP_RELAY_UPSTREAM_TLS")]
    pub upstream_tls: bool,

    /// Skip upstream certificate verification (private/self-signed servers)
    #[arg(long, env = "NNTP_RELAY_UPSTREAM_TLS_INSECURE")]
    pub upstream_tls_insecure: bool,

    /// Username presented to the upstream when substitution is active
    #[arg(short = 'u', long, env = "NNTP_RELAY_UPSTREAM_USER")]
    pub upstream_user: Option<String>,

    /// Password presented to the upstream when substitution is active
    #[arg(long, env = "NNTP_RELAY_UPSTREAM_PASS")]
    pub upstream_pass: Option<String>,

    /// htpasswd-style file of client credentials; absent disables substitution
    #[arg(long, env = "NNTP_RELAY_PASSWD_FILE")]
    pub passwd_file: Option<PathBuf>,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short, long, env = "NNTP_RELAY_THREADS")]
    pub threads: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_invocation_parses() {
        let args = Args::try_parse_from(["nntp-relay", "--upstream-host", "news.example.com"])
            .unwrap();
        assert_eq!(args.listen_host, "0.0.0.0");
        assert_eq!(args.listen_port, 119);
        assert_eq!(args.upstream_host, "news.example.com");
        assert_eq!(args.upstream_port, 119);
        assert!(!args.upstream_tls);
        assert!(args.passwd_file.is_none());
    }

    #[test]
    fn upstream_host_is_required() {
        assert!(Args::try_parse_from(["nntp-relay"]).is_err());
    }

    #[test]
    fn full_invocation_parses() {
        let args = Args::try_parse_from([
            "nntp-relay",
            "--listen-host",
            "127.0.0.1",
            "-p",
            "8119",
            "--tls-cert",
            "cert.pem",
            "--tls-key",
            "key.pem",
            "-s",
            "news.example.com",
            "--upstream-port",
            "563",
            "--upstream-tls",
            "-u",
            "operator",
            "--upstream-pass",
            "op-secret",
            "--passwd-file",
            "users.htpasswd",
            "-t",
            "2",
        ])
        .unwrap();
        assert_eq!(args.listen_port, 8119);
        assert_eq!(args.upstream_port, 563);
        assert!(args.upstream_tls);
        assert_eq!(args.upstream_user.as_deref(), Some("operator"));
        assert_eq!(args.threads, Some(2));
    }
}
