//! Listener and accept loop
//!
//! Binds the configured listen socket (plain or TLS), spawns one task per
//! accepted client, and runs until an interrupt or terminate signal. Accept
//! errors and per-session failures are logged and absorbed; only a failure
//! to bind at startup is fatal.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

use crate::auth::CredentialStore;
use crate::config::RelayConfig;
use crate::relay::{self, SessionContext};
use crate::tls;
use crate::upstream::{RetryPolicy, UpstreamConnector};

/// The assembled relay: listener configuration plus everything sessions
/// share.
pub struct RelayServer {
    listen_addr: String,
    acceptor: Option<TlsAcceptor>,
    ctx: Arc<SessionContext>,
}

impl RelayServer {
    /// Load credentials and TLS material and wire up the session context.
    ///
    /// # Errors
    /// Fails on an unreadable credential file or TLS certificate/key, or on
    /// an invalid upstream TLS setup — all before any socket is bound.
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        let store = match &config.passwd_file {
            Some(path) => {
                let store = CredentialStore::load(path)?;
                info!(
                    "Credential substitution enabled ({} client accounts)",
                    store.len()
                );
                Some(Arc::new(store))
            }
            None => {
                info!("No credential file configured, relaying AUTHINFO pass-through");
                None
            }
        };

        let acceptor = match &config.listen.tls {
            Some(identity) => Some(tls::load_acceptor(&identity.cert, &identity.key)?),
            None => None,
        };

        let connector = UpstreamConnector::new(config.upstream.clone(), RetryPolicy::default())?;

        Ok(Self {
            listen_addr: config.listen_addr(),
            acceptor,
            ctx: Arc::new(SessionContext {
                connector,
                store,
                substitute: config.substitute,
            }),
        })
    }

    /// Bind and serve until a shutdown signal arrives.
    ///
    /// # Errors
    /// Only binding the listen socket can fail here; everything after that
    /// is absorbed per session.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("binding listen socket {}", self.listen_addr))?;

        if self.acceptor.is_some() {
            info!("NNTP relay listening on {} (TLS)", self.listen_addr);
        } else {
            info!("NNTP relay listening on {}", self.listen_addr);
        }

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!("Failed to set TCP_NODELAY for client {}: {}", peer, e);
                            }
                            let ctx = Arc::clone(&self.ctx);
                            let acceptor = self.acceptor.clone();
                            tokio::spawn(async move {
                                match acceptor {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(tls_stream) => {
                                            relay::run_session(tls_stream, peer, ctx).await;
                                        }
                                        Err(e) => {
                                            error!("TLS handshake with client {} failed: {}", peer, e);
                                        }
                                    },
                                    None => relay::run_session(stream, peer, ctx).await,
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Resolve on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
