//! Per-connection relay sessions
//!
//! A session is created for every accepted client connection and owns both
//! sides of the relay. Its life is the pipeline
//! `CONNECTING → RELAYING → CLOSING → CLOSED`: connect upstream (with
//! retry), run the two directional pumps concurrently, propagate half-close
//! when either leg ends, release everything. Sessions share nothing mutable
//! with each other, so a failing session can never take down its neighbors
//! or the listener.

pub mod pump;

use std::borrow::Cow;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::auth::{AuthRewriter, CredentialStore, SubstituteCredentials};
use crate::protocol::{SERVICE_UNAVAILABLE, normalize_status_line};
use crate::upstream::UpstreamConnector;

/// Shared, read-only state handed to every session.
#[derive(Debug)]
pub struct SessionContext {
    pub connector: UpstreamConnector,
    pub store: Option<Arc<CredentialStore>>,
    pub substitute: Option<SubstituteCredentials>,
}

impl SessionContext {
    /// Build the per-session AUTHINFO rewriter. Substitution is active only
    /// when both a credential store and an upstream identity are configured.
    #[must_use]
    pub fn rewriter(&self) -> AuthRewriter {
        match (&self.store, &self.substitute) {
            (Some(store), Some(creds)) => {
                AuthRewriter::new(Some((Arc::clone(store), creds.clone())))
            }
            _ => AuthRewriter::passthrough(),
        }
    }
}

/// Drive one client connection to completion.
///
/// Never returns an error: every failure path is local to this session and
/// ends in an orderly teardown.
pub async fn run_session<C>(client: C, peer: std::net::SocketAddr, ctx: Arc<SessionContext>)
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    info!("New client connection from {}", peer);

    // CONNECTING
    let upstream = match ctx.connector.connect().await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("Dropping client {}: {}", peer, err);
            let mut client = client;
            let _ = client.write_all(SERVICE_UNAVAILABLE).await;
            let _ = client.shutdown().await;
            return;
        }
    };

    // RELAYING
    let (sent, received) = relay_streams(client, upstream, ctx.rewriter()).await;

    // CLOSED
    match (sent, received) {
        (Ok(tx), Ok(rx)) => {
            info!(
                "Session with {} closed: {} bytes sent upstream, {} bytes relayed back",
                peer, tx, rx
            );
        }
        (tx, rx) => {
            debug!(
                "Session with {} ended on I/O error (upstream leg: {:?}, client leg: {:?})",
                peer, tx, rx
            );
        }
    }
}

/// Run both directional pumps over an established pair of streams.
///
/// The client→upstream leg goes through the AUTHINFO rewriter, the
/// upstream→client leg through the status normalizer. Each pump shuts down
/// its destination's write side when it finishes, so the peer observes EOF
/// and the opposite pump drains — clean two-way teardown even when only one
/// leg fails.
pub async fn relay_streams<C, U>(
    client: C,
    upstream: U,
    mut rewriter: AuthRewriter,
) -> (std::io::Result<u64>, std::io::Result<u64>)
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (client_read, mut client_write) = tokio::io::split(client);
    let (upstream_read, mut upstream_write) = tokio::io::split(upstream);

    let client_to_upstream = async {
        let result =
            pump::pump_lines(client_read, &mut upstream_write, |line| rewriter.apply(line)).await;
        let _ = upstream_write.shutdown().await;
        result
    };

    let upstream_to_client = async {
        let result = pump::pump_lines(upstream_read, &mut client_write, |line| {
            match normalize_status_line(line) {
                Some(replacement) => Cow::Owned(replacement),
                None => Cow::Borrowed(line),
            }
        })
        .await;
        let _ = client_write.shutdown().await;
        result
    };

    tokio::join!(client_to_upstream, upstream_to_client)
}
