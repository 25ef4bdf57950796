//! Upstream connection establishment with retry
//!
//! One connector is built at startup and shared by all sessions. Each
//! session asks it for a fresh backend connection; failures are retried
//! with exponential backoff and jitter so many concurrently-failing
//! sessions do not hammer the backend in lockstep. Exhausting the retry
//! budget abandons that session only.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::UpstreamConfig;
use crate::error::ConnectError;
use crate::tls::TlsClient;

/// Retry envelope for upstream connects.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Per-attempt delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// A connected upstream endpoint, plain TCP or TLS.
#[derive(Debug)]
pub enum UpstreamStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl AsyncRead for UpstreamStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for UpstreamStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Establishes backend connections for sessions.
#[derive(Debug)]
pub struct UpstreamConnector {
    config: UpstreamConfig,
    tls: Option<TlsClient>,
    policy: RetryPolicy,
}

impl UpstreamConnector {
    /// Build a connector; the TLS client config is prepared here, once,
    /// when the upstream is configured for TLS.
    pub fn new(config: UpstreamConfig, policy: RetryPolicy) -> anyhow::Result<Self> {
        let tls = if config.tls {
            Some(TlsClient::new(config.tls_insecure)?)
        } else {
            None
        };
        Ok(Self { config, tls, policy })
    }

    /// Connect, retrying with exponential backoff and jitter.
    ///
    /// Delay before retry `n` is `min(initial * 2^n, max_delay)` plus up to
    /// 50% random jitter. The error after the final attempt is wrapped in
    /// [`ConnectError::RetriesExhausted`].
    pub async fn connect(&self) -> Result<UpstreamStream, ConnectError> {
        let mut attempt = 1u32;
        let mut backoff = self.policy.initial_delay;

        loop {
            match self.connect_once().await {
                Ok(stream) => {
                    if attempt > 1 {
                        info!(
                            "Connected to {}:{} after {} attempts",
                            self.config.host, self.config.port, attempt
                        );
                    }
                    return Ok(stream);
                }
                Err(err) if attempt >= self.policy.max_attempts => {
                    return Err(ConnectError::RetriesExhausted {
                        host: self.config.host.clone(),
                        port: self.config.port,
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = jittered(backoff);
                    warn!(
                        "Upstream connect failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        self.policy.max_attempts,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    backoff = (backoff * 2).min(self.policy.max_delay);
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<UpstreamStream, ConnectError> {
        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| ConnectError::Tcp {
                host: self.config.host.clone(),
                port: self.config.port,
                source,
            })?;
        tune_socket(&stream);

        match &self.tls {
            None => Ok(UpstreamStream::Plain(stream)),
            Some(tls) => {
                let tls_stream = tls
                    .handshake(stream, &self.config.host)
                    .await
                    .map_err(|source| ConnectError::TlsHandshake {
                        host: self.config.host.clone(),
                        source,
                    })?;
                Ok(UpstreamStream::Tls(Box::new(tls_stream)))
            }
        }
    }
}

/// Add 0–50% random jitter to a backoff delay.
fn jittered(delay: Duration) -> Duration {
    let base_ms = delay.as_millis() as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2);
    delay + Duration::from_millis(jitter_ms)
}

/// Best-effort socket tuning: low-latency command turnaround, keepalive to
/// notice dead backends behind NAT.
fn tune_socket(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY on upstream socket: {}", e);
    }
    let sock = socket2::SockRef::from(stream);
    if let Err(e) = sock.set_keepalive(true) {
        debug!("Failed to enable keepalive on upstream socket: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        }
    }

    fn local_config(port: u16) -> UpstreamConfig {
        UpstreamConfig {
            host: "127.0.0.1".to_string(),
            port,
            tls: false,
            tls_insecure: false,
        }
    }

    /// Bind then drop a listener to get a port that refuses connections.
    async fn refused_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[test]
    fn jitter_stays_within_half_of_base() {
        let base = Duration::from_millis(100);
        for _ in 0..200 {
            let d = jittered(base);
            assert!(d >= base);
            assert!(d <= base + Duration::from_millis(50));
        }
    }

    #[test]
    fn jitter_of_zero_is_zero() {
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn default_policy_matches_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn connect_succeeds_without_retry() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let connector =
            UpstreamConnector::new(local_config(port), fast_policy(3)).unwrap();
        let stream = connector.connect().await.unwrap();
        assert!(matches!(stream, UpstreamStream::Plain(_)));
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_retries_report_attempt_count() {
        let port = refused_port().await;
        let connector =
            UpstreamConnector::new(local_config(port), fast_policy(3)).unwrap();

        let err = connector.connect().await.unwrap_err();
        match err {
            ConnectError::RetriesExhausted { attempts, source, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, ConnectError::Tcp { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn backoff_delays_grow_between_attempts() {
        let port = refused_port().await;
        let connector =
            UpstreamConnector::new(local_config(port), fast_policy(3)).unwrap();

        let start = std::time::Instant::now();
        let _ = connector.connect().await;
        // Two sleeps: ~10ms and ~20ms (plus jitter), so at least 30ms total
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn single_attempt_policy_fails_immediately() {
        let port = refused_port().await;
        let connector =
            UpstreamConnector::new(local_config(port), fast_policy(1)).unwrap();

        let start = std::time::Instant::now();
        let err = connector.connect().await.unwrap_err();
        assert!(err.is_exhausted());
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
