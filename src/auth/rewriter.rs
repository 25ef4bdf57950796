//! The AUTHINFO substitution state machine
//!
//! One rewriter exists per session and is driven only by the client→upstream
//! pump. While the session is unauthenticated it intercepts the
//! `AUTHINFO USER` / `AUTHINFO PASS` pair: the username line is replaced
//! with the operator's upstream username, and the password line is replaced
//! with the operator's upstream password once the client's own pair
//! validates against the credential store. A client that fails local
//! validation falls back to pass-through: its password line goes upstream
//! verbatim and the backend arbitrates.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::debug;

use super::store::CredentialStore;
use crate::protocol::commands;

/// The fixed identity the relay presents to the upstream server.
#[derive(Clone)]
pub struct SubstituteCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SubstituteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstituteCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Per-session authentication state.
///
/// `authenticated` starts `true` when substitution is disabled (no
/// credential store configured) and flips to `true` at most once otherwise;
/// the transition is terminal for the life of the session.
#[derive(Debug)]
pub struct AuthState {
    pub claimed_user: Option<String>,
    pub authenticated: bool,
}

/// Rewrites outbound AUTHINFO lines for one session.
#[derive(Debug)]
pub struct AuthRewriter {
    substitution: Option<(Arc<CredentialStore>, SubstituteCredentials)>,
    state: AuthState,
}

impl AuthRewriter {
    /// Build a rewriter. `substitution` being `None` disables the state
    /// machine entirely: every line, AUTHINFO included, passes through.
    #[must_use]
    pub fn new(substitution: Option<(Arc<CredentialStore>, SubstituteCredentials)>) -> Self {
        let authenticated = substitution.is_none();
        Self {
            substitution,
            state: AuthState {
                claimed_user: None,
                authenticated,
            },
        }
    }

    /// A rewriter that forwards everything unchanged (pass-through mode).
    #[must_use]
    pub fn passthrough() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.authenticated
    }

    #[must_use]
    pub fn claimed_user(&self) -> Option<&str> {
        self.state.claimed_user.as_deref()
    }

    /// Transform one outbound line (without its CRLF terminator).
    ///
    /// Returns the bytes to forward upstream; borrows the input whenever the
    /// line is not rewritten. Exactly one line out per line in — the
    /// rewriter never drops or reorders.
    pub fn apply<'a>(&mut self, line: &'a [u8]) -> Cow<'a, [u8]> {
        if self.state.authenticated {
            return Cow::Borrowed(line);
        }
        // `authenticated` can only be false when substitution is configured.
        let Some((store, substitute)) = &self.substitution else {
            return Cow::Borrowed(line);
        };

        match commands::recognize(line) {
            Some("AUTHINFO USER") => {
                let claimed = argument(line, "AUTHINFO USER".len());
                debug!("Intercepted AUTHINFO USER for client user '{}'", claimed);
                self.state.claimed_user = Some(claimed);
                Cow::Owned(format!("AUTHINFO USER {}", substitute.username).into_bytes())
            }
            Some("AUTHINFO PASS") => {
                let secret = argument(line, "AUTHINFO PASS".len());
                let valid = self
                    .state
                    .claimed_user
                    .as_deref()
                    .is_some_and(|user| store.validate(user, &secret));
                if valid {
                    self.state.authenticated = true;
                    debug!(
                        "Client user '{}' validated, substituting upstream credentials",
                        self.state.claimed_user.as_deref().unwrap_or_default()
                    );
                    Cow::Owned(format!("AUTHINFO PASS {}", substitute.password).into_bytes())
                } else {
                    // Pass-through fallback: the upstream server decides.
                    debug!(
                        "Client user '{}' failed local validation, forwarding credentials verbatim",
                        self.state.claimed_user.as_deref().unwrap_or("<none>")
                    );
                    Cow::Borrowed(line)
                }
            }
            _ => Cow::Borrowed(line),
        }
    }
}

/// Extract the argument following a recognized command prefix.
fn argument(line: &[u8], prefix_len: usize) -> String {
    String::from_utf8_lossy(&line[prefix_len..]).trim().to_string()
}
