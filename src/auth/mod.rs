//! Client credential validation and upstream credential substitution
//!
//! The relay authenticates clients against a local htpasswd-style file and,
//! when a client's credentials check out, logs in to the upstream server
//! with a fixed operator identity instead. Without a credential file the
//! whole mechanism is disabled and AUTHINFO lines relay untouched.

mod rewriter;
mod store;

pub use rewriter::{AuthRewriter, AuthState, SubstituteCredentials};
pub use store::{CredentialStore, StoreError};
