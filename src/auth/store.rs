//! htpasswd-style credential store
//!
//! The store is loaded once at startup and shared read-only across sessions,
//! so `AUTHINFO PASS` handling never touches the filesystem. Each line of
//! the file is `username:secret`, where the secret is either a bcrypt hash
//! (`$2a$` / `$2b$` / `$2y$` prefix) or plaintext. Blank lines and `#`
//! comments are ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Errors raised while loading a credential file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed entry at {path}:{line}: expected username:secret")]
    Malformed { path: PathBuf, line: usize },

    #[error("credential file {path} contains an empty username at line {line}")]
    EmptyUsername { path: PathBuf, line: usize },
}

/// A stored secret in one of the supported htpasswd formats.
#[derive(Clone)]
enum Secret {
    Bcrypt(String),
    Plain(String),
}

impl Secret {
    fn parse(raw: &str) -> Self {
        if raw.starts_with("$2a$") || raw.starts_with("$2b$") || raw.starts_with("$2y$") {
            Self::Bcrypt(raw.to_string())
        } else {
            Self::Plain(raw.to_string())
        }
    }

    fn matches(&self, password: &str) -> bool {
        match self {
            Self::Bcrypt(hash) => bcrypt::verify(password, hash).unwrap_or(false),
            Self::Plain(stored) => stored == password,
        }
    }
}

/// In-memory map of valid `(username, password)` pairs.
pub struct CredentialStore {
    users: HashMap<String, Secret>,
    path: PathBuf,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("user_count", &self.users.len())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Load and parse a credential file.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the file cannot be read or an entry is not
    /// of the form `username:secret`. A well-formed file with zero entries
    /// loads successfully but rejects every login.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut users = HashMap::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (user, secret) = line.split_once(':').ok_or(StoreError::Malformed {
                path: path.to_path_buf(),
                line: idx + 1,
            })?;
            if user.is_empty() {
                return Err(StoreError::EmptyUsername {
                    path: path.to_path_buf(),
                    line: idx + 1,
                });
            }
            if users.insert(user.to_string(), Secret::parse(secret)).is_some() {
                warn!(
                    "Duplicate credential entry for '{}' at {}:{}, later entry wins",
                    user,
                    path.display(),
                    idx + 1
                );
            }
        }

        debug!("Loaded {} credential entries from {}", users.len(), path.display());
        Ok(Self {
            users,
            path: path.to_path_buf(),
        })
    }

    /// Check a `(username, password)` pair against the store.
    #[must_use]
    pub fn validate(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|secret| secret.matches(password))
    }

    /// Number of entries in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn store_from(content: &str) -> CredentialStore {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        CredentialStore::load(file.path()).unwrap()
    }

    #[test]
    fn plaintext_entries_validate() {
        let store = store_from("alice:secret\nbob:hunter2\n");
        assert_eq!(store.len(), 2);
        assert!(store.validate("alice", "secret"));
        assert!(store.validate("bob", "hunter2"));
        assert!(!store.validate("alice", "hunter2"));
        assert!(!store.validate("carol", "secret"));
    }

    #[test]
    fn bcrypt_entries_validate() {
        let hash = bcrypt::hash("secret", 4).unwrap();
        let store = store_from(&format!("alice:{hash}\n"));
        assert!(store.validate("alice", "secret"));
        assert!(!store.validate("alice", "wrong"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let store = store_from("# staff accounts\n\nalice:secret\n   \n# end\n");
        assert_eq!(store.len(), 1);
        assert!(store.validate("alice", "secret"));
    }

    #[test]
    fn missing_colon_is_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "alice:secret\nnotanentry\n").unwrap();
        let err = CredentialStore::load(file.path()).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { line: 2, .. }));
    }

    #[test]
    fn empty_username_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, ":secret\n").unwrap();
        let err = CredentialStore::load(file.path()).unwrap_err();
        assert!(matches!(err, StoreError::EmptyUsername { line: 1, .. }));
    }

    #[test]
    fn empty_password_field_matches_only_empty_password() {
        let store = store_from("alice:\n");
        assert!(store.validate("alice", ""));
        assert!(!store.validate("alice", "anything"));
    }

    #[test]
    fn missing_file_errors() {
        let err = CredentialStore::load(Path::new("/nonexistent/htpasswd")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn empty_file_rejects_everyone() {
        let store = store_from("");
        assert!(store.is_empty());
        assert!(!store.validate("anyone", "anything"));
    }

    #[test]
    fn later_duplicate_wins() {
        let store = store_from("alice:first\nalice:second\n");
        assert_eq!(store.len(), 1);
        assert!(!store.validate("alice", "first"));
        assert!(store.validate("alice", "second"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let store = store_from("alice:supersecret\n");
        let rendered = format!("{store:?}");
        assert!(!rendered.contains("supersecret"));
    }
}
