//! NNTP command recognition over raw byte lines
//!
//! Commands are matched as case-insensitive byte prefixes against a fixed
//! vocabulary, without decoding the line as text first. NNTP lines are not
//! guaranteed to be valid UTF-8 (article payloads are 8-bit safe), so the
//! matcher never allocates or transcodes.

use std::sync::LazyLock;

/// The fixed command vocabulary (RFC 3977 and RFC 4643).
///
/// Multi-word entries like `AUTHINFO USER` and the `LIST` sub-forms are
/// registered as whole prefixes so they win over their shorter stems.
const VOCABULARY: &[&str] = &[
    "ARTICLE",
    "AUTHINFO USER",
    "AUTHINFO PASS",
    "BODY",
    "CAPABILITIES",
    "DATE",
    "GROUP",
    "HDR",
    "HEAD",
    "HELP",
    "IHAVE",
    "LAST",
    "LIST",
    "LIST ACTIVE",
    "LIST ACTIVE.TIMES",
    "LIST DISTRIB.PATS",
    "LIST HEADERS",
    "LIST NEWSGROUPS",
    "LIST OVERVIEW.FMT",
    "LISTGROUP",
    "MODE READER",
    "NEWGROUPS",
    "NEWNEWS",
    "NEXT",
    "OVER",
    "POST",
    "QUIT",
    "STAT",
    "SLAVE",
];

/// Process-wide, read-only command table built once on first use.
#[derive(Debug)]
pub struct CommandTable {
    /// Vocabulary sorted longest-first so the most specific prefix wins
    /// deterministically (`LIST ACTIVE.TIMES` before `LIST ACTIVE` before
    /// `LISTGROUP` before `LIST`).
    entries: Vec<&'static str>,
}

impl CommandTable {
    fn build() -> Self {
        let mut entries: Vec<&'static str> = VOCABULARY.to_vec();
        entries.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        Self { entries }
    }

    /// Return the canonical uppercase identifier for the command `line`
    /// starts with, or `None` if no vocabulary entry is a prefix of it.
    #[must_use]
    pub fn recognize(&self, line: &[u8]) -> Option<&'static str> {
        self.entries.iter().copied().find(|entry| {
            line.len() >= entry.len() && line[..entry.len()].eq_ignore_ascii_case(entry.as_bytes())
        })
    }
}

static COMMANDS: LazyLock<CommandTable> = LazyLock::new(CommandTable::build);

/// Classify a line against the shared [`CommandTable`].
#[must_use]
pub fn recognize(line: &[u8]) -> Option<&'static str> {
    COMMANDS.recognize(line)
}
