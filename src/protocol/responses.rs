//! Status-line normalization for upstream responses
//!
//! Backend servers phrase their status texts freely; the relay rewrites the
//! codes it knows to one canonical text per code (RFC 3977 / RFC 4643
//! wording) so clients see uniform responses regardless of which backend the
//! operator points the relay at. Unknown codes, multi-line payload, and
//! anything that does not start with three ASCII digits pass through
//! untouched.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Canonical status texts, keyed by 3-digit response code.
const CANONICAL: &[(u16, &str)] = &[
    (100, "Help text follows"),
    (101, "Capability list follows"),
    (111, "Server date and time"),
    (200, "Service available, posting allowed"),
    (201, "Service available, posting prohibited"),
    (205, "Connection closing"),
    (211, "Group selected"),
    (215, "Information follows"),
    (220, "Article follows"),
    (221, "Article headers follow"),
    (222, "Article body follows"),
    (223, "Article exists"),
    (224, "Overview information follows"),
    (225, "Headers follow"),
    (230, "List of new articles follows"),
    (231, "List of new newsgroups follows"),
    (235, "Article transferred OK"),
    (240, "Article received OK"),
    (281, "Authentication accepted"),
    (335, "Send article to be transferred"),
    (340, "Send article to be posted"),
    (381, "Password required"),
    (400, "Service temporarily unavailable"),
    (411, "No such newsgroup"),
    (412, "No newsgroup selected"),
    (420, "No current article selected"),
    (421, "No next article in this group"),
    (422, "No previous article in this group"),
    (423, "No article with that number"),
    (430, "No article with that message-id"),
    (435, "Article not wanted"),
    (436, "Transfer not possible, try again later"),
    (437, "Transfer rejected, do not retry"),
    (440, "Posting not permitted"),
    (441, "Posting failed"),
    (480, "Authentication required"),
    (481, "Authentication failed"),
    (482, "Authentication commands issued out of sequence"),
    (500, "Unknown command"),
    (501, "Syntax error"),
    (502, "Service permanently unavailable"),
    (503, "Feature not supported"),
];

static RESPONSE_CODES: LazyLock<HashMap<u16, &'static str>> =
    LazyLock::new(|| CANONICAL.iter().copied().collect());

/// Parse the leading three bytes of `line` as a decimal status code.
fn leading_code(line: &[u8]) -> Option<u16> {
    if line.len() < 3 {
        return None;
    }
    let digits = &line[..3];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(digits.iter().fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0')))
}

/// Rewrite a status line to its canonical form.
///
/// `line` is a single upstream line without its CRLF terminator. Returns the
/// replacement content when the leading code is known, `None` when the line
/// should be forwarded unchanged. Pure and stateless; never inspects
/// anything past the first three bytes.
#[must_use]
pub fn normalize_status_line(line: &[u8]) -> Option<Vec<u8>> {
    let code = leading_code(line)?;
    let text = RESPONSE_CODES.get(&code)?;
    Some(format!("{code} {text}").into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_are_rewritten() {
        assert_eq!(
            normalize_status_line(b"200 Welcome to SuperNews worldclass service!"),
            Some(b"200 Service available, posting allowed".to_vec())
        );
        assert_eq!(
            normalize_status_line(b"381 more auth info needed"),
            Some(b"381 Password required".to_vec())
        );
        assert_eq!(
            normalize_status_line(b"430 no such article here, sorry"),
            Some(b"430 No article with that message-id".to_vec())
        );
    }

    #[test]
    fn rewrite_covers_whole_line() {
        // The entire line is replaced, not just the text after the code
        let out = normalize_status_line(b"205 bye bye now").unwrap();
        assert_eq!(out, b"205 Connection closing".to_vec());
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(normalize_status_line(b"299 vendor extension"), None);
        assert_eq!(normalize_status_line(b"999 whatever"), None);
    }

    #[test]
    fn non_status_lines_pass_through() {
        assert_eq!(normalize_status_line(b"Subject: hello"), None);
        assert_eq!(normalize_status_line(b"."), None);
        assert_eq!(normalize_status_line(b""), None);
        assert_eq!(normalize_status_line(b"20"), None);
        assert_eq!(normalize_status_line(b"20x stray"), None);
    }

    #[test]
    fn payload_starting_with_digits_is_rewritten_only_if_code_known() {
        // A body line that happens to start with three digits is only
        // replaced when those digits form a known code. This mirrors the
        // original behavior: the normalizer has no multi-line awareness.
        assert_eq!(normalize_status_line(b"123 Main Street"), None);
        assert!(normalize_status_line(b"211 1234 3000234 3002322 misc.test").is_some());
    }

    #[test]
    fn bare_code_without_text_is_normalized() {
        assert_eq!(
            normalize_status_line(b"205"),
            Some(b"205 Connection closing".to_vec())
        );
    }
}
