//! Passive commit-identifier recognition ("snarfing").
//!
//! Arbitrary inbound text is scanned for hex runs that look like commit
//! identifiers; each candidate is resolved by prefix against every
//! repository visible in the requesting channel. This reads current
//! history only, never the poll cursors, so it can describe commits that
//! were never announced.

use std::sync::Arc;

use tracing::debug;

use crate::registry::TrackedRepo;
use crate::repo::CommitRecord;

/// Hex runs shorter than this are too ambiguous to bother resolving.
pub const MIN_TOKEN_LEN: usize = 6;
/// A full identifier is 40 hex characters; longer runs are not ids.
pub const MAX_TOKEN_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnarfMatch {
    /// Short name of the repository the token resolved in.
    pub repo: String,
    pub commit: CommitRecord,
}

/// Extract identifier-looking tokens: maximal runs of lowercase hex with
/// word boundaries on both sides and a plausible length. `"0xdeadbeef"`
/// yields nothing (the run borders a word character), and tokens below
/// [`MIN_TOKEN_LEN`] are skipped.
pub fn scan(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let is_hex = |b: u8| b.is_ascii_digit() || (b'a'..=b'f').contains(&b);
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !is_hex(bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && is_hex(bytes[i]) {
            i += 1;
        }
        let bounded_left = start == 0 || !is_word(bytes[start - 1]);
        let bounded_right = i == bytes.len() || !is_word(bytes[i]);
        let len = i - start;
        if bounded_left && bounded_right && (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len) {
            tokens.push(&text[start..i]);
        } else if !bounded_right {
            // Skip the rest of the word so "deadbeefs" contributes nothing.
            while i < bytes.len() && is_word(bytes[i]) {
                i += 1;
            }
        }
    }
    tokens.dedup();
    tokens
}

/// Resolve every scanned token against every candidate repository.
/// Ambiguous or unknown prefixes are no match; provider failures count
/// as no match for that repository too (a chat scan must never error
/// out). A token may resolve in several repositories at once; one match
/// is returned per (repository, commit) pair.
pub fn resolve(candidates: &[Arc<TrackedRepo>], text: &str, enabled: bool) -> Vec<SnarfMatch> {
    if !enabled {
        return Vec::new();
    }
    let tokens = scan(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<SnarfMatch> = Vec::new();
    for repo in candidates {
        for token in &tokens {
            match repo.history.resolve_prefix(token) {
                Ok(Some(commit)) => {
                    let dup = matches
                        .iter()
                        .any(|m| m.repo == repo.config.name && m.commit.id == commit.id);
                    if !dup {
                        matches.push(SnarfMatch {
                            repo: repo.config.name.clone(),
                            commit,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(repo = %repo.config.name, token, error = %e, "snarf lookup failed");
                }
            }
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_plausible_tokens() {
        assert_eq!(scan("see a1b2c3d for details"), vec!["a1b2c3d"]);
        assert_eq!(
            scan("both deadbeef and cafe1234 please"),
            vec!["deadbeef", "cafe1234"]
        );
    }

    #[test]
    fn test_scan_rejects_short_runs() {
        assert!(scan("cafe is 4 chars, f00 is 3").is_empty());
    }

    #[test]
    fn test_scan_rejects_overlong_runs() {
        let run = "a".repeat(41);
        assert!(scan(&run).is_empty());
        let full = "b".repeat(40);
        assert_eq!(scan(&full), vec![full.as_str()]);
    }

    #[test]
    fn test_scan_requires_word_boundaries() {
        assert!(scan("0xdeadbeef").is_empty());
        assert!(scan("deadbeefs").is_empty());
        assert!(scan("x_deadbeef_y").is_empty());
        assert_eq!(scan("(deadbeef)"), vec!["deadbeef"]);
    }

    #[test]
    fn test_scan_dedups_adjacent_repeats() {
        assert_eq!(scan("deadbeef deadbeef"), vec!["deadbeef"]);
    }

    #[test]
    fn test_uppercase_is_not_an_identifier() {
        // Identifiers are emitted lowercase; uppercase runs are prose.
        assert!(scan("DEADBEEF").is_empty());
    }
}
