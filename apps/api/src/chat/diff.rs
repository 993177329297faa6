//! Diff Extractor: turns a CHANGES block into ordered before/after pairs.
//!
//! Primary grammar is a `BEFORE:` line followed by an `AFTER:` line. When the
//! model ignores that format entirely, every non-blank line becomes a
//! description-only change (`before` empty). The two modes never mix.

use crate::chat::message::Change;

const BEFORE_TAG: &str = "BEFORE:";
const AFTER_TAG: &str = "AFTER:";

/// Extracts change pairs from the raw CHANGES section text.
pub fn extract_changes(block: &str) -> Vec<Change> {
    let pairs = extract_pairs(block);
    if !pairs.is_empty() {
        return pairs;
    }
    extract_descriptions(block)
}

/// Scans left to right for BEFORE/AFTER records. A BEFORE line not directly
/// followed (ignoring blank lines) by an AFTER line is dropped.
fn extract_pairs(block: &str) -> Vec<Change> {
    let mut pairs = Vec::new();
    let mut pending_before: Option<&str> = None;

    for line in block.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(before) = line.strip_prefix(BEFORE_TAG) {
            pending_before = Some(before.trim());
        } else if let Some(after) = line.strip_prefix(AFTER_TAG) {
            if let Some(before) = pending_before.take() {
                pairs.push(Change::new(before, after.trim()));
            }
        } else {
            pending_before = None;
        }
    }

    pairs
}

fn extract_descriptions(block: &str) -> Vec<Change> {
    block
        .lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(|line| Change::new("", line))
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))
        .map(str::trim_start)
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pair() {
        let changes = extract_changes("BEFORE: Python\nAFTER: Python, Go\n");
        assert_eq!(changes, vec![Change::new("Python", "Python, Go")]);
    }

    #[test]
    fn test_pairs_preserve_order() {
        let block = "BEFORE: a\nAFTER: b\n\nBEFORE: c\nAFTER: d";
        let changes = extract_changes(block);
        assert_eq!(changes, vec![Change::new("a", "b"), Change::new("c", "d")]);
    }

    #[test]
    fn test_pairs_are_trimmed() {
        let changes = extract_changes("   BEFORE:    Led team   \n  AFTER:  Led 5-person team  ");
        assert_eq!(changes, vec![Change::new("Led team", "Led 5-person team")]);
    }

    #[test]
    fn test_bullet_fallback() {
        let changes = extract_changes("- Added React\n- Removed jQuery");
        assert_eq!(
            changes,
            vec![
                Change::new("", "Added React"),
                Change::new("", "Removed jQuery")
            ]
        );
    }

    #[test]
    fn test_fallback_strips_star_bullets_and_blank_lines() {
        let changes = extract_changes("* Tightened summary\n\n   \nReordered skills");
        assert_eq!(
            changes,
            vec![
                Change::new("", "Tightened summary"),
                Change::new("", "Reordered skills")
            ]
        );
    }

    #[test]
    fn test_fallback_never_merges_with_primary_grammar() {
        let block = "Some preamble line\nBEFORE: Java\nAFTER: Java, Kotlin\n- stray bullet";
        let changes = extract_changes(block);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0], Change::new("Java", "Java, Kotlin"));
    }

    #[test]
    fn test_orphan_before_is_dropped() {
        let block = "BEFORE: lost\nsomething else\nBEFORE: x\nAFTER: y";
        assert_eq!(extract_changes(block), vec![Change::new("x", "y")]);
    }

    #[test]
    fn test_empty_block_yields_nothing() {
        assert!(extract_changes("").is_empty());
        assert!(extract_changes("\n  \n").is_empty());
    }

    #[test]
    fn test_orphan_after_only_falls_back_to_lines() {
        let changes = extract_changes("AFTER: dangling");
        assert_eq!(changes, vec![Change::new("", "AFTER: dangling")]);
    }
}
