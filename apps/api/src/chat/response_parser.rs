//! Response Parser: turns raw completion text into a message plus an edit proposal.
//!
//! Grammar (every section optional except the message):
//!
//! ```text
//! ---MESSAGE---
//! <free text>
//! ---CHANGES---
//! <diff block>
//! ---LATEX---
//! <full replacement document>
//! ---END---
//! ```
//!
//! Each section runs from its delimiter to the first later delimiter, or to
//! end of text. Parsing is total: any input yields a non-empty message.

use tracing::{debug, warn};

use crate::chat::diff::extract_changes;
use crate::chat::message::{Change, EditProposal};
use crate::chat::validator::{validate_document, INVALID_DOCUMENT_MESSAGE};

pub const MESSAGE_DELIMITER: &str = "---MESSAGE---";
pub const CHANGES_DELIMITER: &str = "---CHANGES---";
pub const LATEX_DELIMITER: &str = "---LATEX---";
pub const END_DELIMITER: &str = "---END---";

/// Fixed delimiter order. A section ends at the first delimiter that follows it here.
const DELIMITERS: [&str; 4] = [
    MESSAGE_DELIMITER,
    CHANGES_DELIMITER,
    LATEX_DELIMITER,
    END_DELIMITER,
];

pub const FALLBACK_MESSAGE: &str = "I processed your request.";

/// Page-break control words forbidden by the single-page constraint.
const PAGE_BREAK_COMMANDS: [&str; 3] = ["\\newpage", "\\clearpage", "\\pagebreak"];

/// Raw section slices located in the completion text.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Sections<'a> {
    pub message: Option<&'a str>,
    pub changes: Option<&'a str>,
    pub latex: Option<&'a str>,
}

/// Structured result of parsing a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub message: String,
    pub changes: Vec<Change>,
    pub replacement_document: Option<String>,
    /// The model sent a document that failed validation and was discarded.
    pub rejected: bool,
}

impl ParsedResponse {
    /// Splits into display text and the proposal to attach, if any.
    pub fn into_parts(self) -> (String, Option<EditProposal>) {
        let proposal = if self.changes.is_empty() && self.replacement_document.is_none() {
            None
        } else {
            Some(EditProposal {
                changes: self.changes,
                replacement_document: self.replacement_document,
            })
        };
        (self.message, proposal)
    }
}

/// Parses raw completion text. Never fails.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let sections = split_sections(raw);

    let message = match sections.message {
        Some(text) => text.to_string(),
        None => strip_delimiter_tokens(raw).trim().to_string(),
    };
    let message = if message.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        message
    };

    let changes = sections.changes.map(extract_changes).unwrap_or_default();

    let candidate = sections
        .latex
        .map(clean_document)
        .filter(|doc| !doc.is_empty());

    match candidate {
        Some(document) => {
            let verdict = validate_document(&document);
            if verdict.is_accepted() {
                debug!(
                    "Parsed proposal: {} change(s), {} byte document",
                    changes.len(),
                    document.len()
                );
                ParsedResponse {
                    message,
                    changes,
                    replacement_document: Some(document),
                    rejected: false,
                }
            } else {
                warn!("Rejected proposed document: {verdict:?}");
                ParsedResponse {
                    message: INVALID_DOCUMENT_MESSAGE.to_string(),
                    changes: Vec::new(),
                    replacement_document: None,
                    rejected: true,
                }
            }
        }
        None => ParsedResponse {
            message,
            changes,
            replacement_document: None,
            rejected: false,
        },
    }
}

/// Locates each delimiter and slices up to the next later delimiter.
pub fn split_sections(raw: &str) -> Sections<'_> {
    Sections {
        message: section(raw, 0),
        changes: section(raw, 1),
        latex: section(raw, 2),
    }
}

fn section(raw: &str, index: usize) -> Option<&str> {
    let marker = DELIMITERS[index];
    let start = raw.find(marker)? + marker.len();
    let rest = &raw[start..];
    let end = DELIMITERS[index + 1..]
        .iter()
        .filter_map(|next| rest.find(next))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Removes generic `---WORD---` tokens. Used only on the degraded path where
/// no MESSAGE delimiter exists; legitimate text of that shape is lost too.
fn strip_delimiter_tokens(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        match delimiter_token_len(&bytes[i..]) {
            Some(len) => {
                out.push_str(&text[copied_from..i]);
                i += len;
                copied_from = i;
            }
            None => i += 1,
        }
    }
    out.push_str(&text[copied_from..]);
    out
}

fn delimiter_token_len(bytes: &[u8]) -> Option<usize> {
    const DASHES: &[u8] = b"---";
    if !bytes.starts_with(DASHES) {
        return None;
    }
    let word_len = bytes[DASHES.len()..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    if word_len == 0 {
        return None;
    }
    let tail = DASHES.len() + word_len;
    bytes[tail..]
        .starts_with(DASHES)
        .then_some(tail + DASHES.len())
}

/// Strips code fences and forbidden page breaks from a proposed document.
pub fn clean_document(latex: &str) -> String {
    strip_page_breaks(strip_code_fence(latex)).trim().to_string()
}

/// Strips a leading ```` ``` ```` (optionally with a language tag) and a trailing ```` ``` ````.
fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'+'))
            .count();
        text = rest[tag_len..].trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

/// Removes `\newpage`, `\clearpage` and `\pagebreak`. A longer control word
/// such as `\newpagestyle` is left alone.
fn strip_page_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    'scan: while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        for command in PAGE_BREAK_COMMANDS {
            if let Some(after) = candidate.strip_prefix(command) {
                if !after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    rest = after;
                    continue 'scan;
                }
            }
        }
        out.push('\\');
        rest = &candidate[1..];
    }
    out.push_str(rest);
    out
}
