//! Document Validator: structural envelope check on a proposed replacement document.
//!
//! This does not parse LaTeX. It only catches truncated or corrupted output
//! that lost the mandatory `\begin{document}` ... `\end{document}` envelope.

pub const BEGIN_BODY: &str = "\\begin{document}";
pub const END_BODY: &str = "\\end{document}";

/// Message shown instead of the model's text when its document is rejected.
pub const INVALID_DOCUMENT_MESSAGE: &str = "I tried to update your resume, but the generated LaTeX was invalid, so the changes were not applied. Please try rephrasing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    MissingBegin,
    MissingEnd,
}

impl Validation {
    pub fn is_accepted(self) -> bool {
        self == Validation::Accepted
    }
}

pub fn validate_document(document: &str) -> Validation {
    if !document.contains(BEGIN_BODY) {
        Validation::MissingBegin
    } else if !document.contains(END_BODY) {
        Validation::MissingEnd
    } else {
        Validation::Accepted
    }
}
