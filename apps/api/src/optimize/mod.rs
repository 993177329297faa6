// AI optimize: one-shot tailoring of the whole resume to the job description.
// The result is only a proposal; accepting it goes through ChatSession::replace_document.

pub mod handlers;
pub mod optimizer;
pub mod prompts;
