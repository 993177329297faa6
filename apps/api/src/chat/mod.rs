// Resume chat: conversational LaTeX editing.
// Raw completion text → response_parser (→ diff, validator) → session (proposal lifecycle).
// All completion calls go through llm_client::CompletionClient.

pub mod diff;
pub mod handlers;
pub mod message;
pub mod persistence;
pub mod prompts;
pub mod registry;
pub mod response_parser;
pub mod session;
pub mod validator;
