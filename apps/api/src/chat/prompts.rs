// Prompt assembly for the resume chat.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::chat::message::{Message, Role};
use crate::llm_client::prompts::{LATEX_RULES, RESPONSE_FORMAT};
use crate::models::resume::JobContext;

/// Only the most recent messages are sent; older history is dropped.
pub const HISTORY_WINDOW: usize = 10;

const CHAT_FRAMING: &str = "You are an expert resume editor and career coach. \
You help the user tailor their LaTeX resume through conversation. \
You can answer questions about the resume or edit it on request.";

/// Builds the full chat prompt. `history` must already include the user's latest message.
pub fn build_chat_prompt(document: &str, job: &JobContext, history: &[Message]) -> String {
    let mut prompt = String::with_capacity(document.len() + 2048);

    prompt.push_str(CHAT_FRAMING);
    prompt.push_str("\n\nCURRENT LATEX RESUME:\n");
    prompt.push_str(document);
    prompt.push('\n');

    if let Some(block) = job_context_block(job) {
        prompt.push('\n');
        prompt.push_str(&block);
    }

    prompt.push('\n');
    prompt.push_str(RESPONSE_FORMAT);
    prompt.push_str("\n\n");
    prompt.push_str(LATEX_RULES);
    prompt.push_str("\n\nCONVERSATION:\n");

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for message in &history[start..] {
        let label = match message.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{label}: {}\n", message.content));
    }

    prompt
}

/// Renders the job block, or `None` when no job field is set.
pub fn job_context_block(job: &JobContext) -> Option<String> {
    if job.is_empty() {
        return None;
    }
    let mut block = String::from("TARGET JOB:\n");
    if let Some(title) = job.job_title() {
        block.push_str(&format!("Title: {title}\n"));
    }
    if let Some(company) = job.company() {
        block.push_str(&format!("Company: {company}\n"));
    }
    if let Some(description) = job.job_description() {
        block.push_str(&format!("Description:\n{description}\n"));
    }
    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {i}"))
                } else {
                    Message::assistant(format!("answer {i}"), None)
                }
            })
            .collect()
    }

    #[test]
    fn test_prompt_sections_appear_in_order() {
        let job = JobContext {
            job_title: Some("Rust Engineer".to_string()),
            company: Some("Acme".to_string()),
            job_description: None,
        };
        let prompt = build_chat_prompt("\\begin{document}x\\end{document}", &job, &history(2));

        let framing = prompt.find("expert resume editor").unwrap();
        let document = prompt.find("CURRENT LATEX RESUME:").unwrap();
        let job_block = prompt.find("TARGET JOB:").unwrap();
        let grammar = prompt.find("---MESSAGE---").unwrap();
        let rules = prompt.find("RULES:").unwrap();
        let conversation = prompt.find("CONVERSATION:").unwrap();

        assert!(framing < document);
        assert!(document < job_block);
        assert!(job_block < grammar);
        assert!(grammar < rules);
        assert!(rules < conversation);
        assert!(prompt.contains("User: question 0\nAssistant: answer 1\n"));
    }

    #[test]
    fn test_job_block_omitted_when_empty() {
        let prompt = build_chat_prompt("doc", &JobContext::default(), &history(1));
        assert!(!prompt.contains("TARGET JOB:"));
    }

    #[test]
    fn test_history_is_bounded_to_last_ten() {
        let prompt = build_chat_prompt("doc", &JobContext::default(), &history(14));
        assert!(!prompt.contains("question 0\n"));
        assert!(!prompt.contains("answer 3\n"));
        assert!(prompt.contains("question 4\n"));
        assert!(prompt.contains("answer 13\n"));
        assert_eq!(prompt.matches("User: ").count() + prompt.matches("Assistant: ").count(), 10);
    }

    #[test]
    fn test_job_block_renders_description() {
        let job = JobContext {
            job_description: Some("Build distributed systems.".to_string()),
            ..Default::default()
        };
        let block = job_context_block(&job).unwrap();
        assert!(block.contains("Description:\nBuild distributed systems."));
        assert!(!block.contains("Title:"));
    }
}
