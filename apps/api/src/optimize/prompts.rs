// Prompt fragments for whole-document optimization.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Opening instructions, followed by the job block.
pub const OPTIMIZE_FRAMING: &str = "\
You are an expert resume writer. Tailor the LaTeX resume below to the target job.

Goals:
- Surface the experience and skills most relevant to the job description.
- Mirror the job's terminology where the resume already supports it; never keyword-stuff.
- Rewrite weak bullets with strong action verbs and the metrics already present.
- Keep the candidate's facts unchanged: no new employers, dates, titles or numbers.";

/// Closing instruction, after the response format and rules.
pub const OPTIMIZE_CLOSING: &str = "\
List every rewritten line in the CHANGES section and always include the full updated document in the LATEX section.";
