// Shared prompt fragments used by every LaTeX-editing request.
// Each feature that needs completion calls defines its own prompts.rs alongside it.

/// Hard constraints on any LaTeX the model sends back.
pub const LATEX_RULES: &str = "\
RULES:
1. The resume MUST stay on a single page. Tighten wording instead of adding length.
2. NEVER use \\newpage, \\clearpage or \\pagebreak.
3. Preserve the preamble, document class, packages and custom macros exactly unless the user asks otherwise.
4. The LaTeX section must contain the COMPLETE document from \\documentclass through \\end{document}.
5. Do NOT wrap the LaTeX in markdown code fences.
6. Never invent employers, dates, degrees or metrics that are not already in the resume or the user's message.";

/// The delimiter grammar every response must follow.
pub const RESPONSE_FORMAT: &str = "\
RESPONSE FORMAT (follow exactly):
---MESSAGE---
A short, friendly explanation of what you changed or your answer to the question.
---CHANGES---
BEFORE: <original text>
AFTER: <new text>
(repeat BEFORE/AFTER pairs for every change)
---LATEX---
<the complete updated LaTeX document>
---END---

If the user only asked a question and no edit is needed, omit the CHANGES and LATEX sections entirely.";
