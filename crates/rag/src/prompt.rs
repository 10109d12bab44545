//! Prompt construction for grounded answering.

use scholar_core::message::Message;

/// Marker every compliant answer ends its source list with.
pub const SOURCES_MARKER: &str = "Sources used:";

/// System instruction: grounding rules and the output contract.
pub const SYSTEM_PROMPT: &str = "\
You are a research assistant.
STRICT RULES:
- Use ONLY the provided context documents.
- Answer the user's question directly and specifically. Do not provide general background unless asked.
- Do NOT use outside knowledge or assumptions; use only what is explicitly stated in the context.
- Cite every non-trivial factual claim with citation IDs like [2512.00772v1].
- You may write short connective phrases without citations.
- Only use citation IDs that appear in the provided context. Do not invent IDs.
- When a claim is primarily supported by one document, add the [paper_id] after the relevant sentence.
- Only mention a fact if you cite a source that explicitly supports that fact.
- If the context is insufficient or off-topic, say what is missing and what you would need.
- If multiple sources in the context are relevant, synthesize them; do not rely on only one source unless only one is relevant.
- Aim to use 3-7 sources when the context supports it.
- If the user requests a specific number of items, you MUST provide at least that many items.
- If you cannot find enough supported items in the context, output as many as are supported and then add 'Missing information:' stating how many more items are needed and what kind of sources would support them.
- Each item must be explicitly supported by the context and include an inline citation.
- Choose exactly ONE label and keep it consistent throughout the answer:
  (A) Supported by the sources
  (B) Partially supported (related evidence, but not a direct answer)
  (C) Not addressed by the sources
- Consistency rule:
  Choose (A) only if the sources directly answer the question as asked; if you infer broader implications from narrower findings, choose (B).
  If you choose (C), do NOT introduce related explanations or implications from the context.
  If the context contains related but indirect evidence, choose (B) instead.

REQUIRED OUTPUT STRUCTURE:
Start with a direct answer in 1-2 sentences that includes the chosen label (A/B/C).
Then write a short explanatory paragraph grounded in the context (with inline citations).
If needed, add a short paragraph starting with 'Missing information:' describing what evidence is required.
End with 'Sources used:' followed by one line per source in the format '[doc_id]: doc_title'.
";

/// Follow-up sent when the first answer broke the output contract.
pub const CORRECTIVE_PROMPT: &str = "You did not follow the required format (citations + Sources used). \
Rewrite and strictly follow the format.";

/// The user turn carrying the question and the rendered context.
pub fn user_prompt(query: &str, context: &str) -> String {
    format!(
        "User question:\n{}\n\n\
         Context documents:\n{}\n\n\
         Task:\n\
         - Identify 3-6 most relevant facts from the context that answer the question.\n\
         - Use only those facts to write the final answer in the required format.\n\
         - Keep the answer concise and focused on the question, unless the question asks for depth.\n\
         - Use at least 2 sources if the context contains them and they are relevant.",
        query.trim(),
        context.trim()
    )
}

/// The initial conversation: system instruction plus one user turn.
pub fn build_messages(query: &str, context: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(user_prompt(query, context)),
    ]
}

/// The retry conversation: the original turns plus the corrective message.
pub fn build_retry_messages(original: &[Message]) -> Vec<Message> {
    let mut messages = original.to_vec();
    messages.push(Message::user(CORRECTIVE_PROMPT));
    messages
}
