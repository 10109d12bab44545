//! Context window rendering.

use scholar_core::document::{BLOCK_SEPARATOR, ContextBlock, RetrievedDocument};
use tracing::debug;

/// Render documents into blocks joined by `BLOCK_SEPARATOR`.
///
/// Blocks are appended in order while the joined string, separators
/// included, stays within `max_chars`; the first block that would overflow
/// stops rendering. Documents are never cut mid-block. `max_chars == 0`
/// disables the budget.
pub fn render_context(docs: &[RetrievedDocument], max_chars: usize) -> String {
    let separator_len = BLOCK_SEPARATOR.chars().count();
    let mut blocks: Vec<ContextBlock> = Vec::with_capacity(docs.len());
    let mut total = 0;

    for doc in docs {
        let block = ContextBlock::render(doc);
        let added = block.char_len() + if blocks.is_empty() { 0 } else { separator_len };

        if max_chars > 0 && total + added > max_chars {
            debug!(
                rendered = blocks.len(),
                dropped = docs.len() - blocks.len(),
                max_chars,
                "Context budget reached"
            );
            break;
        }

        total += added;
        blocks.push(block);
    }

    blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}
