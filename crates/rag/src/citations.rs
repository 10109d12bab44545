//! Citation extraction and reconciliation.
//!
//! Matches the ids the model cited against the citations and context blocks
//! the retriever produced. Cited ids that were never retrieved are kept in
//! `used_ids`; they simply have no citation or block to show.

use scholar_core::document::{AnswerResult, BLOCK_HEADER_PREFIX, BLOCK_SEPARATOR, Citation};
use std::collections::HashMap;

/// Extract bracketed ids of the form `[DDDD.DDDDDvN]`, unique, in first-seen
/// order.
pub fn extract_citation_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match parse_bracketed_id(after) {
            Some(len) => {
                let id = &after[..len];
                if !ids.iter().any(|seen| seen == id) {
                    ids.push(id.to_string());
                }
                rest = &after[len + 1..];
            }
            None => rest = after,
        }
    }
    ids
}

/// If `s` starts with `DDDD.DDDDDvN+]`, return the length of the id (without
/// the closing bracket).
fn parse_bracketed_id(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let digits = |from: usize, count: usize| {
        bytes.len() >= from + count && bytes[from..from + count].iter().all(u8::is_ascii_digit)
    };

    if !digits(0, 4) || bytes.get(4) != Some(&b'.') || !digits(5, 5) || bytes.get(10) != Some(&b'v') {
        return None;
    }

    let version = bytes[11..].iter().take_while(|b| b.is_ascii_digit()).count();
    let end = 11 + version;
    if version > 0 && bytes.get(end) == Some(&b']') {
        Some(end)
    } else {
        None
    }
}

/// Split a rendered context into `(doc_id, block)` pairs.
///
/// Blocks whose first line is not a `DOC [<id>]` header are ignored.
fn parse_blocks(context: &str) -> Vec<(&str, &str)> {
    if context.is_empty() {
        return vec![];
    }
    context
        .split(BLOCK_SEPARATOR)
        .filter_map(|block| {
            let header = block.lines().next()?;
            let id = header
                .strip_prefix(BLOCK_HEADER_PREFIX)?
                .strip_prefix('[')?
                .strip_suffix(']')?;
            Some((id, block))
        })
        .collect()
}

/// Build the final payload for `answer`.
///
/// With citations in the answer: citations are filtered to the cited ids in
/// their original (relevance) order, and context blocks are returned in
/// citation order, dropping ids with no block. Without any: every citation
/// and the whole context as a single element.
pub fn reconcile(answer: String, citations: &[Citation], context: &str) -> AnswerResult {
    let used_ids = extract_citation_ids(&answer);

    if used_ids.is_empty() {
        return AnswerResult {
            answer,
            citations: citations.to_vec(),
            retrieved_context: if context.is_empty() {
                vec![]
            } else {
                vec![context.to_string()]
            },
            used_ids,
        };
    }

    let filtered: Vec<Citation> = citations
        .iter()
        .filter(|c| used_ids.contains(&c.doc_id))
        .cloned()
        .collect();

    let mut blocks: HashMap<&str, &str> = HashMap::new();
    for (id, block) in parse_blocks(context) {
        blocks.entry(id).or_insert(block);
    }
    let retrieved_context = used_ids
        .iter()
        .filter_map(|id| blocks.get(id.as_str()).map(|b| b.to_string()))
        .collect();

    AnswerResult {
        answer,
        citations: filtered,
        retrieved_context,
        used_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::render_context;
    use crate::test_helpers::doc;
    use scholar_core::RetrievedDocument;

    fn retrieved() -> Vec<RetrievedDocument> {
        vec![
            doc("2501.00001v1", 0.1),
            doc("2501.00002v1", 0.2),
            doc("2501.00003v2", 0.3),
        ]
    }

    fn citations() -> Vec<Citation> {
        retrieved().iter().map(Citation::from).collect()
    }

    #[test]
    fn extraction_is_ordered_and_unique() {
        let text = "A [2510.02964v1] b [2511.01111v2] c [2510.02964v1].";
        assert_eq!(extract_citation_ids(text), vec!["2510.02964v1", "2511.01111v2"]);
    }

    #[test]
    fn extraction_rejects_near_misses() {
        let text = "[2510.0296v1] [251.02964v1] [2510.02964] [2510.02964v] [2510.02964v1x] \
                    (2510.02964v1) [[2510.02964v12]]";
        assert_eq!(extract_citation_ids(text), vec!["2510.02964v12"]);
    }

    #[test]
    fn extraction_handles_adjacent_and_unicode_text() {
        let text = "Résumé [2501.00001v1][2501.00002v3] fin]";
        assert_eq!(extract_citation_ids(text), vec!["2501.00001v1", "2501.00002v3"]);
        assert!(extract_citation_ids("no ids [at all").is_empty());
    }

    #[test]
    fn cited_ids_filter_citations_in_relevance_order() {
        let context = render_context(&retrieved(), 0);
        let answer = "First [2501.00003v2], then [2501.00001v1].".to_string();

        let result = reconcile(answer, &citations(), &context);
        let cited: Vec<&str> = result.citations.iter().map(|c| c.doc_id.as_str()).collect();
        assert_eq!(cited, vec!["2501.00001v1", "2501.00003v2"]);
        assert_eq!(result.used_ids, vec!["2501.00003v2", "2501.00001v1"]);

        assert_eq!(result.retrieved_context.len(), 2);
        assert!(result.retrieved_context[0].starts_with("DOC [2501.00003v2]"));
        assert!(result.retrieved_context[1].starts_with("DOC [2501.00001v1]"));
        assert!(!result.retrieved_context[0].contains(BLOCK_SEPARATOR));
    }

    #[test]
    fn no_citations_fall_back_to_everything() {
        let context = render_context(&retrieved(), 0);
        let result = reconcile("Nothing cited.".into(), &citations(), &context);
        assert_eq!(result.citations.len(), 3);
        assert_eq!(result.retrieved_context, vec![context]);
        assert!(result.used_ids.is_empty());

        let result = reconcile("Nothing cited.".into(), &[], "");
        assert!(result.retrieved_context.is_empty());
    }

    #[test]
    fn hallucinated_id_kept_but_has_no_block() {
        let only = vec![doc("2501.00001v1", 0.1)];
        let context = render_context(&only, 0);
        let cites: Vec<Citation> = only.iter().map(Citation::from).collect();

        let result = reconcile("It works [2599.99999v9].".into(), &cites, &context);
        assert_eq!(result.used_ids, vec!["2599.99999v9"]);
        assert!(result.citations.is_empty());
        assert!(result.retrieved_context.is_empty());
    }
}
