//! Sentence-boundary truncation of abstracts.

/// Marker appended when text was cut.
pub const ELLIPSIS: &str = " …";

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate `text` to whole sentences fitting in `max_chars` characters.
///
/// Whitespace is normalized first. Text already within the budget comes back
/// unchanged; otherwise whole sentences are kept while they fit and the
/// ellipsis marker is appended, so the result is at most
/// `max_chars + ELLIPSIS` characters long. Lengths count `char`s.
pub fn truncate_by_sentences(text: &str, max_chars: usize) -> String {
    let text = collapse_whitespace(text);
    if text.chars().count() <= max_chars {
        return text;
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut total = 0;
    for sentence in split_sentences(&text) {
        let len = sentence.chars().count();
        if total + len + 1 > max_chars {
            break;
        }
        kept.push(sentence);
        total += len + 1;
    }

    let mut out = kept.join(" ");
    if out.is_empty() {
        out.push_str(ELLIPSIS.trim_start());
    } else {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Split after `.`, `!` or `?` when followed by whitespace.
///
/// Expects whitespace already collapsed to single spaces.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;

    for (i, c) in text.char_indices() {
        if c == ' ' && matches!(prev, Some('.' | '!' | '?')) {
            sentences.push(&text[start..i]);
            start = i + c.len_utf8();
        }
        prev = Some(c);
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
