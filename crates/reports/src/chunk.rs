//! Splits long messages for chat delivery.

/// Paragraph separator used by every formatter in this crate.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Pack paragraphs greedily into chunks of at most `max_chars` characters.
///
/// Splits only on [`PARAGRAPH_BREAK`]; a paragraph longer than `max_chars`
/// is emitted on its own, unsplit. Joining the chunks with
/// [`PARAGRAPH_BREAK`] gives back the input. Empty input yields no chunks.
pub fn chunk_for_delivery(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Option<String> = None;
    let mut current_len = 0usize;
    let sep_len = PARAGRAPH_BREAK.chars().count();

    for paragraph in text.split(PARAGRAPH_BREAK) {
        let para_len = paragraph.chars().count();
        current = Some(match current.take() {
            None => {
                current_len = para_len;
                paragraph.to_string()
            }
            Some(buf) if current_len + sep_len + para_len > max_chars => {
                chunks.push(buf);
                current_len = para_len;
                paragraph.to_string()
            }
            Some(mut buf) => {
                buf.push_str(PARAGRAPH_BREAK);
                buf.push_str(paragraph);
                current_len += sep_len + para_len;
                buf
            }
        });
    }

    chunks.extend(current);
    chunks
}
