//! Splitting outgoing reminder text to fit Discord's message limit
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Message limit only; reminders never go out as embeds
//! - 1.0.0: Initial release

/// Discord message content limit, in bytes
pub const MESSAGE_LIMIT: usize = 2000;

/// Split `text` into pieces of at most `max_size` bytes
///
/// Breaks at newlines when it can and never inside a UTF-8 character.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        // +1 for the newline joining it to `current`
        let needed = line.len() + usize::from(!current.is_empty());
        if current.len() + needed <= max_size {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() <= max_size {
            current.push_str(line);
        } else {
            let mut pieces = split_at_char_boundaries(line, max_size);
            // Keep the tail open so following short lines can join it
            current = pieces.pop().unwrap_or_default();
            chunks.extend(pieces);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_at_char_boundaries(line: &str, max_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for (idx, ch) in line.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > max_size && end > start {
            pieces.push(line[start..end].to_string());
            start = end;
        }
        end = next;
    }
    if end > start {
        pieces.push(line[start..end].to_string());
    }
    pieces
}

/// Chunk a reminder message for delivery
pub fn chunk_for_message(text: &str) -> Vec<String> {
    chunk_text(text, MESSAGE_LIMIT)
}
