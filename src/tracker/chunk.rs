//! Content-aware splitting of a report into webhook-sized messages.
//!
//! All lengths are counted in `char`s, which is how the chat platform
//! measures its message ceiling.

/// A newline is only used as a break point if it lies at least this far
/// into the window.
const MIN_BREAK_RATIO: f64 = 0.6;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`-th char, or `s.len()` if `s` is shorter.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(idx, _)| idx)
}

fn take_chars(s: &str, n: usize) -> &str {
    &s[..byte_offset(s, n)]
}

/// Split `content` into pieces of at most `limit` chars, preferring the last
/// newline at or before `limit`.
pub fn chunk_text(content: &str, limit: usize) -> Vec<String> {
    if content.is_empty() || limit == 0 {
        return Vec::new();
    }

    let min_break = (limit as f64 * MIN_BREAK_RATIO) as usize;
    let mut chunks = Vec::new();
    let mut remaining = content;
    while !remaining.is_empty() {
        if char_len(remaining) <= limit {
            chunks.push(remaining.to_string());
            break;
        }

        let search = take_chars(remaining, limit + 1);
        let cut_at = match search.rfind('\n') {
            Some(nl) if char_len(&search[..nl]) >= min_break => nl + 1,
            _ => byte_offset(remaining, limit),
        };

        let (head, tail) = remaining.split_at(cut_at);
        chunks.push(head.trim_end_matches('\n').to_string());
        remaining = tail.strip_prefix('\n').unwrap_or(tail);
    }
    chunks
}

fn counter_suffix(index: usize, total: usize) -> String {
    format!("\n\nPart {index}/{total}")
}

/// Chunk `content` and, when it spans several messages, tag each one with
/// `Part i/n` without exceeding `limit`.
///
/// Room for the counter is reserved before splitting so that no line is
/// cut to make space for it. A limit too small to hold the counter yields
/// the plain chunks.
pub fn paginate(content: &str, limit: usize, with_counters: bool) -> Vec<String> {
    let plain = chunk_text(content, limit);
    if !with_counters || plain.len() <= 1 {
        return plain;
    }

    let mut total = plain.len();
    let chunks = loop {
        let reserve = char_len(&counter_suffix(total, total));
        let budget = limit.saturating_sub(reserve);
        if budget == 0 {
            return plain;
        }
        let chunks = chunk_text(content, budget);
        if chunks.len().to_string().len() <= total.to_string().len() {
            break chunks;
        }
        total = chunks.len();
    };

    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| format!("{chunk}{}", counter_suffix(idx + 1, total)))
        .collect()
}
