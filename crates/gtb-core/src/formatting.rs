/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Split a message into chunks of at most `limit` bytes, breaking on line
/// boundaries. A single line longer than `limit` is cut at char boundaries.
///
/// Callers must not put a tag across lines, or a chunk may end up unbalanced.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split_inclusive('\n') {
        if chunk.len() + line.len() > limit && !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }
        if line.len() <= limit {
            chunk.push_str(line);
            continue;
        }
        for c in line.chars() {
            if chunk.len() + c.len_utf8() > limit {
                out.push(std::mem::take(&mut chunk));
            }
            chunk.push(c);
        }
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}
