//! Locating reasoning and decision JSON inside free-form text.
//!
//! Plain byte scanning instead of regular expressions: every delimiter we
//! look for is ASCII, so byte offsets always land on char boundaries.

/// Content between the first `<tag>` and the next `</tag>`.
pub fn tag_content<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let len = text[start..].find(&close)?;
    Some(&text[start..start + len])
}

/// Byte offset of the first `<tag>`.
pub fn tag_start(text: &str, tag: &str) -> Option<usize> {
    text.find(&format!("<{tag}>"))
}

/// The `[{ ... }]` array inside the first ```json fence that opens one.
///
/// The fence marker is matched case-insensitively. The shortest array that
/// closes right before a fence terminator wins.
pub fn fenced_json_array(text: &str) -> Option<&str> {
    const FENCE: &[u8] = b"```json";
    let bytes = text.as_bytes();

    let mut from = 0;
    while let Some(pos) = find_ignore_ascii_case(bytes, FENCE, from) {
        from = pos + 1;
        let open = skip_whitespace(bytes, pos + FENCE.len());
        if let Some(brace) = object_array_open(bytes, open) {
            // A later fence can only close at a subset of these positions
            return object_array_end(bytes, brace, true).map(|end| &text[open..end]);
        }
    }
    None
}

/// First `[ {...} ]` array-of-objects pattern anywhere in `text`.
///
/// Single forward pass: the earliest opening wins, and if it never closes
/// no later opening can either.
pub fn first_object_array(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let (start, brace) = (0..bytes.len())
        .filter(|&i| bytes[i] == b'[')
        .find_map(|i| object_array_open(bytes, i).map(|brace| (i, brace)))?;
    object_array_end(bytes, brace, false).map(|end| &text[start..end])
}

/// Offset of the `{` when `[` plus optional whitespace plus `{` opens at `start`.
fn object_array_open(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start) != Some(&b'[') {
        return None;
    }
    let brace = skip_whitespace(bytes, start + 1);
    (bytes.get(brace) == Some(&b'{')).then_some(brace)
}

/// Exclusive end of the shortest `} ]` close after the `{` at `brace`.
///
/// With `fenced`, the closing `]` must be followed by optional whitespace and
/// a closing ``` marker.
fn object_array_end(bytes: &[u8], brace: usize, fenced: bool) -> Option<usize> {
    let mut j = brace + 1;
    while j < bytes.len() {
        if bytes[j] != b'}' {
            j += 1;
            continue;
        }
        let bracket = skip_whitespace(bytes, j + 1);
        if bytes.get(bracket) == Some(&b']') {
            if !fenced {
                return Some(bracket + 1);
            }
            let tail = skip_whitespace(bytes, bracket + 1);
            if bytes[tail..].starts_with(b"```") {
                return Some(bracket + 1);
            }
        }
        // Whitespace between j and bracket holds no '}'
        j = bracket.max(j + 1);
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}
