//! Shape checks run on a decision JSON candidate before deserialization.

use crate::error::{fragment, ParseError};

/// Collapse whitespace between the opening `[` and `{`.
pub fn compact_array_open(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed.strip_prefix('[') {
        Some(rest) => {
            let after = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
            if after.starts_with('{') && after.len() < rest.len() {
                format!("[{after}")
            } else {
                trimmed.to_string()
            }
        }
        None => trimmed.to_string(),
    }
}

/// Reject candidates that are not an object array, contain numeric ranges,
/// or use thousands separators in numbers.
pub fn validate_json_format(json: &str) -> Result<(), ParseError> {
    let trimmed = json.trim();

    if !starts_with_object_array(trimmed) {
        // A bare number array like [98000, 102000] is the usual culprit
        let head: String = trimmed.chars().take(20).collect();
        let shown = if trimmed.starts_with('[') && !head.contains('{') {
            trimmed.chars().take(50).collect()
        } else {
            head
        };
        return Err(ParseError::InvalidShape { fragment: shown });
    }

    if json.contains('~') {
        return Err(ParseError::RangeSymbol {
            fragment: fragment(json),
        });
    }

    check_thousands_separators(json)
}

fn starts_with_object_array(s: &str) -> bool {
    s.strip_prefix('[')
        .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_whitespace()))
        .is_some_and(|rest| rest.starts_with('{'))
}

/// Flag `d,ddd` digit groups that sit outside string literals.
///
/// Tracks quote and escape state so a comma inside a string value such as
/// `"价格102,707"` is never reported.
pub fn check_thousands_separators(json: &str) -> Result<(), ParseError> {
    let bytes = json.as_bytes();
    let mut in_string = false;
    let mut escaped = false;

    for i in 0..bytes.len().saturating_sub(4) {
        let b = bytes[i];
        if b == b'"' && !escaped {
            in_string = !in_string;
        }
        escaped = b == b'\\' && !escaped;

        if in_string {
            continue;
        }

        if b.is_ascii_digit()
            && bytes[i + 1] == b','
            && bytes[i + 2..i + 5].iter().all(u8::is_ascii_digit)
        {
            let end = (i + 10).min(bytes.len());
            return Err(ParseError::ThousandsSeparator {
                found: String::from_utf8_lossy(&bytes[i..end]).into_owned(),
            });
        }
    }

    Ok(())
}
