//! Single-pass punctuation normalization for model output.
//!
//! Models writing in a CJK context regularly emit full-width brackets,
//! colons and curly quotes inside JSON. Every substitution lives in one
//! table so the mapping can be audited.

/// Zero-width characters and the BOM, dropped entirely.
pub const INVISIBLE_CHARS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Code point substitutions applied before any pattern matching.
pub const PUNCTUATION_TABLE: [(char, char); 16] = [
    // Curly quotes
    ('\u{201C}', '"'),
    ('\u{201D}', '"'),
    ('\u{2018}', '\''),
    ('\u{2019}', '\''),
    // Full-width brackets, braces, colon, comma
    ('\u{FF3B}', '['),
    ('\u{FF3D}', ']'),
    ('\u{FF5B}', '{'),
    ('\u{FF5D}', '}'),
    ('\u{FF1A}', ':'),
    ('\u{FF0C}', ','),
    // CJK brackets and enumeration comma
    ('\u{3010}', '['),
    ('\u{3011}', ']'),
    ('\u{3014}', '['),
    ('\u{3015}', ']'),
    ('\u{3001}', ','),
    // Ideographic space
    ('\u{3000}', ' '),
];

/// ASCII replacement for `c`, if the table has one.
pub fn substitute(c: char) -> Option<char> {
    PUNCTUATION_TABLE
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
}

/// Remove zero-width characters and the BOM.
pub fn strip_invisible(s: &str) -> String {
    s.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
}

/// Strip invisible characters and map table entries to ASCII in one pass.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .map(|c| substitute(c).unwrap_or(c))
        .collect()
}
