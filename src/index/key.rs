//! Search key normalization.
//!
//! Keys use the same escaping Doxygen writes into its `search/*.js` files: ASCII
//! alphanumerics are kept (letters lowercased) and every other byte becomes `_xx`
//! with two lowercase hex digits. A space therefore becomes `_20`, which doubles as
//! the word separator for multi-token queries.

use std::fmt::Write as _;

/// Normalized form of the word separator (an encoded space).
pub const SEPARATOR: &str = "_20";

/// Normalizes free text into the search key alphabet.
///
/// ```
/// use symdex::index::key::normalize;
///
/// assert_eq!(normalize("Name Tables"), "name_20tables");
/// assert_eq!(normalize("control_word"), "control_5fword");
/// ```
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte.to_ascii_lowercase() as char);
        } else {
            // Writing to a String cannot fail
            let _ = write!(out, "_{:02x}", byte);
        }
    }
    out
}

/// Why a key was rejected by [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProblem {
    Empty,
    /// Byte offset of a character outside `[0-9a-z_]`.
    ForeignChar(usize),
    /// Byte offset of an `_` not followed by two lowercase hex digits.
    BrokenEscape(usize),
}

impl std::fmt::Display for KeyProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "key is empty"),
            Self::ForeignChar(at) => {
                write!(f, "character at byte {} is outside the normalized alphabet", at)
            }
            Self::BrokenEscape(at) => write!(f, "incomplete escape sequence at byte {}", at),
        }
    }
}

/// Checks that `key` only uses the normalized alphabet.
pub fn validate(key: &str) -> Result<(), KeyProblem> {
    if key.is_empty() {
        return Err(KeyProblem::Empty);
    }

    let bytes = key.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' | b'a'..=b'z' => i += 1,
            b'_' => {
                let escape = bytes.get(i + 1..i + 3);
                match escape {
                    Some([hi, lo]) if is_lower_hex(*hi) && is_lower_hex(*lo) => i += 3,
                    _ => return Err(KeyProblem::BrokenEscape(i)),
                }
            }
            _ => return Err(KeyProblem::ForeignChar(i)),
        }
    }
    Ok(())
}

const fn is_lower_hex(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'a'..=b'f')
}

/// Byte length of the key character starting at `at`.
///
/// A character is one alphanumeric byte or one three-byte escape. Offsets past the
/// end (or into a truncated escape) are clamped to the remaining length.
pub fn char_len_at(key: &str, at: usize) -> usize {
    let remaining = key.len().saturating_sub(at);
    if key.as_bytes().get(at) == Some(&b'_') {
        remaining.min(3)
    } else {
        remaining.min(1)
    }
}

/// Returns the prefix of `key` made of its first `chars` characters.
///
/// Shorter keys are returned whole.
pub fn char_prefix(key: &str, chars: usize) -> &str {
    let mut end = 0;
    for _ in 0..chars {
        if end >= key.len() {
            break;
        }
        end += char_len_at(key, end);
    }
    &key[..end]
}

/// The `index`-th character of `key`, or `None` if the key is shorter.
pub fn char_at(key: &str, index: usize) -> Option<&str> {
    let start = char_prefix(key, index).len();
    if start >= key.len() {
        return None;
    }
    Some(&key[start..start + char_len_at(key, start)])
}

/// Shortest whole-character prefix of `upper` that sorts strictly after `lower`.
///
/// Requires `lower < upper`. Used for bucket boundaries in the manifest.
pub fn distinguishing_prefix<'a>(lower: &str, upper: &'a str) -> &'a str {
    debug_assert!(lower < upper);
    let mut end = 0;
    while end < upper.len() {
        end += char_len_at(upper, end);
        if &upper[..end] > lower {
            break;
        }
    }
    &upper[..end]
}

/// Shortest whole-character prefix of `lower` that still sorts strictly before `upper`.
pub fn shortest_lower_prefix<'a>(lower: &'a str, upper: &str) -> &'a str {
    debug_assert!(lower < upper);
    let common = lower
        .bytes()
        .zip(upper.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    // Widen to the end of the character that contains the first differing byte
    let mut end = 0;
    while end < lower.len() && end <= common {
        end += char_len_at(lower, end);
    }
    &lower[..end.min(lower.len())]
}

/// Shortest whole-character prefix of `key` that sorts at or after `bound`.
///
/// Requires `key >= bound`, so `key` itself always qualifies.
pub fn prefix_at_least<'a>(key: &'a str, bound: &str) -> &'a str {
    let mut end = 0;
    while &key[..end] < bound && end < key.len() {
        end += char_len_at(key, end);
    }
    &key[..end]
}

/// Splits a normalized string on the separator token, dropping empty tokens.
pub fn split_tokens(normalized: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut at = 0;
    while at < normalized.len() {
        let len = char_len_at(normalized, at);
        if &normalized[at..at + len] == SEPARATOR {
            if at > start {
                tokens.push(&normalized[start..at]);
            }
            start = at + len;
        }
        at += len;
    }
    if start < normalized.len() {
        tokens.push(&normalized[start..]);
    }
    tokens
}

/// Finds `needle` in `haystack` at a character boundary, starting at byte `from`.
///
/// Returns the byte offset just past the match.
pub fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let mut at = from;
    while at + needle.len() <= haystack.len() {
        if haystack[at..].starts_with(needle) {
            return Some(at + needle.len());
        }
        at += char_len_at(haystack, at);
    }
    None
}

/// True if every token occurs in `haystack`, in order, without overlapping.
pub fn contains_in_order(haystack: &str, tokens: &[&str]) -> bool {
    let mut from = 0;
    for token in tokens {
        match find_from(haystack, token, from) {
            Some(next) => from = next,
            None => return false,
        }
    }
    true
}
