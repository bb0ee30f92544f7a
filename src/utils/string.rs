//! UTF-8 safe truncation helpers.
//!
//! Chat text is routinely Cyrillic or emoji-heavy, so every cut is made on
//! char boundaries rather than byte offsets.

/// Return the first `n` characters of `s` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return `s` cut to `n` characters, with a trailing `...` when anything was cut.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().nth(n).is_some() {
        prefix.push_str("...");
    }
    prefix
}
