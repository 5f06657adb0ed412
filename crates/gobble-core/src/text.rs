//! Case-insensitive text helpers shared by the filter and message model.

/// Returns the remainder of `text` after `prefix`, compared ignoring case.
pub fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(text);
    }
    let mut rest = text;
    for expected in prefix.chars() {
        let mut chars = rest.chars();
        let actual = chars.next()?;
        if !chars_eq_ignore_case(actual, expected) {
            return None;
        }
        rest = chars.as_str();
    }
    Some(rest)
}

/// Whether `text` starts with `prefix`, ignoring case.
pub fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    strip_prefix_ignore_case(text, prefix).is_some()
}

/// Byte offset of the first case-insensitive occurrence of `needle` in
/// `haystack`, measured in the lowercased haystack.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_lowercase().find(&needle.to_lowercase())
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}
