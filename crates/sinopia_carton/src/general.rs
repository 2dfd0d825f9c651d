//! General string helpers shared by the compiler and the runtime.

use compact_str::CompactString;

/// Convert a hyphenated name to lower camel case (`data-item-id` → `dataItemId`).
pub fn camelize(s: &str) -> CompactString {
    let mut out = CompactString::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a lower camel case name to hyphen case (`dataItemId` → `data-item-id`).
pub fn hyphenate(s: &str) -> CompactString {
    let mut out = CompactString::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Whether `s` is a plain JavaScript identifier (`[A-Za-z_$][A-Za-z0-9_$]*`).
#[inline]
pub fn is_simple_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Find the closing marker of a fragment whose content starts at `from`.
///
/// A run of consecutive closing markers counts as one wider close, so the
/// returned offset is the start of the *last* closing marker of the first run
/// found (`a[b[0]]]]` with `]]` closes at offset 7, not 5).
pub fn find_marker_close(haystack: &[u8], from: usize, close: &[u8]) -> Option<usize> {
    if close.is_empty() || from > haystack.len() {
        return None;
    }
    let mut pos = haystack[from..]
        .windows(close.len())
        .position(|w| w == close)?
        + from;
    while haystack[pos + 1..].starts_with(close) {
        pos += 1;
    }
    Some(pos)
}

/// Compute the 1-based line of a byte offset.
pub fn line_of(source: &str, offset: usize) -> u32 {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("foo"), "foo");
        assert_eq!(camelize("foo-bar"), "fooBar");
        assert_eq!(camelize("aria-label-x"), "ariaLabelX");
    }

    #[test]
    fn test_hyphenate() {
        assert_eq!(hyphenate("foo"), "foo");
        assert_eq!(hyphenate("fooBar"), "foo-bar");
        assert_eq!(hyphenate("ariaLabelX"), "aria-label-x");
    }

    #[test]
    fn test_simple_identifier() {
        assert!(is_simple_identifier("foo"));
        assert!(is_simple_identifier("$outer"));
        assert!(is_simple_identifier("_a1"));
        assert!(!is_simple_identifier("1a"));
        assert!(!is_simple_identifier("a-b"));
        assert!(!is_simple_identifier(""));
    }

    #[test]
    fn test_find_marker_close() {
        assert_eq!(find_marker_close(b"x]]", 0, b"]]"), Some(1));
        assert_eq!(find_marker_close(b"a[b[0]]]]", 0, b"]]"), Some(7));
        assert_eq!(find_marker_close(b"a]] b]]", 0, b"]]"), Some(1));
        assert_eq!(find_marker_close(b"a]] b]]", 3, b"]]"), Some(5));
        assert_eq!(find_marker_close(b"abc", 0, b"]]"), None);
    }

    #[test]
    fn test_line_of() {
        let src = "a\nb\nc";
        assert_eq!(line_of(src, 0), 1);
        assert_eq!(line_of(src, 2), 2);
        assert_eq!(line_of(src, 4), 3);
        assert_eq!(line_of(src, 100), 3);
    }
}
