//! Expression preprocessor.
//!
//! Turns a template string with interleaved `[[ … ]]` fragments into a single
//! JavaScript expression.
//!
//! ```text
//! Hello [[ name ]]!   =>   'Hello '+__nn(( name ))+'!'
//! [[ items ]]         =>   items
//! plain               =>   'plain'
//! ```

use sinopia_carton::find_marker_close;
use sinopia_relief::keys::NOT_NULL_HELPER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'s> {
    Literal(&'s str),
    Fragment(&'s str),
}

/// Split `text` into literal runs and fragment contents.
///
/// An open marker without a matching close is kept as literal text.
fn split<'s>(text: &'s str, open: &str, close: &str) -> Vec<Segment<'s>> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut literal_start = 0;

    if !open.is_empty() {
        while let Some(rel) = text[pos..].find(open) {
            let start = pos + rel;
            let content_start = start + open.len();
            let Some(close_at) = find_marker_close(text.as_bytes(), content_start, close.as_bytes())
            else {
                break;
            };
            if start > literal_start {
                segments.push(Segment::Literal(&text[literal_start..start]));
            }
            segments.push(Segment::Fragment(&text[content_start..close_at]));
            pos = close_at + close.len();
            literal_start = pos;
        }
    }

    if literal_start < text.len() {
        segments.push(Segment::Literal(&text[literal_start..]));
    }
    segments
}

/// Whether `text` contains at least one complete fragment.
pub fn has_fragment(text: &str, open: &str, close: &str) -> bool {
    split(text, open, close)
        .iter()
        .any(|s| matches!(s, Segment::Fragment(_)))
}

/// Preprocess a template string into one JavaScript expression source.
///
/// A fragment spanning the whole input is returned as is (trimmed), so it
/// keeps its own type. Every other fragment is stringified through the
/// not-null helper, and literal runs become single-quoted strings.
pub fn preprocess(text: &str, open: &str, close: &str) -> String {
    let segments = split(text, open, close);

    if let [Segment::Fragment(source)] = segments.as_slice() {
        return source.trim().to_string();
    }
    if segments.is_empty() {
        return String::from("''");
    }

    let mut out = String::with_capacity(text.len() + 16);
    for segment in segments {
        let piece = match segment {
            Segment::Literal(literal) => quote(literal),
            Segment::Fragment(source) if source.trim().is_empty() => continue,
            Segment::Fragment(source) => format!("{NOT_NULL_HELPER}(({source}))"),
        };
        if !out.is_empty() {
            out.push('+');
        }
        out.push_str(&piece);
    }
    out
}

/// Single-quoted JavaScript string literal.
fn quote(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len() + 2);
    out.push('\'');
    for c in literal.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp(text: &str) -> String {
        preprocess(text, "[[", "]]")
    }

    #[test]
    fn test_empty_and_blank_fragments() {
        assert_eq!(pp(""), "''");
        assert_eq!(pp("[[]]"), "");
        assert_eq!(pp("[[ ]]"), "");
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(pp("x"), "'x'");
        assert_eq!(pp("it's \"ok\"\\\n"), r#"'it\'s \"ok\"\\\n'"#);
    }

    #[test]
    fn test_sole_fragment_is_unwrapped() {
        assert_eq!(pp("[[ a + 1 ]]"), "a + 1");
        assert_eq!(pp("[[function () { return 1 }]]"), "function () { return 1 }");
    }

    #[test]
    fn test_mixed_fragments_are_stringified() {
        assert_eq!(pp("Hi [[name]]!"), "'Hi '+__nn((name))+'!'");
        assert_eq!(pp("[[a]][[b]]"), "__nn((a))+__nn((b))");
        assert_eq!(pp(" [[a]]"), "' '+__nn((a))");
        assert_eq!(pp("a[[ ]]b"), "'a'+'b'");
    }

    #[test]
    fn test_consecutive_close_markers() {
        assert_eq!(pp("[[a[b[0]]]]"), "a[b[0]]");
        assert_eq!(pp("x[[m[[0]]]]"), "'x'+__nn((m[[0]]))");
    }

    #[test]
    fn test_unterminated_fragment_is_literal() {
        assert_eq!(pp("a [[ b"), "'a [[ b'");
        assert!(!has_fragment("a [[ b", "[[", "]]"));
        assert!(has_fragment("a [[ b ]]", "[[", "]]"));
    }

    #[test]
    fn test_custom_markers() {
        assert_eq!(preprocess("n={{ n }}", "{{", "}}"), "'n='+__nn(( n ))");
    }
}
