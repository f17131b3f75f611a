//! Sanitizing free-text input for the Lucene full-text index.

/// Characters the full-text query parser treats as syntax.
const SPECIAL: &[char] = &[
    '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

/// Escape full-text query syntax in `input`.
///
/// Every special character (including the two-character operators `&&` and
/// `||`) gets a backslash inserted before it, in one left-to-right scan, so
/// markers inserted earlier are never themselves re-escaped. A lone `&` or
/// `|` is not an operator and passes through unchanged.
///
/// The function is NOT idempotent: the escape marker `\` is itself a special
/// character, so applying it twice double-escapes. Escape raw user input
/// exactly once, immediately before building the index query.
pub fn escape_fulltext(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 2);
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' | '|' if chars.peek() == Some(&c) => {
                chars.next();
                out.push('\\');
                out.push(c);
                out.push(c);
            }
            c if SPECIAL.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_each_special_character() {
        assert_eq!(escape_fulltext("a+b*c"), r"a\+b\*c");
        assert_eq!(escape_fulltext("path/to:file"), r"path\/to\:file");
        assert_eq!(escape_fulltext(r"a\b"), r"a\\b");
        assert_eq!(escape_fulltext("f(x)"), r"f\(x\)");
    }

    #[test]
    fn test_double_char_operators() {
        assert_eq!(escape_fulltext("a && b"), r"a \&& b");
        assert_eq!(escape_fulltext("a || b"), r"a \|| b");
        // A lone ampersand or pipe is not an operator.
        assert_eq!(escape_fulltext("a & b | c"), "a & b | c");
        // Three in a row: the pair is escaped, the straggler passes through.
        assert_eq!(escape_fulltext("&&&"), r"\&&&");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(escape_fulltext(""), "");
        assert_eq!(escape_fulltext("compute_checksum"), "compute_checksum");
    }

    #[test]
    fn test_not_idempotent() {
        let once = escape_fulltext("a+b");
        let twice = escape_fulltext(&once);
        assert_eq!(once, r"a\+b");
        assert_eq!(twice, r"a\\\+b");
        assert_ne!(once, twice);
    }
}
