//! Markdown escaping for text nodes.

use once_cell::sync::Lazy;
use regex::Regex;

static ESCAPES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\\", r"\\"),
        (r"\*", r"\*"),
        (r"^-", r"\-"),
        (r"^\+ ", r"\+ "),
        (r"^(=+)", r"\${1}"),
        (r"^(#{1,6}) ", r"\${1} "),
        (r"`", r"\`"),
        (r"^~~~", r"\~~~"),
        (r"\[", r"\["),
        (r"\]", r"\]"),
        (r"^>", r"\>"),
        (r"_", r"\_"),
        (r"^(\d+)\. ", r"${1}\. "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

/// Escape characters that would otherwise be read as Markdown syntax.
///
/// Line-start patterns only apply at the start of the given text, which is
/// always a single text node.
pub fn escape_markdown(text: &str) -> String {
    ESCAPES
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_specials() {
        assert_eq!(escape_markdown("a*b_c"), r"a\*b\_c");
        assert_eq!(escape_markdown("[link]"), r"\[link\]");
        assert_eq!(escape_markdown(r"C:\dir"), r"C:\\dir");
        assert_eq!(escape_markdown("use `x`"), r"use \`x\`");
    }

    #[test]
    fn test_line_start_specials() {
        assert_eq!(escape_markdown("- not a list"), r"\- not a list");
        assert_eq!(escape_markdown("# not a heading"), r"\# not a heading");
        assert_eq!(escape_markdown("1. not ordered"), r"1\. not ordered");
        assert_eq!(escape_markdown("> not quoted"), r"\> not quoted");
        assert_eq!(escape_markdown("a - b"), "a - b");
    }
}
