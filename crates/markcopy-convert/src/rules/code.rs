//! Code blocks.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

use super::Rule;
use crate::dom;

static LANGUAGE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)language-([a-z0-9+-]+)").unwrap());

/// `<pre><code class="language-xxx">` → fenced block with info string.
pub fn fenced_code_with_language() -> Rule {
    Rule::new("fencedCodeWithLang", is_code_block, |_, el, options| {
        let Some(code) = dom::first_element_child(el) else {
            return String::new();
        };
        let language = LANGUAGE_CLASS
            .captures(dom::class_attr(code))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or("");
        fenced_block(&dom::text_content(code), language, &options.fence)
    })
}

/// `<pre>` without a code child: fenced block, no info string.
pub fn preformatted() -> Rule {
    Rule::new(
        "preformatted",
        |el| dom::name(el) == "pre",
        |_, el, options| fenced_block(&dom::text_content(el), "", &options.fence),
    )
}

fn is_code_block(el: ElementRef<'_>) -> bool {
    dom::name(el) == "pre"
        && dom::first_element_child(el).is_some_and(|child| dom::name(child) == "code")
}

/// Fence `code`, growing the fence past any backtick run inside it.
/// A single trailing newline of the code text is dropped.
pub(crate) fn fenced_block(code: &str, language: &str, fence: &str) -> String {
    let code = code.strip_suffix('\n').unwrap_or(code);
    let fence_char = fence.chars().next().unwrap_or('`');
    let mut fence = fence.to_string();
    while code.contains(fence.as_str()) {
        fence.push(fence_char);
    }
    format!("\n\n{fence}{language}\n{code}\n{fence}\n\n")
}
